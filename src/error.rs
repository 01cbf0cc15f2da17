use thiserror::Error;

/// Error types that can occur when interacting with LLM providers.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request/response errors
    #[error("HTTP Error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth Error: {0}")]
    AuthError(String),
    /// Invalid request parameters or format
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    /// Errors returned by the LLM provider
    #[error("Provider Error: {0}")]
    ProviderError(String),
    /// The provider answered, but not in the expected shape
    #[error("Response Format Error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    #[error("JSON Parse Error: {0}")]
    JsonError(String),
    /// Tool declaration or tool call arguments are malformed
    #[error("Tool Configuration Error: {0}")]
    ToolConfigError(String),
    /// Generic error
    #[error("Generic Error: {0}")]
    Generic(String),
}

/// Converts reqwest HTTP errors into LLMErrors
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

/// Failures of a single dispatch, from input validation to speech synthesis.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Neither a prompt nor a document was submitted.
    #[error("Please enter a message or attach a document.")]
    EmptyInput,
    /// The selected capability failed or produced no usable output.
    #[error("The {capability} capability failed: {cause}")]
    Capability { capability: String, cause: LLMError },
    /// Speech synthesis failed. Never fatal to a dispatch.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
    /// The conversational model call itself failed.
    #[error("{0}")]
    Upstream(#[from] LLMError),
}

impl DispatchError {
    pub(crate) fn capability(capability: impl Into<String>, cause: LLMError) -> Self {
        DispatchError::Capability {
            capability: capability.into(),
            cause,
        }
    }

    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::EmptyInput => self.to_string(),
            _ => format!("Sorry, I encountered an error. {self}"),
        }
    }
}
