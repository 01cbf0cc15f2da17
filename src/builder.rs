//! Builder module for configuring providers and the dispatcher.
//!
//! [`DispatcherBuilder`] wires a chat, an image and a speech provider of one backend
//! into a [`Dispatcher`]. [`FunctionBuilder`] and [`ParamBuilder`] declare function
//! tools for the model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    capability::{CapabilityHandler, CapabilityRegistry},
    chat::{ChatProvider, FunctionTool, ParameterProperty, ParametersSchema, Tool, ToolChoice},
    dispatch::{Dispatcher, SelectionMode},
    error::LLMError,
    image::ImageProvider,
    tts::{SpeechSynthesizer, TextToSpeechProvider},
};

/// Supported backend providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LLMBackend {
    /// OpenAI API (chat, images and speech)
    #[default]
    OpenAI,
    /// HuggingFace Inference Providers router
    HuggingFace,
}

impl LLMBackend {
    /// Environment variable holding this backend's own API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            LLMBackend::OpenAI => "OPENAI_API_KEY",
            LLMBackend::HuggingFace => "HF_TOKEN",
        }
    }
}

/// Case-insensitive parsing of backend names.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use llm_dispatch::builder::LLMBackend;
///
/// let backend = LLMBackend::from_str("openai").unwrap();
/// assert!(matches!(backend, LLMBackend::OpenAI));
///
/// let err = LLMBackend::from_str("invalid").unwrap_err();
/// assert!(err.to_string().contains("Unknown LLM backend"));
/// ```
impl std::str::FromStr for LLMBackend {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMBackend::OpenAI),
            "huggingface" | "hf" => Ok(LLMBackend::HuggingFace),
            _ => Err(LLMError::InvalidRequest(format!(
                "Unknown LLM backend: {}",
                s
            ))),
        }
    }
}

/// Builder for configuring and instantiating a [`Dispatcher`].
///
/// Providers can also be injected directly, which skips the backend setup for that
/// provider.
#[derive(Default)]
pub struct DispatcherBuilder {
    backend: Option<LLMBackend>,
    api_key: Option<String>,
    base_url: Option<String>,
    chat_model: Option<String>,
    image_model: Option<String>,
    speech_model: Option<String>,
    voice: Option<String>,
    mode: Option<SelectionMode>,
    timeout_seconds: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    tool_choice: Option<ToolChoice>,
    disable_speech: bool,
    chat: Option<Arc<dyn ChatProvider>>,
    image: Option<Arc<dyn ImageProvider>>,
    speech: Option<Arc<dyn TextToSpeechProvider>>,
    handlers: Vec<Arc<dyn CapabilityHandler>>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl DispatcherBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the `LLM_DISPATCH_*` environment variables.
    ///
    /// The API key falls back to `OPENAI_API_KEY` or `HF_TOKEN` depending on the backend.
    pub fn from_env() -> Result<Self, LLMError> {
        let mut builder = Self::new();

        let backend = match env_var("LLM_DISPATCH_BACKEND") {
            Some(name) => name.parse()?,
            None => LLMBackend::default(),
        };
        builder.backend = Some(backend);
        builder.api_key =
            env_var("LLM_DISPATCH_API_KEY").or_else(|| env_var(backend.api_key_env()));
        builder.base_url = env_var("LLM_DISPATCH_BASE_URL");
        builder.chat_model = env_var("LLM_DISPATCH_CHAT_MODEL");
        builder.image_model = env_var("LLM_DISPATCH_IMAGE_MODEL");
        builder.speech_model = env_var("LLM_DISPATCH_SPEECH_MODEL");
        builder.voice = env_var("LLM_DISPATCH_VOICE");

        if let Some(mode) = env_var("LLM_DISPATCH_MODE") {
            builder.mode = Some(mode.parse()?);
        }
        if let Some(timeout) = env_var("LLM_DISPATCH_TIMEOUT") {
            let seconds = timeout.parse().map_err(|_| {
                LLMError::InvalidRequest(format!("Invalid LLM_DISPATCH_TIMEOUT: {timeout}"))
            })?;
            builder.timeout_seconds = Some(seconds);
        }

        Ok(builder)
    }

    /// Sets the backend provider to use.
    pub fn backend(mut self, backend: LLMBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the API key for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the conversational model.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = Some(model.into());
        self
    }

    /// Sets the default voice for speech synthesis.
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Sets how capabilities are selected when a request does not name one.
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the temperature for controlling response randomness (0.0-1.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the top-p (nucleus) sampling parameter.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets how the chat model may use the capability tools it is offered.
    ///
    /// `ToolChoice::Any` forces a capability call on every model-mediated turn.
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Turns speech post-processing off entirely.
    pub fn without_speech(mut self) -> Self {
        self.disable_speech = true;
        self
    }

    pub fn chat_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.chat = Some(provider);
        self
    }

    pub fn image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image = Some(provider);
        self
    }

    pub fn speech_provider(mut self, provider: Arc<dyn TextToSpeechProvider>) -> Self {
        self.speech = Some(provider);
        self
    }

    /// Replaces the default handler of the handler's capability.
    pub fn handler(mut self, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Builds the dispatcher.
    ///
    /// Returns an error if a provider has to be created for a backend whose feature is
    /// disabled, or if no API key is available for it.
    pub fn build(self) -> Result<Dispatcher, LLMError> {
        let needs_backend = self.chat.is_none()
            || self.image.is_none()
            || (self.speech.is_none() && !self.disable_speech);
        let backend = if needs_backend {
            Some(self.create_backend_providers()?)
        } else {
            None
        };

        let chat = self
            .chat
            .clone()
            .or_else(|| backend.as_ref().map(|providers| providers.0.clone()))
            .ok_or_else(|| LLMError::InvalidRequest("No chat provider configured".into()))?;
        let image = self
            .image
            .clone()
            .or_else(|| backend.as_ref().map(|providers| providers.1.clone()))
            .ok_or_else(|| LLMError::InvalidRequest("No image provider configured".into()))?;
        let speech = self
            .speech
            .clone()
            .or_else(|| backend.as_ref().map(|providers| providers.2.clone()))
            .filter(|_| !self.disable_speech);

        let mut registry = CapabilityRegistry::with_defaults(chat.clone(), image);
        for handler in self.handlers {
            registry.register(handler);
        }

        let mut dispatcher =
            Dispatcher::new(chat, registry).with_mode(self.mode.unwrap_or_default());
        if let Some(speech) = speech {
            let mut synthesizer = SpeechSynthesizer::new(speech);
            if let Some(voice) = self.voice {
                synthesizer = synthesizer.with_default_voice(voice);
            }
            dispatcher = dispatcher.with_speech(synthesizer);
        }
        Ok(dispatcher)
    }

    /// Creates the chat, image and speech providers of the selected backend.
    fn create_backend_providers(&self) -> Result<BackendProviders, LLMError> {
        let backend = self.backend.unwrap_or_default();
        let key = self.api_key.clone().ok_or_else(|| {
            LLMError::InvalidRequest(format!("No API key provided for {backend:?}"))
        })?;

        #[allow(unused_variables)]
        let providers: BackendProviders = match backend {
            LLMBackend::OpenAI => {
                #[cfg(not(feature = "openai"))]
                return Err(LLMError::InvalidRequest(
                    "OpenAI feature not enabled".to_string(),
                ));

                #[cfg(feature = "openai")]
                {
                    self.backend_providers::<crate::backends::openai::OpenAIConfig>(&key)?
                }
            }
            LLMBackend::HuggingFace => {
                #[cfg(not(feature = "huggingface"))]
                return Err(LLMError::InvalidRequest(
                    "HuggingFace feature not enabled".to_string(),
                ));

                #[cfg(feature = "huggingface")]
                {
                    self.backend_providers::<crate::backends::huggingface::HuggingFaceConfig>(
                        &key,
                    )?
                }
            }
        };

        #[allow(unreachable_code)]
        Ok(providers)
    }

    #[allow(dead_code)]
    fn backend_providers<C>(&self, key: &str) -> Result<BackendProviders, LLMError>
    where
        C: crate::providers::OpenAICompatibleConfig + 'static,
    {
        use crate::providers::OpenAICompatibleProvider;

        let chat = OpenAICompatibleProvider::<C>::new(
            key,
            self.base_url.clone(),
            self.chat_model.clone(),
            self.max_tokens,
            self.temperature,
            self.top_p,
            self.timeout_seconds,
            self.tool_choice.clone(),
            None,
        )?;
        let image = OpenAICompatibleProvider::<C>::new(
            key,
            self.base_url.clone(),
            Some(
                self.image_model
                    .clone()
                    .unwrap_or_else(|| C::DEFAULT_IMAGE_MODEL.to_string()),
            ),
            None,
            None,
            None,
            self.timeout_seconds,
            None,
            None,
        )?;
        let speech = OpenAICompatibleProvider::<C>::new(
            key,
            self.base_url.clone(),
            Some(
                self.speech_model
                    .clone()
                    .unwrap_or_else(|| C::DEFAULT_SPEECH_MODEL.to_string()),
            ),
            None,
            None,
            None,
            self.timeout_seconds,
            None,
            self.voice.clone(),
        )?;

        log::debug!(
            "{} providers: chat={} image={} speech={}",
            C::PROVIDER_NAME,
            chat.model,
            image.model,
            speech.model
        );
        Ok((Arc::new(chat), Arc::new(image), Arc::new(speech)))
    }
}

type BackendProviders = (
    Arc<dyn ChatProvider>,
    Arc<dyn ImageProvider>,
    Arc<dyn TextToSpeechProvider>,
);

/// Builder for function parameters
pub struct ParamBuilder {
    name: String,
    property_type: String,
    description: String,
    enum_list: Option<Vec<String>>,
}

impl ParamBuilder {
    /// Creates a new string parameter builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: "string".to_string(),
            description: String::new(),
            enum_list: None,
        }
    }

    /// Sets the parameter type
    pub fn type_of(mut self, type_str: impl Into<String>) -> Self {
        self.property_type = type_str.into();
        self
    }

    /// Sets the parameter description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the enum values for enum parameters
    pub fn enum_values(mut self, values: Vec<String>) -> Self {
        self.enum_list = Some(values);
        self
    }

    fn build(self) -> (String, ParameterProperty) {
        (
            self.name,
            ParameterProperty {
                property_type: self.property_type,
                description: self.description,
                enum_list: self.enum_list,
            },
        )
    }
}

/// Builder for function tools
pub struct FunctionBuilder {
    name: String,
    description: String,
    parameters: Vec<ParamBuilder>,
    required: Vec<String>,
}

impl FunctionBuilder {
    /// Creates a new function builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Sets the function description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Adds a parameter to the function
    pub fn param(mut self, param: ParamBuilder) -> Self {
        self.parameters.push(param);
        self
    }

    /// Marks parameters as required
    pub fn required(mut self, param_names: Vec<String>) -> Self {
        self.required = param_names;
        self
    }

    /// Builds the function tool
    pub fn build(self) -> Tool {
        let mut properties = HashMap::new();
        for param in self.parameters {
            let (name, prop) = param.build();
            properties.insert(name, prop);
        }

        let schema = ParametersSchema {
            schema_type: "object".to_string(),
            properties,
            required: self.required,
        };

        Tool {
            tool_type: "function".to_string(),
            function: FunctionTool {
                name: self.name,
                description: self.description,
                parameters: serde_json::json!(schema),
            },
        }
    }
}
