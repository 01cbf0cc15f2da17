//! One conversation turn from submission to result.
//!
//! [`RequestAssembler`] validates the raw input, [`Dispatcher`] selects and invokes a
//! capability and runs speech post-processing, and the outcome is shaped into a
//! [`DispatchResult`] for the client.

mod assembler;
mod dispatcher;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::DispatchError;
use crate::history::Turn;

pub use assembler::{build_messages, user_content, RequestAssembler};
pub use dispatcher::{Dispatcher, SelectionMode};

fn default_speak() -> bool {
    true
}

/// Everything the dispatcher needs for one submission. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Pre-selected capability; bypasses model-mediated selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
    /// Whether to synthesize speech for the response.
    #[serde(default = "default_speak")]
    pub speak: bool,
}

impl DispatchRequest {
    /// Empty prompt with document text.
    pub fn is_document_only(&self) -> bool {
        self.prompt.trim().is_empty() && self.document_text.is_some()
    }
}

/// Successful dispatch before it is flattened into a [`DispatchResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub response_text: String,
    /// Media such as a generated image data URI.
    pub structured_content: Option<String>,
    /// `data:audio/wav;base64,...` for `response_text`, when synthesis succeeded.
    pub audio_url: Option<String>,
    pub capability: Capability,
}

/// What the client receives. Exactly one of `response_text` or `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
}

impl DispatchResult {
    pub fn failure(error: &DispatchError) -> Self {
        Self {
            response_text: None,
            structured_content: None,
            audio_url: None,
            error: Some(error.user_message()),
            capability: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<DispatchOutcome> for DispatchResult {
    fn from(outcome: DispatchOutcome) -> Self {
        Self {
            response_text: Some(outcome.response_text),
            structured_content: outcome.structured_content,
            audio_url: outcome.audio_url,
            error: None,
            capability: Some(outcome.capability),
        }
    }
}

impl From<Result<DispatchOutcome, DispatchError>> for DispatchResult {
    fn from(result: Result<DispatchOutcome, DispatchError>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(e) => Self::failure(&e),
        }
    }
}
