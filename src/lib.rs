//! llm-dispatch resolves one chat-assistant submission into a hosted-model call,
//! an optional single-purpose capability, and an optional spoken rendition.
//!
//! # Overview
//! A client hands the crate a prompt, the conversation so far, optional document text
//! and custom instructions. The crate:
//!
//! - assembles and validates a [`dispatch::DispatchRequest`]
//! - picks one [`capability::Capability`], either named by the caller or chosen by the
//!   model through tool calling, and invokes it through a single dispatch table
//! - turns the final text into a WAV data URI with [`tts::SpeechSynthesizer`]
//! - shapes everything into a [`dispatch::DispatchResult`]
//!
//! Sessions ([`history::Session`]) keep the turn history, and
//! [`store::ConversationStore`] persists conversations and preferences on disk.

// Re-export for convenience
pub use async_trait::async_trait;

use serde::{Deserialize, Serialize};
use std::fmt;

/// OpenAI-compatible provider configurations (OpenAI, HuggingFace router)
pub mod backends;

/// Builder for configuring providers and the dispatcher
pub mod builder;

/// Named capabilities, their schemas and handlers
pub mod capability;

/// Chat-based interactions with language models
pub mod chat;

/// Request assembly, capability selection and result shaping
pub mod dispatch;

/// Error types and handling
pub mod error;

/// Turns, conversation state and the session loop
pub mod history;

/// Image generation support
pub mod image;

/// Generic OpenAI-compatible provider
pub mod providers;

/// Client-local persistence of conversations and preferences
pub mod store;

/// Text-to-speech support and WAV framing
pub mod tts;

#[cfg(feature = "api")]
pub mod api;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
/// This is a no-op if the feature is not enabled.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}

/// Tool call represents a function call that an LLM wants to make.
#[derive(Debug, Deserialize, Serialize, Clone, Eq, PartialEq)]
pub struct ToolCall {
    /// The ID of the tool call.
    pub id: String,
    /// The type of the tool call (usually "function").
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

/// FunctionCall contains details about which function to call and with what arguments.
#[derive(Debug, Deserialize, Serialize, Clone, Eq, PartialEq)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to pass to the function, serialized as a JSON string.
    pub arguments: String,
}

impl fmt::Display for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}({})",
            self.id, self.function.name, self.function.arguments
        )
    }
}
