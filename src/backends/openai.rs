//! OpenAI API client implementation using the OpenAI-compatible base
//!
//! Chat, image generation and speech all go through `https://api.openai.com/v1/`.
//! Speech is requested as raw PCM (24 kHz, 16-bit, mono), which is what the
//! speech post-processor wraps into WAV.

use crate::error::LLMError;
use crate::providers::openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// OpenAI configuration for the generic provider
pub struct OpenAIConfig;

impl OpenAICompatibleConfig for OpenAIConfig {
    const PROVIDER_NAME: &'static str = "OpenAI";
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1/";
    const DEFAULT_MODEL: &'static str = "gpt-4.1-mini";
    const DEFAULT_IMAGE_MODEL: &'static str = "dall-e-3";
    const DEFAULT_SPEECH_MODEL: &'static str = "gpt-4o-mini-tts";
    const DEFAULT_VOICE: &'static str = "alloy";
}

/// Type alias for OpenAI client using the generic provider
pub type OpenAI = OpenAICompatibleProvider<OpenAIConfig>;

impl OpenAI {
    /// Chat client for `model` (or the default chat model).
    pub fn chat_client(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        Self::new(
            api_key,
            base_url,
            model,
            None,
            None,
            None,
            timeout_seconds,
            None,
            None,
        )
    }

    /// Image generation client for `model` (or the default image model).
    pub fn image_client(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        Self::chat_client(
            api_key,
            base_url,
            Some(model.unwrap_or_else(|| OpenAIConfig::DEFAULT_IMAGE_MODEL.to_string())),
            timeout_seconds,
        )
    }

    /// Speech client for `model` (or the default speech model) speaking with `voice`.
    pub fn speech_client(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        voice: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        Self::new(
            api_key,
            base_url,
            Some(model.unwrap_or_else(|| OpenAIConfig::DEFAULT_SPEECH_MODEL.to_string())),
            None,
            None,
            None,
            timeout_seconds,
            None,
            voice,
        )
    }
}
