//! HuggingFace Inference Providers router client, using the OpenAI-compatible base.
//!
//! https://huggingface.co/docs/inference-providers
//!
//! The router only serves chat completions; image and speech requests are sent to the
//! same base URL and fail unless the deployment behind it exposes those endpoints.

use crate::error::LLMError;
use crate::providers::openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// HuggingFace configuration for the generic provider
pub struct HuggingFaceConfig;

impl OpenAICompatibleConfig for HuggingFaceConfig {
    const PROVIDER_NAME: &'static str = "HuggingFace Inference Providers";
    const DEFAULT_BASE_URL: &'static str = "https://router.huggingface.co/v1/";
    const DEFAULT_MODEL: &'static str = "openai/gpt-oss-20b";
    const DEFAULT_IMAGE_MODEL: &'static str = "black-forest-labs/FLUX.1-schnell";
    const DEFAULT_SPEECH_MODEL: &'static str = "hexgrad/Kokoro-82M";
    const DEFAULT_VOICE: &'static str = "af_heart";
}

pub type HuggingFace = OpenAICompatibleProvider<HuggingFaceConfig>;

impl HuggingFace {
    /// Creates a HuggingFace router client for `model` (or the default chat model).
    pub fn with_model(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        voice: Option<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, LLMError> {
        OpenAICompatibleProvider::<HuggingFaceConfig>::new(
            api_key,
            base_url,
            model,
            None,
            None,
            None,
            timeout_seconds,
            None,
            voice,
        )
    }
}
