use crate::error::LLMError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An image produced by an [`ImageProvider`], addressable from a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Either a `data:image/...;base64,` URI or a remote URL
    pub url: String,
}

impl GeneratedImage {
    /// Wraps base64 PNG bytes into a data URI.
    pub fn from_base64_png(b64: impl AsRef<str>) -> Self {
        Self {
            url: format!("data:image/png;base64,{}", b64.as_ref()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// True when the image is embedded rather than hosted elsewhere.
    pub fn is_data_uri(&self) -> bool {
        self.url.starts_with("data:")
    }
}

/// Trait implemented by image generation backends
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate one image from a text prompt.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, LLMError>;
}
