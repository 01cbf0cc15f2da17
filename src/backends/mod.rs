#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "huggingface")]
pub mod huggingface;
