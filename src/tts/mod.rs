//! Text-to-speech backends and the speech post-processor.
//!
//! Providers return raw PCM; [`SpeechSynthesizer`] turns that into a playable
//! `data:audio/wav;base64,` URI. Long texts are spoken in several requests of at
//! most [`MAX_SPEECH_CHARS`] characters, split at sentence ends where possible.

pub mod wav;

use std::sync::Arc;

use crate::error::{DispatchError, LLMError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Longest input the speech endpoint accepts in one request.
pub const MAX_SPEECH_CHARS: usize = 4096;

/// Trait implemented by all text to speech backends
#[async_trait]
pub trait TextToSpeechProvider: Send + Sync {
    /// Convert the given text into raw speech PCM (24 kHz, 16-bit LE, mono).
    ///
    /// `voice` overrides the provider's configured voice when set.
    async fn speech(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, LLMError>;
}

/// Playable speech for a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechMedia {
    /// `data:audio/wav;base64,...`
    pub media: String,
}

/// Requests speech for a response text and wraps it as WAV.
///
/// Every failure is reported as [`DispatchError::Synthesis`] so callers can
/// treat it as non-fatal.
pub struct SpeechSynthesizer {
    provider: Arc<dyn TextToSpeechProvider>,
    default_voice: Option<String>,
}

impl SpeechSynthesizer {
    pub fn new(provider: Arc<dyn TextToSpeechProvider>) -> Self {
        Self {
            provider,
            default_voice: None,
        }
    }

    /// Voice used when a request does not name one.
    pub fn with_default_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = Some(voice.into());
        self
    }

    pub fn default_voice(&self) -> Option<&str> {
        self.default_voice.as_deref()
    }

    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<SpeechMedia, DispatchError> {
        if text.trim().is_empty() {
            return Err(DispatchError::Synthesis("There is no text to speak.".into()));
        }

        let voice = voice.or(self.default_voice.as_deref());
        let chunks = speech_chunks(text, MAX_SPEECH_CHARS);
        log::debug!(
            "requesting speech for {} chars in {} part(s) (voice: {:?})",
            text.chars().count(),
            chunks.len(),
            voice
        );

        let mut pcm = Vec::new();
        for chunk in chunks {
            let mut part = self
                .provider
                .speech(chunk, voice)
                .await
                .map_err(|e| DispatchError::Synthesis(e.to_string()))?;
            // keep 16-bit samples aligned across parts
            part.truncate(part.len() & !1);
            pcm.append(&mut part);
        }
        if pcm.is_empty() {
            return Err(DispatchError::Synthesis(
                "No media returned from the speech provider.".into(),
            ));
        }

        let wav = wav::pcm_to_wav(&pcm).map_err(|e| DispatchError::Synthesis(e.to_string()))?;
        Ok(SpeechMedia {
            media: wav::to_data_uri(&wav),
        })
    }
}

/// Splits `text` into pieces of at most `max_chars` characters.
///
/// A piece ends after the last `.`, `!`, `?` or newline that fits, then at the
/// last whitespace, and only mid-word when neither exists.
pub(crate) fn speech_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();
    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(i, _)| i);
        let window = &rest[..limit];
        let cut = window
            .rfind(['.', '!', '?', '\n'])
            .map(|i| i + 1)
            .or_else(|| window.rfind(char::is_whitespace).filter(|&i| i > 0))
            .unwrap_or(limit);

        let (head, tail) = rest.split_at(cut);
        let head = head.trim();
        if !head.is_empty() {
            chunks.push(head);
        }
        rest = tail.trim_start();
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedPcm {
        pcm: Vec<u8>,
        seen_voice: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextToSpeechProvider for FixedPcm {
        async fn speech(&self, _text: &str, voice: Option<&str>) -> Result<Vec<u8>, LLMError> {
            *self.seen_voice.lock().unwrap() = voice.map(str::to_owned);
            Ok(self.pcm.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextToSpeechProvider for Failing {
        async fn speech(&self, _text: &str, _voice: Option<&str>) -> Result<Vec<u8>, LLMError> {
            Err(LLMError::ProviderError("quota exceeded".into()))
        }
    }

    /// Returns three bytes per request and records every requested text.
    #[derive(Default)]
    struct Recording {
        texts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextToSpeechProvider for Recording {
        async fn speech(&self, text: &str, _voice: Option<&str>) -> Result<Vec<u8>, LLMError> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(vec![1, 2, 3])
        }
    }

    fn fixed(pcm: Vec<u8>) -> Arc<FixedPcm> {
        Arc::new(FixedPcm {
            pcm,
            seen_voice: Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn wraps_pcm_in_wav_data_uri() {
        let provider = fixed(vec![0u8; 4800]);
        let synth = SpeechSynthesizer::new(provider.clone()).with_default_voice("Algenib");

        let media = synth.synthesize("Hello there", None).await.unwrap();
        let wav = wav::from_data_uri(&media.media).unwrap();
        assert_eq!(wav.len(), wav::HEADER_LEN + 4800);
        assert_eq!(provider.seen_voice.lock().unwrap().as_deref(), Some("Algenib"));
    }

    #[tokio::test]
    async fn request_voice_overrides_default() {
        let provider = fixed(vec![1, 2]);
        let synth = SpeechSynthesizer::new(provider.clone()).with_default_voice("Algenib");
        synth.synthesize("Hi", Some("nova")).await.unwrap();
        assert_eq!(provider.seen_voice.lock().unwrap().as_deref(), Some("nova"));
    }

    #[tokio::test]
    async fn empty_payload_is_a_synthesis_error() {
        let synth = SpeechSynthesizer::new(fixed(Vec::new()));
        let err = synth.synthesize("Hi", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::Synthesis(_)));
    }

    #[tokio::test]
    async fn provider_failure_is_a_synthesis_error() {
        let synth = SpeechSynthesizer::new(Arc::new(Failing));
        let err = synth.synthesize("Hi", None).await.unwrap_err();
        match err {
            DispatchError::Synthesis(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn chunks_prefer_sentence_ends() {
        let text = "One two. Three four! Five six seven";
        assert_eq!(speech_chunks(text, 15), vec!["One two.", "Three four!", "Five six seven"]);
        assert_eq!(speech_chunks(text, 20), vec!["One two. Three four!", "Five six seven"]);
        assert_eq!(speech_chunks("  short  ", 20), vec!["short"]);
        assert!(speech_chunks("   ", 20).is_empty());
    }

    #[test]
    fn chunks_fall_back_to_words_then_characters() {
        assert_eq!(speech_chunks("alpha beta gamma", 11), vec!["alpha beta", "gamma"]);
        assert_eq!(speech_chunks("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(speech_chunks("éééé ü", 3), vec!["ééé", "é ü"]);
    }

    #[tokio::test]
    async fn long_text_is_spoken_in_parts() {
        let sentence = "This sentence is repeated to make a long answer. ";
        let text = sentence.repeat(200);
        assert!(text.chars().count() > MAX_SPEECH_CHARS);

        let provider = Arc::new(Recording::default());
        let synth = SpeechSynthesizer::new(provider.clone());
        let media = synth.synthesize(&text, None).await.unwrap();

        let texts = provider.texts.lock().unwrap();
        assert!(texts.len() > 1);
        assert!(texts.iter().all(|t| t.chars().count() <= MAX_SPEECH_CHARS));
        assert!(texts.iter().all(|t| t.ends_with('.')));
        assert_eq!(texts.concat().len(), text.trim().len() - (texts.len() - 1));

        // each odd-length part loses its trailing byte
        let wav = wav::from_data_uri(&media.media).unwrap();
        assert_eq!(wav.len(), wav::HEADER_LEN + 2 * texts.len());
    }
}
