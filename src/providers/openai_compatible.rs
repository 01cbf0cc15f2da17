//! OpenAI-compatible API client base implementation
//!
//! This module provides a generic base for OpenAI-compatible APIs. The same provider
//! type serves chat completions (with tools and structured output), image generation
//! and speech, each configured with its own model id.

use crate::{
    chat::{
        ChatMessage, ChatProvider, ChatResponse, ChatRole, StructuredOutputFormat, Tool,
        ToolChoice, Usage,
    },
    error::LLMError,
    image::{GeneratedImage, ImageProvider},
    tts::TextToSpeechProvider,
    ToolCall,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Generic OpenAI-compatible provider
///
/// Different providers customize behavior by implementing [`OpenAICompatibleConfig`].
pub struct OpenAICompatibleProvider<T: OpenAICompatibleConfig> {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_seconds: Option<u64>,
    pub tool_choice: Option<ToolChoice>,
    pub voice: Option<String>,
    pub client: Client,
    _phantom: PhantomData<T>,
}

/// Configuration trait for OpenAI-compatible providers
pub trait OpenAICompatibleConfig: Send + Sync {
    /// The name of the provider (e.g., "OpenAI", "HuggingFace")
    const PROVIDER_NAME: &'static str;

    /// Default base URL for the provider
    const DEFAULT_BASE_URL: &'static str;

    /// Default chat model for the provider
    const DEFAULT_MODEL: &'static str;

    /// Default image generation model
    const DEFAULT_IMAGE_MODEL: &'static str;

    /// Default speech model
    const DEFAULT_SPEECH_MODEL: &'static str;

    /// Voice used when the caller does not pick one
    const DEFAULT_VOICE: &'static str;

    /// Chat completions endpoint path
    const CHAT_ENDPOINT: &'static str = "chat/completions";

    /// Image generation endpoint path
    const IMAGE_ENDPOINT: &'static str = "images/generations";

    /// Speech endpoint path
    const SPEECH_ENDPOINT: &'static str = "audio/speech";
}

/// Generic OpenAI-compatible chat message
#[derive(Serialize, Debug)]
pub struct OpenAICompatibleChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Generic OpenAI-compatible chat request
#[derive(Serialize, Debug)]
pub struct OpenAICompatibleChatRequest {
    pub model: String,
    pub messages: Vec<OpenAICompatibleChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Generic OpenAI-compatible chat response
#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatResponse {
    pub choices: Vec<OpenAICompatibleChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatChoice {
    pub message: OpenAICompatibleChatMsg,
}

#[derive(Deserialize, Debug)]
pub struct OpenAICompatibleChatMsg {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug, Serialize)]
pub enum ResponseType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json_schema")]
    JsonSchema,
    #[serde(rename = "json_object")]
    JsonObject,
}

#[derive(Deserialize, Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<StructuredOutputFormat>,
}

impl From<StructuredOutputFormat> for ResponseFormat {
    fn from(format: StructuredOutputFormat) -> Self {
        let schema = format.schema.map(|mut schema| {
            if schema.get("additionalProperties").is_none() {
                schema["additionalProperties"] = serde_json::json!(false);
            }
            schema
        });

        ResponseFormat {
            response_type: ResponseType::JsonSchema,
            json_schema: Some(StructuredOutputFormat {
                name: format.name,
                description: format.description,
                schema,
                strict: format.strict,
            }),
        }
    }
}

#[derive(Serialize, Debug)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    response_format: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageGenerationData>,
}

#[derive(Deserialize, Debug)]
struct ImageGenerationData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Serialize, Debug)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl ChatResponse for OpenAICompatibleChatResponse {
    fn text(&self) -> Option<String> {
        self.choices.first().and_then(|c| c.message.content.clone())
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        self.choices
            .first()
            .and_then(|c| c.message.tool_calls.clone())
    }

    fn usage(&self) -> Option<Usage> {
        self.usage.clone()
    }
}

impl std::fmt::Display for OpenAICompatibleChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(choice) = self.choices.first() else {
            return Ok(());
        };
        if let Some(tool_calls) = &choice.message.tool_calls {
            for tool_call in tool_calls {
                write!(f, "{tool_call}")?;
            }
        }
        if let Some(content) = &choice.message.content {
            write!(f, "{content}")?;
        }
        Ok(())
    }
}

impl<T: OpenAICompatibleConfig> OpenAICompatibleProvider<T> {
    /// Creates a provider for `model`, falling back to the config's defaults.
    ///
    /// The base URL always ends with `/` so endpoint paths join below it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        top_p: Option<f32>,
        timeout_seconds: Option<u64>,
        tool_choice: Option<ToolChoice>,
        voice: Option<String>,
    ) -> Result<Self, LLMError> {
        let mut base = base_url.unwrap_or_else(|| T::DEFAULT_BASE_URL.to_owned());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LLMError::InvalidRequest(format!("Invalid base URL {base}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(sec) = timeout_seconds {
            builder = builder.timeout(std::time::Duration::from_secs(sec));
        }

        Ok(Self {
            api_key: api_key.into(),
            base_url,
            model: model.unwrap_or_else(|| T::DEFAULT_MODEL.to_string()),
            max_tokens,
            temperature,
            top_p,
            timeout_seconds,
            tool_choice,
            voice,
            client: builder.build()?,
            _phantom: PhantomData,
        })
    }

    fn ensure_api_key(&self) -> Result<(), LLMError> {
        if self.api_key.is_empty() {
            return Err(LLMError::AuthError(format!(
                "Missing {} API key",
                T::PROVIDER_NAME
            )));
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, LLMError> {
        self.base_url
            .join(path)
            .map_err(|e| LLMError::HttpError(e.to_string()))
    }

    fn post<B: Serialize>(&self, url: Url, body: &B) -> reqwest::RequestBuilder {
        self.client.post(url).bearer_auth(&self.api_key).json(body)
    }

    /// Turns a non-success status into a [`LLMError::ResponseFormatError`].
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
        log::debug!("{} HTTP status: {}", T::PROVIDER_NAME, response.status());
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(LLMError::ResponseFormatError {
                message: format!("{} API returned error status: {status}", T::PROVIDER_NAME),
                raw_response: error_text,
            });
        }
        Ok(response)
    }

    async fn send_chat(
        &self,
        body: OpenAICompatibleChatRequest,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.ensure_api_key()?;

        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("{} request payload: {}", T::PROVIDER_NAME, json);
            }
        }

        let url = self.endpoint(T::CHAT_ENDPOINT)?;
        let response = self.post(url, &body).send().await?;
        let response = Self::check_status(response).await?;

        let resp_text = response.text().await?;
        match serde_json::from_str::<OpenAICompatibleChatResponse>(&resp_text) {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    log::debug!(
                        "{} usage: {} prompt / {} completion tokens",
                        T::PROVIDER_NAME,
                        usage.prompt_tokens,
                        usage.completion_tokens
                    );
                }
                Ok(Box::new(response))
            }
            Err(e) => Err(LLMError::ResponseFormatError {
                message: format!("Failed to decode {} API response: {e}", T::PROVIDER_NAME),
                raw_response: resp_text,
            }),
        }
    }

    fn chat_request(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
        response_format: Option<ResponseFormat>,
    ) -> OpenAICompatibleChatRequest {
        let api_messages = messages.iter().map(chat_message_to_api_message).collect();

        // tool_choice is only meaningful next to a tool list
        let tools = tools.filter(|t| !t.is_empty()).map(|t| t.to_vec());
        let tool_choice = tools
            .as_ref()
            .map(|_| self.tool_choice.clone().unwrap_or_default());

        OpenAICompatibleChatRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stream: false,
            tools,
            tool_choice,
            response_format,
        }
    }
}

#[async_trait]
impl<T: OpenAICompatibleConfig> ChatProvider for OpenAICompatibleProvider<T> {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        let body = self.chat_request(messages, tools, None);
        self.send_chat(body).await
    }

    async fn chat_with_schema(
        &self,
        messages: &[ChatMessage],
        schema: &StructuredOutputFormat,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        let body = self.chat_request(messages, None, Some(schema.clone().into()));
        self.send_chat(body).await
    }
}

#[async_trait]
impl<T: OpenAICompatibleConfig> ImageProvider for OpenAICompatibleProvider<T> {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, LLMError> {
        self.ensure_api_key()?;

        let body = ImageGenerationRequest {
            model: &self.model,
            prompt,
            n: 1,
            response_format: "b64_json",
        };
        let url = self.endpoint(T::IMAGE_ENDPOINT)?;
        let response = self.post(url, &body).send().await?;
        let response = Self::check_status(response).await?;

        let resp_text = response.text().await?;
        let parsed: ImageGenerationResponse =
            serde_json::from_str(&resp_text).map_err(|e| LLMError::ResponseFormatError {
                message: format!("Failed to decode {} image response: {e}", T::PROVIDER_NAME),
                raw_response: resp_text.clone(),
            })?;

        let first = parsed.data.into_iter().next();
        match first {
            Some(ImageGenerationData {
                b64_json: Some(b64),
                ..
            }) if !b64.is_empty() => Ok(GeneratedImage::from_base64_png(b64)),
            Some(ImageGenerationData { url: Some(url), .. }) if !url.is_empty() => {
                Ok(GeneratedImage::from_url(url))
            }
            _ => Err(LLMError::ProviderError(
                "Image generation failed to return a valid image.".into(),
            )),
        }
    }
}

#[async_trait]
impl<T: OpenAICompatibleConfig> TextToSpeechProvider for OpenAICompatibleProvider<T> {
    async fn speech(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, LLMError> {
        self.ensure_api_key()?;

        let voice = voice
            .or(self.voice.as_deref())
            .unwrap_or(T::DEFAULT_VOICE);
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: "pcm",
        };
        let url = self.endpoint(T::SPEECH_ENDPOINT)?;
        let response = self.post(url, &body).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response.bytes().await?.to_vec())
    }
}

/// Convert a ChatMessage to an OpenAI-compatible message
pub fn chat_message_to_api_message(chat_msg: &ChatMessage) -> OpenAICompatibleChatMessage {
    let role = match chat_msg.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };

    OpenAICompatibleChatMessage {
        role,
        content: chat_msg.content.clone(),
    }
}
