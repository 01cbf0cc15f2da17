//! Handler implementations backing the capability table.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{prompts, required_arg, Capability, CapabilityArgs, CapabilityHandler, CapabilityOutput};
use crate::chat::{ChatMessage, ChatProvider, StructuredOutputFormat};
use crate::error::LLMError;
use crate::image::ImageProvider;

/// Answers a capability with one chat call constrained to `{<output_field>: string}`.
///
/// Used for every text capability, including the simulated web search and code
/// interpreter.
pub struct PromptHandler {
    capability: Capability,
    chat: Arc<dyn ChatProvider>,
}

impl PromptHandler {
    pub fn new(capability: Capability, chat: Arc<dyn ChatProvider>) -> Self {
        Self { capability, chat }
    }

    fn schema(&self) -> StructuredOutputFormat {
        let name = self.capability.tool_name().unwrap_or("chat");
        StructuredOutputFormat::single_string_field(
            format!("{name}Output"),
            self.capability.output_field(),
        )
    }
}

#[async_trait]
impl CapabilityHandler for PromptHandler {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, LLMError> {
        let input = required_arg(args, self.capability.input_field())?;
        let messages = [
            ChatMessage::system()
                .content(prompts::capability_system(self.capability))
                .build(),
            ChatMessage::user().content(input).build(),
        ];

        let response = self.chat.chat_with_schema(&messages, &self.schema()).await?;
        let raw = response.text().unwrap_or_default();
        log::trace!("{} raw output: {raw}", self.capability);

        extract_output_field(&raw, self.capability.output_field()).map(CapabilityOutput::text)
    }
}

/// Generates an image; the reply text is a short caption and the image travels as media.
pub struct ImageHandler {
    image: Arc<dyn ImageProvider>,
}

impl ImageHandler {
    pub fn new(image: Arc<dyn ImageProvider>) -> Self {
        Self { image }
    }
}

#[async_trait]
impl CapabilityHandler for ImageHandler {
    fn capability(&self) -> Capability {
        Capability::ImageGenerate
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, LLMError> {
        let prompt = required_arg(args, Capability::ImageGenerate.input_field())?;
        let image = self.image.generate_image(prompt).await?;
        Ok(CapabilityOutput {
            text: format!("Here is the image you asked for: {prompt}"),
            media: Some(image.url),
        })
    }
}

/// Pulls `field` out of a structured reply.
///
/// Models that ignore the schema and answer in plain text are accepted as long as the
/// text is not blank. A JSON object lacking the field is rejected.
pub fn extract_output_field(raw: &str, field: &str) -> Result<String, LLMError> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Err(LLMError::ProviderError(format!(
            "The model returned an empty `{field}`"
        )));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(LLMError::ResponseFormatError {
                message: format!("Response has no usable `{field}` field"),
                raw_response: raw.to_string(),
            }),
        },
        Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        _ => Ok(trimmed.to_string()),
    }
}

// Some models wrap JSON in Markdown fences even when asked for a schema. The
// opening fence may carry any info string (`json`, `JSON`) or none at all.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
    else {
        return text;
    };
    let body = match inner.split_once('\n') {
        Some((info, body)) if is_fence_info(info) => body,
        _ => inner,
    };
    body.trim()
}

fn is_fence_info(info: &str) -> bool {
    info.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatResponse, Tool};
    use crate::image::GeneratedImage;
    use crate::ToolCall;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Reply(String);

    impl std::fmt::Display for Reply {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl ChatResponse for Reply {
        fn text(&self) -> Option<String> {
            Some(self.0.clone())
        }
        fn tool_calls(&self) -> Option<Vec<ToolCall>> {
            None
        }
    }

    struct Scripted {
        reply: String,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl ChatProvider for Scripted {
        async fn chat_with_tools(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[Tool]>,
        ) -> Result<Box<dyn ChatResponse>, LLMError> {
            Ok(Box::new(Reply(self.reply.clone())))
        }

        async fn chat_with_schema(
            &self,
            messages: &[ChatMessage],
            schema: &StructuredOutputFormat,
        ) -> Result<Box<dyn ChatResponse>, LLMError> {
            let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.seen.lock().unwrap().push((user, Some(schema.name.clone())));
            Ok(Box::new(Reply(self.reply.clone())))
        }
    }

    fn scripted(reply: &str) -> Arc<Scripted> {
        Arc::new(Scripted {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn args(field: &str, value: &str) -> CapabilityArgs {
        CapabilityArgs::from([(field.to_string(), value.to_string())])
    }

    #[tokio::test]
    async fn prompt_handler_reads_output_field() {
        let chat = scripted(r#"{"translation": "Bonjour"}"#);
        let handler = PromptHandler::new(Capability::Translate, chat.clone());

        let out = handler.invoke(&args("text", "Hello in French")).await.unwrap();
        assert_eq!(out, CapabilityOutput::text("Bonjour"));

        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Hello in French");
        assert_eq!(seen[0].1.as_deref(), Some("languageTranslatorOutput"));
    }

    #[tokio::test]
    async fn missing_input_fails_before_calling_model() {
        let chat = scripted("unused");
        let handler = PromptHandler::new(Capability::Research, chat.clone());
        let err = handler.invoke(&CapabilityArgs::new()).await.unwrap_err();
        assert!(matches!(err, LLMError::ToolConfigError(_)));
        assert!(chat.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_handler_returns_media() {
        struct Painter;

        #[async_trait]
        impl ImageProvider for Painter {
            async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, LLMError> {
                Ok(GeneratedImage::from_base64_png("AAAA"))
            }
        }

        let out = ImageHandler::new(Arc::new(Painter))
            .invoke(&args("prompt", "a red fox"))
            .await
            .unwrap();
        assert_eq!(out.media.as_deref(), Some("data:image/png;base64,AAAA"));
        assert!(out.text.contains("a red fox"));
    }

    #[test]
    fn plain_text_reply_is_accepted() {
        assert_eq!(extract_output_field("  42\n", "output").unwrap(), "42");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"summary\": \"Short.\"}\n```";
        assert_eq!(extract_output_field(raw, "summary").unwrap(), "Short.");
    }

    #[test]
    fn untagged_and_uppercase_fences_are_unwrapped() {
        let untagged = "```\n{\"summary\": \"Short.\"}\n```";
        assert_eq!(extract_output_field(untagged, "summary").unwrap(), "Short.");

        let upper = "```JSON\n{\"translation\": \"Bonjour\"}\n```\n";
        assert_eq!(extract_output_field(upper, "translation").unwrap(), "Bonjour");

        let inline = "```{\"email\": \"Dear team\"}```";
        assert_eq!(extract_output_field(inline, "email").unwrap(), "Dear team");
    }

    #[test]
    fn unclosed_fence_is_left_alone() {
        assert_eq!(strip_code_fence("```json\n{}"), "```json\n{}");
        assert_eq!(strip_code_fence("plain answer"), "plain answer");
    }

    #[test]
    fn object_without_field_is_rejected() {
        let err = extract_output_field(r#"{"other": "x"}"#, "email").unwrap_err();
        assert!(matches!(err, LLMError::ResponseFormatError { .. }));
        assert!(extract_output_field("   ", "email").is_err());
    }
}
