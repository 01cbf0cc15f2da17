//! Capabilities: single-purpose model calls the dispatcher can route a turn to.
//!
//! Every capability except [`Capability::PlainChat`] is exposed to the model as a
//! function tool taking one required string argument. Handlers live in a
//! [`CapabilityRegistry`] keyed by capability, so selecting a capability (explicitly or
//! through a tool call) is decoupled from invoking it.

pub mod handlers;
pub mod prompts;
mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::builder::{FunctionBuilder, ParamBuilder};
use crate::chat::Tool;
use crate::error::LLMError;

pub use handlers::{ImageHandler, PromptHandler};
pub use registry::CapabilityRegistry;

/// Arguments passed to a capability, keyed by field name.
pub type CapabilityArgs = BTreeMap<String, String>;

/// What a dispatch can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Free conversation, answered by the chat model without a tool.
    PlainChat,
    EmailDraft,
    Translate,
    HomeworkHelp,
    Research,
    MeetingSummary,
    ReportWrite,
    DocumentSummary,
    ImageGenerate,
    CodeInterpret,
    UiDesign,
    WebSearch,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Capability::PlainChat,
        Capability::EmailDraft,
        Capability::Translate,
        Capability::HomeworkHelp,
        Capability::Research,
        Capability::MeetingSummary,
        Capability::ReportWrite,
        Capability::DocumentSummary,
        Capability::ImageGenerate,
        Capability::CodeInterpret,
        Capability::UiDesign,
        Capability::WebSearch,
    ];

    /// Wire name, e.g. `meeting-summary`.
    pub fn name(self) -> &'static str {
        match self {
            Capability::PlainChat => "plain-chat",
            Capability::EmailDraft => "email-draft",
            Capability::Translate => "translate",
            Capability::HomeworkHelp => "homework-help",
            Capability::Research => "research",
            Capability::MeetingSummary => "meeting-summary",
            Capability::ReportWrite => "report-write",
            Capability::DocumentSummary => "document-summary",
            Capability::ImageGenerate => "image-generate",
            Capability::CodeInterpret => "code-interpret",
            Capability::UiDesign => "ui-design",
            Capability::WebSearch => "web-search",
        }
    }

    /// Name of the function tool the model calls. `None` for plain chat.
    pub fn tool_name(self) -> Option<&'static str> {
        let name = match self {
            Capability::PlainChat => return None,
            Capability::EmailDraft => "emailAssistant",
            Capability::Translate => "languageTranslator",
            Capability::HomeworkHelp => "homeworkHelper",
            Capability::Research => "researchAssistant",
            Capability::MeetingSummary => "meetingSummarizer",
            Capability::ReportWrite => "reportWriter",
            Capability::DocumentSummary => "documentSummarizer",
            Capability::ImageGenerate => "imageCreator",
            Capability::CodeInterpret => "codeInterpreter",
            Capability::UiDesign => "uiuxDesigner",
            Capability::WebSearch => "webSearch",
        };
        Some(name)
    }

    /// Required string argument of the tool.
    pub fn input_field(self) -> &'static str {
        match self {
            Capability::PlainChat => "prompt",
            Capability::EmailDraft => "prompt",
            Capability::Translate => "text",
            Capability::HomeworkHelp => "question",
            Capability::Research => "topic",
            Capability::MeetingSummary => "transcript",
            Capability::ReportWrite => "topic",
            Capability::DocumentSummary => "documentText",
            Capability::ImageGenerate => "prompt",
            Capability::CodeInterpret => "code",
            Capability::UiDesign => "prompt",
            Capability::WebSearch => "query",
        }
    }

    /// Field of the structured model output holding the result.
    pub fn output_field(self) -> &'static str {
        match self {
            Capability::PlainChat => "response",
            Capability::EmailDraft => "email",
            Capability::Translate => "translation",
            Capability::HomeworkHelp => "answer",
            Capability::Research => "researchData",
            Capability::MeetingSummary => "summary",
            Capability::ReportWrite => "report",
            Capability::DocumentSummary => "summary",
            Capability::ImageGenerate => "imageUrl",
            Capability::CodeInterpret => "output",
            Capability::UiDesign => "code",
            Capability::WebSearch => "result",
        }
    }

    /// When the model should pick this capability.
    pub fn description(self) -> &'static str {
        match self {
            Capability::PlainChat => "General conversation without a specialised tool.",
            Capability::EmailDraft => {
                "Drafts an email from a short brief. Use when the user asks to write, draft or compose an email."
            }
            Capability::Translate => {
                "Translates text into another language. Use when the user asks for a translation."
            }
            Capability::HomeworkHelp => {
                "Answers academic or homework questions with a step-by-step explanation."
            }
            Capability::Research => {
                "Gathers thorough background information on a research topic."
            }
            Capability::MeetingSummary => {
                "Summarizes a meeting transcript into key points, decisions and action items."
            }
            Capability::ReportWrite => "Writes a structured report on a topic.",
            Capability::DocumentSummary => "Summarizes the text of an attached document.",
            Capability::ImageGenerate => {
                "Generates an image from a detailed description. Use when the user asks to create, draw or generate an image."
            }
            Capability::CodeInterpret => {
                "Runs Python code and returns what it prints. Use for calculations or data processing, not for showing example code."
            }
            Capability::UiDesign => {
                "Designs a UI component and returns its JSX code. Use when the user asks to design or build a form, card, button or page layout."
            }
            Capability::WebSearch => {
                "Looks up current information on the web. Use for recent events or anything that needs up-to-date facts."
            }
        }
    }

    /// Capabilities that can be invoked as tools, in declaration order.
    pub fn tools() -> impl Iterator<Item = Capability> {
        Self::ALL.into_iter().filter(|c| c.tool_name().is_some())
    }

    pub fn from_tool_name(name: &str) -> Option<Capability> {
        Self::tools().find(|c| c.tool_name() == Some(name))
    }

    /// The function tool declaration sent to the model.
    pub fn tool(self) -> Option<Tool> {
        let name = self.tool_name()?;
        let input = self.input_field();
        Some(
            FunctionBuilder::new(name)
                .description(self.description())
                .param(ParamBuilder::new(input).description(input_description(self)))
                .required(vec![input.to_string()])
                .build(),
        )
    }
}

fn input_description(capability: Capability) -> &'static str {
    match capability {
        Capability::PlainChat => "The user message.",
        Capability::EmailDraft => "What the email should say and to whom.",
        Capability::Translate => "The text to translate, with the target language if the user named one.",
        Capability::HomeworkHelp => "The homework question.",
        Capability::Research => "The topic to research.",
        Capability::MeetingSummary => "The full meeting transcript.",
        Capability::ReportWrite => "The report topic and any requirements.",
        Capability::DocumentSummary => "The document text to summarize.",
        Capability::ImageGenerate => "A detailed description of the image.",
        Capability::CodeInterpret => "The Python code to run.",
        Capability::UiDesign => "A description of the UI component.",
        Capability::WebSearch => "The search query.",
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either the wire name (`web-search`, case-insensitive) or the tool name (`webSearch`).
impl FromStr for Capability {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();
        Capability::ALL
            .into_iter()
            .find(|c| c.name() == lower || c.tool_name() == Some(trimmed))
            .ok_or_else(|| LLMError::InvalidRequest(format!("Unknown capability: {s}")))
    }
}

/// Result of a capability invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOutput {
    /// Text shown to the user.
    pub text: String,
    /// Media produced alongside the text (an image data URI).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

impl CapabilityOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }
}

/// A stateless wrapper around one hosted-model call.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    fn capability(&self) -> Capability;

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, LLMError>;
}

/// Looks up a required, non-blank argument.
pub fn required_arg<'a>(args: &'a CapabilityArgs, field: &str) -> Result<&'a str, LLMError> {
    args.get(field)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LLMError::ToolConfigError(format!("Missing required argument `{field}`")))
}

/// Parses the JSON arguments of a tool call.
///
/// Non-string values are kept as their JSON text.
pub fn parse_tool_arguments(arguments: &str) -> Result<CapabilityArgs, LLMError> {
    let arguments = arguments.trim();
    if arguments.is_empty() {
        return Ok(CapabilityArgs::new());
    }
    let value: serde_json::Value = serde_json::from_str(arguments)?;
    let serde_json::Value::Object(map) = value else {
        return Err(LLMError::ToolConfigError(format!(
            "Tool arguments must be a JSON object, got: {arguments}"
        )));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}
