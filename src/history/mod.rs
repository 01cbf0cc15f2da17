//! Conversation history: turns, conversation state and the session loop that appends to it.

mod session;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use session::Session;

/// Maximum length of a title derived from the first prompt.
const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Rich content attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TurnContent {
    Text { text: String },
    /// Reference to a document the user attached. Only the name is kept, never its text.
    Attachment {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },
    GeneratedImage { url: String },
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<TurnContent>,
}

impl Turn {
    fn new(role: Role, text: impl Into<String>, content: Option<TurnContent>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            content,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, None)
    }

    /// User turn referencing an attached document.
    pub fn user_with_attachment(text: impl Into<String>, attachment: &Attachment) -> Self {
        Self::new(
            Role::User,
            text,
            Some(TurnContent::Attachment {
                name: attachment.name.clone(),
                mime: attachment.mime.clone(),
            }),
        )
    }

    /// Assistant turn, carrying the generated image when there is one.
    pub fn assistant(text: impl Into<String>, image: Option<String>) -> Self {
        Self::new(
            Role::Assistant,
            text,
            image.map(|url| TurnContent::GeneratedImage { url }),
        )
    }

    /// A user turn with no text whose content is an attachment.
    pub fn is_document_only(&self) -> bool {
        self.role == Role::User
            && self.text.trim().is_empty()
            && matches!(self.content, Some(TurnContent::Attachment { .. }))
    }
}

/// A document submitted with a prompt. Its text goes into the request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: Option<String>,
    pub text: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            text: text.into(),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// A conversation and its per-conversation preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: String::new(),
            turns: Vec::new(),
            custom_instructions: None,
            voice: None,
        }
    }

    /// Drops all turns, keeping id and preferences.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.title.clear();
    }

    /// A fresh conversation with a new id that keeps the preferences.
    pub fn renewed(&self) -> Self {
        Self {
            custom_instructions: self.custom_instructions.clone(),
            voice: self.voice.clone(),
            ..Self::new()
        }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Sets the title from the first submission if none is set yet.
    pub(crate) fn ensure_title(&mut self, prompt: &str, attachment: Option<&Attachment>) {
        if self.title.is_empty() {
            self.title = derive_title(prompt, attachment);
        }
    }
}

/// First characters of the prompt, or the attachment name for document-only submissions.
pub fn derive_title(prompt: &str, attachment: Option<&Attachment>) -> String {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return attachment
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "New Chat".to_string());
    }
    let mut title: String = prompt.chars().take(TITLE_MAX_CHARS).collect();
    if prompt.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}
