use crate::capability::{prompts::ATTACHED_DOCUMENT_MARKER, Capability};
use crate::chat::ChatMessage;
use crate::error::DispatchError;
use crate::history::{Role, Turn, TurnContent};

use super::DispatchRequest;

/// Builds a validated [`DispatchRequest`] from raw client input.
///
/// Blank optional strings are treated as absent. A request with neither a prompt nor
/// document text is rejected with [`DispatchError::EmptyInput`].
#[derive(Debug, Clone)]
pub struct RequestAssembler {
    request: DispatchRequest,
}

impl RequestAssembler {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            request: DispatchRequest {
                prompt: prompt.into(),
                history: Vec::new(),
                document_text: None,
                custom_instructions: None,
                voice: None,
                capability: None,
                speak: true,
            },
        }
    }

    pub fn history(mut self, turns: Vec<Turn>) -> Self {
        self.request.history = turns;
        self
    }

    pub fn document_text(mut self, text: impl Into<String>) -> Self {
        self.request.document_text = Some(text.into());
        self
    }

    pub fn custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.request.custom_instructions = instructions;
        self
    }

    pub fn voice(mut self, voice: Option<String>) -> Self {
        self.request.voice = voice;
        self
    }

    pub fn capability(mut self, capability: Option<Capability>) -> Self {
        self.request.capability = capability;
        self
    }

    pub fn speak(mut self, speak: bool) -> Self {
        self.request.speak = speak;
        self
    }

    pub fn build(self) -> Result<DispatchRequest, DispatchError> {
        Self::normalize(self.request)
    }

    /// Validates a request that arrived already shaped, e.g. from the HTTP API.
    pub fn normalize(mut request: DispatchRequest) -> Result<DispatchRequest, DispatchError> {
        request.prompt = request.prompt.trim().to_string();
        request.document_text = non_blank(request.document_text);
        request.custom_instructions = non_blank(request.custom_instructions);
        request.voice = non_blank(request.voice);

        if request.prompt.is_empty() && request.document_text.is_none() {
            return Err(DispatchError::EmptyInput);
        }
        Ok(request)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Text of the user message: the prompt, then the attached document once.
pub fn user_content(prompt: &str, document_text: Option<&str>) -> String {
    match document_text {
        Some(doc) if prompt.is_empty() => format!("{}{doc}", ATTACHED_DOCUMENT_MARKER.trim_start()),
        Some(doc) => format!("{prompt}{ATTACHED_DOCUMENT_MARKER}{doc}"),
        None => prompt.to_string(),
    }
}

/// System message, prior turns, then the new user message.
pub fn build_messages(system: Option<&str>, history: &[Turn], user: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system {
        messages.push(ChatMessage::system().content(system).build());
    }

    for turn in history {
        let text = history_text(turn);
        if text.is_empty() {
            continue;
        }
        let builder = match turn.role {
            Role::User => ChatMessage::user(),
            Role::Assistant => ChatMessage::assistant(),
        };
        messages.push(builder.content(text).build());
    }

    messages.push(ChatMessage::user().content(user).build());
    messages
}

fn history_text(turn: &Turn) -> String {
    match &turn.content {
        Some(TurnContent::Attachment { name, .. }) if turn.text.trim().is_empty() => {
            format!("[Attached document: {name}]")
        }
        _ => turn.text.clone(),
    }
}
