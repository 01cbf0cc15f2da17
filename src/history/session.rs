use std::sync::Arc;

use crate::capability::Capability;
use crate::dispatch::{DispatchResult, Dispatcher, RequestAssembler};
use crate::error::DispatchError;

use super::{Attachment, ConversationState, Turn};

/// The only writer of a conversation's history.
///
/// `submit` takes `&mut self`, so one conversation never has two dispatches in flight.
pub struct Session {
    dispatcher: Arc<Dispatcher>,
    state: ConversationState,
    capability: Option<Capability>,
    speak: bool,
}

impl Session {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::resume(dispatcher, ConversationState::new())
    }

    /// Continues an existing conversation.
    pub fn resume(dispatcher: Arc<Dispatcher>, state: ConversationState) -> Self {
        Self {
            dispatcher,
            state,
            capability: None,
            speak: true,
        }
    }

    /// Routes every following submission to `capability` (or back to the default with `None`).
    pub fn set_capability(&mut self, capability: Option<Capability>) {
        self.capability = capability;
    }

    pub fn set_speak(&mut self, speak: bool) {
        self.speak = speak;
    }

    pub fn set_custom_instructions(&mut self, instructions: Option<String>) {
        self.state.custom_instructions = instructions.filter(|s| !s.trim().is_empty());
    }

    pub fn set_voice(&mut self, voice: Option<String>) {
        self.state.voice = voice.filter(|s| !s.trim().is_empty());
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn into_state(self) -> ConversationState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.state.turns
    }

    pub fn clear_history(&mut self) {
        self.state.clear();
    }

    /// Starts over under a new conversation id, keeping the preferences.
    pub fn new_conversation(&mut self) {
        self.state = self.state.renewed();
    }

    /// Sends one submission and records it.
    ///
    /// The user turn is appended before dispatching and kept even when the dispatch
    /// fails; the assistant turn is appended only on success. An empty submission
    /// appends nothing.
    pub async fn submit(&mut self, prompt: &str, attachment: Option<Attachment>) -> DispatchResult {
        let mut assembler = RequestAssembler::new(prompt)
            .history(self.state.turns.clone())
            .custom_instructions(self.state.custom_instructions.clone())
            .voice(self.state.voice.clone())
            .capability(self.capability)
            .speak(self.speak);
        if let Some(attachment) = &attachment {
            assembler = assembler.document_text(attachment.text.clone());
        }

        let request = match assembler.build() {
            Ok(request) => request,
            Err(e) => return DispatchResult::failure(&e),
        };

        let user_turn = match &attachment {
            Some(attachment) => Turn::user_with_attachment(&request.prompt, attachment),
            None => Turn::user(&request.prompt),
        };
        self.state.ensure_title(&request.prompt, attachment.as_ref());
        self.state.push(user_turn);

        match self.dispatcher.try_dispatch(request).await {
            Ok(outcome) => {
                self.state.push(Turn::assistant(
                    &outcome.response_text,
                    outcome.structured_content.clone(),
                ));
                outcome.into()
            }
            Err(e) => {
                log::error!("dispatch failed in conversation {}: {e}", self.state.id);
                DispatchResult::failure(&e)
            }
        }
    }
}

impl From<Session> for ConversationState {
    fn from(session: Session) -> Self {
        session.state
    }
}
