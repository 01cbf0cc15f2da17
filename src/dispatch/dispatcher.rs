use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::capability::prompts::{
    system_prompt, CHAT_PREAMBLE, DOCUMENT_SUMMARY_FRAMING, ORCHESTRATOR_PREAMBLE,
};
use crate::capability::{Capability, CapabilityArgs, CapabilityOutput, CapabilityRegistry};
use crate::chat::{ChatProvider, ChatResponse};
use crate::error::{DispatchError, LLMError};
use crate::tts::SpeechSynthesizer;

use super::{
    build_messages, user_content, DispatchOutcome, DispatchRequest, DispatchResult,
    RequestAssembler,
};

/// How the capability of a turn is chosen when the request does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// The model sees every registered capability as a tool and may call one.
    #[default]
    ModelMediated,
    /// Every turn goes to this capability.
    Explicit(Capability),
}

impl FromStr for SelectionMode {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "model" => Ok(SelectionMode::ModelMediated),
            _ => s.parse().map(SelectionMode::Explicit),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::ModelMediated => f.write_str("auto"),
            SelectionMode::Explicit(capability) => write!(f, "{capability}"),
        }
    }
}

/// Routes a request to one capability and post-processes the response into speech.
///
/// Holds no per-conversation state and can be shared across sessions behind an `Arc`.
pub struct Dispatcher {
    chat: Arc<dyn ChatProvider>,
    registry: CapabilityRegistry,
    speech: Option<SpeechSynthesizer>,
    mode: SelectionMode,
}

impl Dispatcher {
    pub fn new(chat: Arc<dyn ChatProvider>, registry: CapabilityRegistry) -> Self {
        Self {
            chat,
            registry,
            speech: None,
            mode: SelectionMode::default(),
        }
    }

    pub fn with_speech(mut self, speech: SpeechSynthesizer) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn speech(&self) -> Option<&SpeechSynthesizer> {
        self.speech.as_ref()
    }

    /// Dispatches and flattens the outcome for the client. Failures are logged.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResult {
        let result = self.try_dispatch(request).await;
        match &result {
            Err(DispatchError::EmptyInput) => log::debug!("rejected empty submission"),
            Err(e) => log::error!("dispatch failed: {e}"),
            Ok(_) => {}
        }
        result.into()
    }

    /// Validates, answers and voices one request.
    ///
    /// Speech failures never fail the dispatch; the outcome then has no audio.
    pub async fn try_dispatch(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let request = RequestAssembler::normalize(request)?;
        let (capability, output) = self.respond(&request).await?;
        let audio_url = self.voice_response(&request, &output.text).await;

        Ok(DispatchOutcome {
            response_text: output.text,
            structured_content: output.media,
            audio_url,
            capability,
        })
    }

    async fn respond(
        &self,
        request: &DispatchRequest,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        if request.is_document_only() {
            return self.summarize_document(request).await;
        }

        let mode = request
            .capability
            .map(SelectionMode::Explicit)
            .unwrap_or(self.mode);
        log::debug!("selection mode: {mode}");

        match mode {
            SelectionMode::Explicit(Capability::PlainChat) => self.plain_chat(request).await,
            SelectionMode::Explicit(capability) => self.invoke_explicit(capability, request).await,
            SelectionMode::ModelMediated => self.model_mediated(request).await,
        }
    }

    async fn summarize_document(
        &self,
        request: &DispatchRequest,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        let capability = Capability::DocumentSummary;
        let document = request.document_text.clone().unwrap_or_default();
        let args = CapabilityArgs::from([(capability.input_field().to_string(), document)]);

        let output = self.registry.invoke(capability, &args).await?;
        Ok((
            capability,
            CapabilityOutput {
                text: format!("{DOCUMENT_SUMMARY_FRAMING}\n\n{}", output.text),
                media: output.media,
            },
        ))
    }

    async fn invoke_explicit(
        &self,
        capability: Capability,
        request: &DispatchRequest,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        let input = match (capability, &request.document_text) {
            (Capability::DocumentSummary, Some(document)) => document.clone(),
            _ => user_content(&request.prompt, request.document_text.as_deref()),
        };
        let args = CapabilityArgs::from([(capability.input_field().to_string(), input)]);

        let output = self.registry.invoke(capability, &args).await?;
        Ok((capability, output))
    }

    async fn plain_chat(
        &self,
        request: &DispatchRequest,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        let system = system_prompt(CHAT_PREAMBLE, request.custom_instructions.as_deref());
        let messages = build_messages(
            Some(&system),
            &request.history,
            user_content(&request.prompt, request.document_text.as_deref()),
        );

        let response = self.chat.chat(&messages).await?;
        let text = response_text(response.as_ref())?;
        Ok((Capability::PlainChat, CapabilityOutput::text(text)))
    }

    async fn model_mediated(
        &self,
        request: &DispatchRequest,
    ) -> Result<(Capability, CapabilityOutput), DispatchError> {
        let system = system_prompt(ORCHESTRATOR_PREAMBLE, request.custom_instructions.as_deref());
        let messages = build_messages(
            Some(&system),
            &request.history,
            user_content(&request.prompt, request.document_text.as_deref()),
        );
        let tools = self.registry.tools();

        let response = self.chat.chat_with_tools(&messages, Some(tools.as_slice())).await?;

        let first_call = response
            .tool_calls()
            .and_then(|calls| calls.into_iter().next());
        if let Some(call) = first_call {
            log::debug!("model selected {call}");
            return self.registry.invoke_tool_call(&call).await;
        }

        let text = response_text(response.as_ref())?;
        Ok((Capability::PlainChat, CapabilityOutput::text(text)))
    }

    async fn voice_response(&self, request: &DispatchRequest, text: &str) -> Option<String> {
        if !request.speak {
            return None;
        }
        let speech = self.speech.as_ref()?;
        match speech.synthesize(text, request.voice.as_deref()).await {
            Ok(media) => Some(media.media),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }
}

fn response_text(response: &dyn ChatResponse) -> Result<String, DispatchError> {
    response
        .text()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            DispatchError::Upstream(LLMError::ProviderError(
                "The AI did not generate a response.".into(),
            ))
        })
}
