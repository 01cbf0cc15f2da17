use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use llm_dispatch::{
    async_trait,
    builder::DispatcherBuilder,
    capability::Capability,
    chat::{ChatMessage, ChatProvider, ChatResponse, ChatRole, StructuredOutputFormat, Tool},
    dispatch::{DispatchRequest, Dispatcher, RequestAssembler, SelectionMode},
    error::LLMError,
    history::{Attachment, Role, Session, TurnContent},
    image::{GeneratedImage, ImageProvider},
    tts::{wav, TextToSpeechProvider},
    FunctionCall, ToolCall,
};

#[derive(Debug, Clone, Default)]
struct FakeResponse {
    text: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

impl std::fmt::Display for FakeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text.clone().unwrap_or_default())
    }
}

impl ChatResponse for FakeResponse {
    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        self.tool_calls.clone()
    }
}

/// Chat model with a fixed conversational reply and a fixed structured-output reply.
struct FakeChat {
    reply: FakeResponse,
    schema_reply: Result<String, String>,
    chat_calls: AtomicUsize,
    schema_calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    seen_tools: Mutex<Vec<String>>,
}

impl FakeChat {
    fn new(reply: FakeResponse, schema_reply: Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            schema_reply: schema_reply.map(str::to_owned).map_err(str::to_owned),
            chat_calls: AtomicUsize::new(0),
            schema_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            seen_tools: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst) + self.schema_calls.load(Ordering::SeqCst)
    }

    fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        if let Some(tools) = tools {
            let mut seen = self.seen_tools.lock().unwrap();
            seen.extend(tools.iter().map(|t| t.function.name.clone()));
        }
        Ok(Box::new(self.reply.clone()))
    }

    async fn chat_with_schema(
        &self,
        messages: &[ChatMessage],
        _schema: &StructuredOutputFormat,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        match &self.schema_reply {
            Ok(text) => Ok(Box::new(FakeResponse {
                text: Some(text.clone()),
                tool_calls: None,
            })),
            Err(e) => Err(LLMError::ProviderError(e.clone())),
        }
    }
}

struct FakeSpeech {
    pcm: Vec<u8>,
    calls: AtomicUsize,
    spoken: Mutex<Vec<String>>,
}

impl FakeSpeech {
    fn new(pcm: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            pcm,
            calls: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextToSpeechProvider for FakeSpeech {
    async fn speech(&self, text: &str, _voice: Option<&str>) -> Result<Vec<u8>, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(self.pcm.clone())
    }
}

struct FakeImage {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageProvider for FakeImage {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage::from_base64_png("iVBORw0KGgo="))
    }
}

struct Harness {
    chat: Arc<FakeChat>,
    speech: Arc<FakeSpeech>,
    image: Arc<FakeImage>,
    dispatcher: Arc<Dispatcher>,
}

fn harness(chat: Arc<FakeChat>, pcm: Vec<u8>, mode: SelectionMode) -> Harness {
    let speech = FakeSpeech::new(pcm);
    let image = Arc::new(FakeImage {
        calls: AtomicUsize::new(0),
    });
    let dispatcher = DispatcherBuilder::new()
        .chat_provider(chat.clone())
        .image_provider(image.clone())
        .speech_provider(speech.clone())
        .mode(mode)
        .build()
        .expect("dispatcher");
    Harness {
        chat,
        speech,
        image,
        dispatcher: Arc::new(dispatcher),
    }
}

fn text_reply(text: &str) -> FakeResponse {
    FakeResponse {
        text: Some(text.to_string()),
        tool_calls: None,
    }
}

fn tool_reply(name: &str, arguments: &str) -> FakeResponse {
    FakeResponse {
        text: None,
        tool_calls: Some(vec![ToolCall {
            id: "call_0".to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }]),
    }
}

fn one_second_of_silence() -> Vec<u8> {
    vec![0u8; 48_000]
}

#[tokio::test]
async fn explicit_translate_returns_translation_and_audio() {
    let h = harness(
        FakeChat::new(text_reply("unused"), Ok(r#"{"translation": "Bonjour"}"#)),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let request = RequestAssembler::new("Translate 'good morning' to French")
        .capability(Some(Capability::Translate))
        .build()
        .unwrap();
    let result = h.dispatcher.dispatch(request).await;

    assert_eq!(result.error, None);
    assert_eq!(result.response_text.as_deref(), Some("Bonjour"));
    assert_eq!(result.capability, Some(Capability::Translate));
    assert_eq!(h.chat.chat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.chat.schema_calls.load(Ordering::SeqCst), 1);

    let audio = result.audio_url.expect("audio");
    let bytes = wav::from_data_uri(&audio).unwrap();
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, 24_000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(h.speech.spoken.lock().unwrap().as_slice(), ["Bonjour"]);
}

#[tokio::test]
async fn model_selected_tool_output_is_final_response() {
    let h = harness(
        FakeChat::new(
            tool_reply("languageTranslator", r#"{"text": "good morning -> French"}"#),
            Ok(r#"{"translation": "Bonjour"}"#),
        ),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let request = RequestAssembler::new("How do I say good morning in French?")
        .build()
        .unwrap();
    let outcome = h.dispatcher.try_dispatch(request).await.unwrap();

    assert_eq!(outcome.response_text, "Bonjour");
    assert_eq!(outcome.capability, Capability::Translate);
    assert_eq!(h.chat.calls(), 2);
    assert_eq!(h.chat.last_messages().last().unwrap().content, "good morning -> French");

    let offered = h.chat.seen_tools.lock().unwrap().clone();
    assert_eq!(offered.len(), 11);
    assert!(offered.contains(&"webSearch".to_string()));
}

#[tokio::test]
async fn model_text_without_tool_call_is_the_response() {
    let h = harness(
        FakeChat::new(text_reply("Hi there! How can I help?"), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let request = RequestAssembler::new("Hello")
        .custom_instructions(Some("Always be cheerful.".into()))
        .build()
        .unwrap();
    let outcome = h.dispatcher.try_dispatch(request).await.unwrap();

    assert_eq!(outcome.response_text, "Hi there! How can I help?");
    assert_eq!(outcome.capability, Capability::PlainChat);
    assert_eq!(h.chat.calls(), 1);

    let messages = h.chat.last_messages();
    assert_eq!(messages[0].role, ChatRole::System);
    assert!(messages[0].content.contains("Always be cheerful."));
}

#[tokio::test]
async fn empty_model_reply_is_an_error() {
    let h = harness(
        FakeChat::new(text_reply("   "), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let result = h
        .dispatcher
        .dispatch(RequestAssembler::new("Hello").build().unwrap())
        .await;
    assert_eq!(
        result.error.as_deref(),
        Some("Sorry, I encountered an error. Provider Error: The AI did not generate a response.")
    );
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn document_only_submission_is_summarized() {
    let h = harness(
        FakeChat::new(text_reply("unused"), Ok(r#"{"summary": "Three key points."}"#)),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );
    let mut session = Session::new(h.dispatcher.clone());

    let result = session
        .submit("", Some(Attachment::new("notes.txt", "A very long document.")))
        .await;

    let text = result.response_text.expect("response");
    assert!(text.starts_with("Here is a summary of the attached document:"));
    assert!(text.ends_with("Three key points."));
    assert_eq!(result.capability, Some(Capability::DocumentSummary));

    // routed directly, no selection call
    assert_eq!(h.chat.chat_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.chat.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.chat.last_messages().last().unwrap().content,
        "A very long document."
    );

    let turns = session.turns();
    assert_eq!(turns.len(), 2);
    assert!(turns[0].is_document_only());
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(session.state().title, "notes.txt");
}

#[tokio::test]
async fn failing_capability_keeps_user_turn_and_skips_speech() {
    let h = harness(
        FakeChat::new(text_reply("unused"), Err("model overloaded")),
        one_second_of_silence(),
        SelectionMode::Explicit(Capability::EmailDraft),
    );
    let mut session = Session::new(h.dispatcher.clone());

    let result = session.submit("Email my boss about Friday", None).await;

    let error = result.error.expect("error");
    assert!(error.starts_with("Sorry, I encountered an error."));
    assert!(error.contains("model overloaded"));
    assert!(result.response_text.is_none());
    assert!(result.audio_url.is_none());
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);

    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.turns()[0].role, Role::User);
}

#[tokio::test]
async fn empty_speech_payload_degrades_to_text_only() {
    let h = harness(
        FakeChat::new(text_reply("unused"), Ok(r#"{"answer": "x = 4"}"#)),
        Vec::new(),
        SelectionMode::Explicit(Capability::HomeworkHelp),
    );

    let result = h
        .dispatcher
        .dispatch(RequestAssembler::new("Solve 2x = 8").build().unwrap())
        .await;

    assert_eq!(result.response_text.as_deref(), Some("x = 4"));
    assert!(result.audio_url.is_none());
    assert!(result.error.is_none());
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_input_makes_no_calls() {
    let h = harness(
        FakeChat::new(text_reply("unused"), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let request = DispatchRequest {
        prompt: "   ".into(),
        history: Vec::new(),
        document_text: Some(String::new()),
        custom_instructions: None,
        voice: None,
        capability: None,
        speak: true,
    };
    let result = h.dispatcher.dispatch(request).await;

    assert_eq!(
        result.error.as_deref(),
        Some("Please enter a message or attach a document.")
    );
    assert!(result.response_text.is_none());
    assert_eq!(h.chat.calls(), 0);
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.image.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn history_grows_user_then_assistant() {
    let h = harness(
        FakeChat::new(text_reply("Sure."), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );
    let mut session = Session::new(h.dispatcher.clone());

    session.submit("First question", None).await;
    session.submit("Second question", None).await;

    let roles: Vec<_> = session.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );

    // second request carries the first round trip as history
    let contents: Vec<_> = h
        .chat
        .last_messages()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(
        &contents[1..],
        ["First question", "Sure.", "Second question"]
    );
}

#[tokio::test]
async fn generated_image_is_structured_content() {
    let h = harness(
        FakeChat::new(
            tool_reply("imageCreator", r#"{"prompt": "a lighthouse at dusk"}"#),
            Ok("unused"),
        ),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );
    let mut session = Session::new(h.dispatcher.clone());

    let result = session.submit("Draw a lighthouse at dusk", None).await;

    assert_eq!(
        result.structured_content.as_deref(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
    assert_eq!(h.image.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        session.turns()[1].content,
        Some(TurnContent::GeneratedImage { .. })
    ));
}

#[tokio::test]
async fn unknown_tool_from_model_is_a_capability_error() {
    let h = harness(
        FakeChat::new(tool_reply("stockTrader", "{}"), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::ModelMediated,
    );

    let err = h
        .dispatcher
        .try_dispatch(RequestAssembler::new("Buy shares").build().unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stockTrader"));
}

#[tokio::test]
async fn speak_false_skips_synthesis() {
    let h = harness(
        FakeChat::new(text_reply("Quiet reply"), Ok("unused")),
        one_second_of_silence(),
        SelectionMode::Explicit(Capability::PlainChat),
    );

    let request = RequestAssembler::new("Hello").speak(false).build().unwrap();
    let result = h.dispatcher.dispatch(request).await;

    assert_eq!(result.response_text.as_deref(), Some("Quiet reply"));
    assert!(result.audio_url.is_none());
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 0);
}
