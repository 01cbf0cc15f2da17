#![cfg(feature = "api")]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use llm_dispatch::{
    api::Server,
    async_trait,
    builder::DispatcherBuilder,
    chat::{ChatMessage, ChatProvider, ChatResponse, StructuredOutputFormat, Tool},
    error::LLMError,
    image::{GeneratedImage, ImageProvider},
    ToolCall,
};

#[derive(Debug)]
struct Reply(String);

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
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

/// Answers plain chat with a greeting and every capability with a failure.
struct EchoChat;

#[async_trait]
impl ChatProvider for EchoChat {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Ok(Box::new(Reply("Hello there".into())))
    }

    async fn chat_with_schema(
        &self,
        _messages: &[ChatMessage],
        _schema: &StructuredOutputFormat,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Err(LLMError::ProviderError("model unavailable".into()))
    }
}

struct NoImages;

#[async_trait]
impl ImageProvider for NoImages {
    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, LLMError> {
        Err(LLMError::ProviderError("no images".into()))
    }
}

fn server() -> Server {
    let dispatcher = DispatcherBuilder::new()
        .chat_provider(Arc::new(EchoChat))
        .image_provider(Arc::new(NoImages))
        .without_speech()
        .build()
        .unwrap();
    Server::new(dispatcher)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

fn dispatch_request(body: Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/v1/dispatch").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn empty_submission_is_a_bad_request() {
    let (status, body) = send(
        server().router(),
        dispatch_request(json!({"prompt": "   "}), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please enter a message or attach a document.");
    assert_eq!(body["responseText"], Value::Null);
}

#[tokio::test]
async fn plain_chat_answers_ok() {
    let (status, body) = send(
        server().router(),
        dispatch_request(json!({"prompt": "Hi", "capability": "plain-chat"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseText"], "Hello there");
    assert_eq!(body["capability"], "plain-chat");
    assert_eq!(body["audioUrl"], Value::Null);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn capability_failure_is_carried_in_the_body() {
    let (status, body) = send(
        server().router(),
        dispatch_request(json!({"prompt": "Bonjour", "capability": "translate"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Sorry, I encountered an error. "));
    assert!(error.contains("translate"));
    assert_eq!(body["responseText"], Value::Null);
}

#[tokio::test]
async fn capabilities_lists_plain_chat_first() {
    let request = Request::get("/v1/capabilities").body(Body::empty()).unwrap();
    let (status, body) = send(server().router(), request).await;

    assert_eq!(status, StatusCode::OK);
    let listing = body.as_array().unwrap();
    assert_eq!(listing.len(), 12);
    assert_eq!(listing[0]["name"], "plain-chat");
    assert!(listing[0].get("toolName").is_none());
    assert!(listing
        .iter()
        .any(|c| c["toolName"] == "languageTranslator" && c["inputField"] == "text"));
}

#[tokio::test]
async fn auth_key_is_enforced() {
    let app = server().with_auth_key("secret").router();

    let (status, _) = send(app.clone(), dispatch_request(json!({"prompt": "Hi"}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        app.clone(),
        dispatch_request(json!({"prompt": "Hi"}), Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        app,
        dispatch_request(json!({"prompt": "Hi", "capability": "plain-chat"}), Some("secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseText"], "Hello there");
}
