//! Server module for exposing the dispatcher via REST API
//!
//! Provides a REST API server with two endpoints:
//! - `POST /v1/dispatch` runs one conversation turn
//! - `GET /v1/capabilities` lists the registered capabilities
//!
//! Supports bearer authentication and permissive CORS.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::dispatch::Dispatcher;
use handlers::{handle_capabilities, handle_dispatch};

pub use types::CapabilityInfo;

/// Main server struct that manages the dispatcher and authentication
pub struct Server {
    /// Dispatcher shared by all requests
    dispatcher: Arc<Dispatcher>,
    /// Optional authentication key for API requests
    pub auth_key: Option<String>,
}

/// Internal server state shared between request handlers
#[derive(Clone)]
struct ServerState {
    dispatcher: Arc<Dispatcher>,
    auth_key: Option<String>,
}

impl Server {
    /// Creates a new server instance around a dispatcher
    pub fn new(dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
            auth_key: None,
        }
    }

    /// Sets the authentication key required for API requests
    ///
    /// # Arguments
    /// * `key` - API key that clients must provide in Authorization header
    pub fn with_auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth_key = Some(key.into());
        self
    }

    /// Router with all routes, CORS and state attached.
    pub fn router(self) -> Router {
        Router::new()
            .route("/v1/dispatch", post(handle_dispatch))
            .route("/v1/capabilities", get(handle_capabilities))
            .layer(CorsLayer::permissive())
            .with_state(ServerState {
                dispatcher: self.dispatcher,
                auth_key: self.auth_key,
            })
    }

    /// Starts the server and listens for requests on the specified address
    ///
    /// # Arguments
    /// * `addr` - Address to bind to (e.g. "127.0.0.1:3000")
    pub async fn run(self, addr: &str) -> Result<(), crate::error::LLMError> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::LLMError::InvalidRequest(e.to_string()))?;
        log::info!("listening on {addr}");

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::LLMError::InvalidRequest(e.to_string()))?;

        Ok(())
    }
}
