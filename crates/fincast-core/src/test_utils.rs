//! Test utilities for fincast-core
//!
//! Provides a mock OpenAI-compatible server for gateway tests and local
//! development. Enabled in unit tests and behind the `test-utils` feature.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What the mock provider answers with
#[derive(Debug, Clone)]
pub enum MockProviderMode {
    /// Reply 200 with the given text as `choices[0].message.content`
    Content(String),
    /// Reply with this HTTP status and an error body
    Error(u16),
}

/// Mock OpenAI-compatible chat completions server
pub struct MockProviderServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockProviderServer {
    /// Start the mock server on an available port
    pub async fn start(mode: MockProviderMode) -> Self {
        let state = Arc::new(mode);
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Models list endpoint (health check target)
async fn handle_models() -> Json<serde_json::Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "gpt-4o-mini", "object": "model"}]
    }))
}

/// Chat completions endpoint
async fn handle_chat(State(mode): State<Arc<MockProviderMode>>) -> impl IntoResponse {
    match mode.as_ref() {
        MockProviderMode::Content(content) => (
            StatusCode::OK,
            Json(json!({
                "id": "chatcmpl-mock",
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }]
            })),
        ),
        MockProviderMode::Error(status) => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({"error": {"message": "mock provider error"}})),
        ),
    }
}
