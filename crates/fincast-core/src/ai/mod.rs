//! Pluggable completion backend abstraction
//!
//! The forecast pipeline needs exactly one operation from a text-generation
//! provider: send a system instruction plus a prompt, get text back. Keeping
//! that behind a trait makes the guardrail and augmentation layers testable
//! with canned provider output, no network required.
//!
//! # Architecture
//!
//! - `CompletionBackend` trait: the single `complete` operation
//! - `CompletionClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables for `CompletionClient::from_env`:
//! - `FORECAST_PROVIDER_HOST`: Server URL (required)
//! - `FORECAST_PROVIDER_MODEL`: Model name (default: gpt-4o-mini)
//! - `FORECAST_PROVIDER_API_KEY`: Bearer token if required (optional)

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the single operation the core needs from a provider
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one completion request and return the reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for result metadata)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete completion client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum CompletionClient {
    /// OpenAI-compatible chat completions backend
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl CompletionClient {
    /// Create a completion client from environment variables
    ///
    /// Returns None if `FORECAST_PROVIDER_HOST` is not set.
    pub fn from_env() -> Option<Self> {
        OpenAICompatibleBackend::from_env().map(CompletionClient::OpenAICompatible)
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        CompletionClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self {
            CompletionClient::OpenAICompatible(b) => b.complete(system, user).await,
            CompletionClient::Mock(b) => b.complete(system, user).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            CompletionClient::OpenAICompatible(b) => b.health_check().await,
            CompletionClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            CompletionClient::OpenAICompatible(b) => b.model(),
            CompletionClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            CompletionClient::OpenAICompatible(b) => b.host(),
            CompletionClient::Mock(b) => b.host(),
        }
    }
}
