//! Mock backend for testing
//!
//! Returns canned replies for the single completion operation, so the
//! guardrail and augmentation layers can be exercised without a provider.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::CompletionBackend;

/// Mock completion backend
///
/// By default replies with a minimal valid forecast payload; tests configure
/// it with `with_response` or make it fail with `failing`.
#[derive(Clone)]
pub struct MockBackend {
    response: String,
    fail_status: Option<u16>,
    healthy: bool,
}

impl MockBackend {
    /// Create a mock that answers with a minimal valid forecast
    pub fn new() -> Self {
        Self {
            response: r#"{"forecast_total": 0, "confidence": 50, "items": [], "scenarios": []}"#
                .to_string(),
            fail_status: None,
            healthy: true,
        }
    }

    /// Create a mock that answers with the given text
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail_status: None,
            healthy: true,
        }
    }

    /// Create a mock whose completion call fails with the given status
    pub fn failing(status: u16) -> Self {
        Self {
            response: String::new(),
            fail_status: Some(status),
            healthy: false,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        if let Some(status) = self.fail_status {
            return Err(Error::Provider {
                status,
                body: "mock provider failure".to_string(),
            });
        }
        Ok(self.response.clone())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
