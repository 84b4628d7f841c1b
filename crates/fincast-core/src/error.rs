//! Error types for fincast

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// True for transport-level failures (timeout, connection refused) as
    /// opposed to a reachable provider answering with a non-2xx status or
    /// unusable payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
