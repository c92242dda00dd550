//! Errors surfaced by the backend client. `Display` is the user-facing message.

use crate::config::ConfigError;
use crate::scan::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Local selection problem; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Missing token locally, or a 401 from the backend.
    #[error("{0}")]
    Unauthenticated(String),
    /// Non-2xx with the backend's detail message, or a generic one.
    #[error("{detail}")]
    Backend { status: u16, detail: String },
    #[error("Failed to connect to server")]
    Network(#[source] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthenticated(_))
    }

    /// HTTP status when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
