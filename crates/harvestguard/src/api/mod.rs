//! Backend HTTP API: authentication, health check, single and batch scans.

mod client;
mod error;

pub use client::{ApiClient, TokenResponse};
pub use error::ApiError;
