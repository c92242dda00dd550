//! harvestguard: client for the HarvestGuard agricultural-product authenticity scanner.
//!
//! Keeps the session token, probes backend health, and submits single or batch
//! image scans, normalizing the backend's result schema into one model.
//! Detection itself happens on the backend.

pub mod api;
pub mod config;
pub mod probe;
pub mod report;
pub mod scan;
pub mod session;

pub use api::{ApiClient, ApiError, TokenResponse};
pub use config::ClientConfig;
pub use probe::{ServerStatus, StatusProbe};
pub use report::{ResultsSummary, ResultsView};
pub use scan::{
    scan_batch, scan_single, Decision, ImageFile, ScanForm, ScanMode, ScanOutcome, ScanResult,
    SubmitOutcome,
};
pub use session::{Session, SessionStore};
