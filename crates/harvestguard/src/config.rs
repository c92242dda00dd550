//! Client configuration: backend location, timeouts, probe interval, session file.
//!
//! Load from: env `HARVESTGUARD_CONFIG_PATH`, or `./config/harvestguard.json`, or `./harvestguard.json`.
//! `HARVESTGUARD_SERVER_URL` overrides the server URL of whichever source was used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_HEALTH_PATH: &str = "/";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PROBE_INTERVAL_SECS: u64 = 5;
const DEFAULT_SESSION_PATH: &str = "./data/session.sqlite";
const SERVER_URL_ENV: &str = "HARVESTGUARD_SERVER_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid server url {0}: {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("unsupported server url scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where the backend lives and how the client talks to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, e.g. `http://localhost:8000`.
    pub server_url: String,
    /// Prefix of the versioned API routes.
    pub api_prefix: String,
    /// Health path relative to the server origin (not the API prefix).
    pub health_path: String,
    pub request_timeout_secs: u64,
    pub probe_interval_secs: u64,
    /// SQLite file holding the session token, role and last results.
    pub session_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            probe_interval_secs: PROBE_INTERVAL_SECS,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
        }
    }
}

impl ClientConfig {
    /// Load config from path. Returns default on error or missing file.
    pub fn load_from_path(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            debug!(path = %path.display(), "config file not readable, using defaults");
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Load config: env HARVESTGUARD_CONFIG_PATH, then ./config/harvestguard.json, then ./harvestguard.json.
    pub fn load() -> Self {
        Self::load_with_path(None)
    }

    /// Like [`ClientConfig::load`], but an explicit path replaces the lookup chain.
    /// `HARVESTGUARD_SERVER_URL` applies either way.
    pub fn load_with_path(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_file(),
        };
        config.apply_env();
        config
    }

    fn load_file() -> Self {
        if let Ok(path) = std::env::var("HARVESTGUARD_CONFIG_PATH") {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
        }
        for candidate in [
            Path::new("./config/harvestguard.json"),
            Path::new("./harvestguard.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Self::default()
    }

    fn apply_env(&mut self) {
        let url = std::env::var(SERVER_URL_ENV).ok();
        self.override_server_url(url.as_deref());
    }

    fn override_server_url(&mut self, url: Option<&str>) {
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            self.server_url = url.to_string();
        }
    }

    /// Parsed server origin. Only http and https are accepted.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.server_url.trim())
            .map_err(|e| ConfigError::InvalidUrl(self.server_url.clone(), e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Full URL of an API route, e.g. `endpoint("scan/batch")`.
    pub fn endpoint(&self, path: &str) -> String {
        let origin = self.server_url.trim().trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", origin, path)
        } else {
            format!("{}/{}/{}", origin, prefix, path)
        }
    }

    /// Full URL of the health check.
    pub fn health_url(&self) -> String {
        let origin = self.server_url.trim().trim_end_matches('/');
        format!("{}/{}", origin, self.health_path.trim_start_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}
