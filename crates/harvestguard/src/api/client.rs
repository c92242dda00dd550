//! reqwest client for the HarvestGuard backend.

use crate::api::error::ApiError;
use crate::config::ClientConfig;
use crate::probe::ServerStatus;
use crate::scan::{ImageFile, ScanResult};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

const MISSING_TOKEN: &str = "Not authenticated: please log in first.";

/// Body of a successful login or registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub role: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: &'a str,
}

/// Single scan: either the result itself or `{ "status": .., "result": .. }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SingleScanBody {
    Wrapped { result: ScanResult },
    Bare(ScanResult),
}

/// Batch scan: a bare array or `{ "total_scanned": .., "results": [..] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchScanBody {
    Wrapped { results: Vec<ScanResult> },
    Bare(Vec<ScanResult>),
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Pull the backend's `detail` out of an error body. Handles plain strings and
/// validation error lists (first `msg`).
fn detail_from_body(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let detail = match parsed.detail? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|m| m.as_str())
            .map(str::to_string)?,
        serde_json::Value::Object(map) => map.get("msg").and_then(|m| m.as_str())?.to_string(),
        _ => return None,
    };
    let detail = detail.trim().to_string();
    (!detail.is_empty()).then_some(detail)
}

fn bearer(token: Option<&str>) -> Result<&str, ApiError> {
    match token.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ApiError::Unauthenticated(MISSING_TOKEN.to_string())),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("{}: {}", what, e)))
}

/// Typed client over the backend's auth, health and scan routes. No retries:
/// a failed call is reported and left to the user to repeat.
pub struct ApiClient {
    config: ClientConfig,
    client: reqwest::Client,
    request_count: AtomicU64,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        config.base_url()?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()
            .map_err(ApiError::Request)?;
        Ok(Self {
            config,
            client,
            request_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Requests sent so far, health checks included.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<String, ApiError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let res = req.send().await.map_err(ApiError::Network)?;
        let status = res.status();
        let body = res.text().await.map_err(ApiError::Network)?;
        if status.is_success() {
            return Ok(body);
        }
        let detail = detail_from_body(&body).unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), %detail, "backend rejected request");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthenticated(detail));
        }
        Err(ApiError::Backend {
            status: status.as_u16(),
            detail,
        })
    }

    fn checked_token(token: TokenResponse) -> Result<TokenResponse, ApiError> {
        if token.access_token.trim().is_empty() {
            return Err(ApiError::Unauthenticated(
                "backend returned an empty token".to_string(),
            ));
        }
        Ok(token)
    }

    /// `POST auth/token` with form-encoded credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let req = self
            .client
            .post(self.config.endpoint("auth/token"))
            .form(&[("username", username), ("password", password)]);
        let body = self.send(req, "Login failed").await?;
        let token = Self::checked_token(decode(&body, "token")?)?;
        info!(username, role = ?token.role, "logged in");
        Ok(token)
    }

    /// `POST auth/register` with a JSON body.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<TokenResponse, ApiError> {
        let req = self
            .client
            .post(self.config.endpoint("auth/register"))
            .json(&RegisterRequest {
                username,
                password,
                email,
            });
        let body = self.send(req, "Registration failed").await?;
        let token = Self::checked_token(decode(&body, "token")?)?;
        info!(username, role = ?token.role, "registered");
        Ok(token)
    }

    /// Health check. Never fails: any error or non-2xx is `Offline`.
    pub async fn check_status(&self) -> ServerStatus {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        match self.client.get(self.config.health_url()).send().await {
            Ok(res) if res.status().is_success() => ServerStatus::Online,
            Ok(res) => {
                debug!(status = res.status().as_u16(), "health check not ok");
                ServerStatus::Offline
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                ServerStatus::Offline
            }
        }
    }

    fn part(file: &ImageFile) -> Result<Part, ApiError> {
        Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.kind().mime())
            .map_err(ApiError::Request)
    }

    /// `POST scan/upload-image`, multipart field `file`.
    pub async fn upload_image(
        &self,
        file: &ImageFile,
        token: Option<&str>,
    ) -> Result<ScanResult, ApiError> {
        let token = bearer(token)?;
        let form = Form::new().part("file", Self::part(file)?);
        let req = self
            .client
            .post(self.config.endpoint("scan/upload-image"))
            .bearer_auth(token)
            .multipart(form);
        debug!(image = file.name(), bytes = file.len(), "uploading image");
        let body = self.send(req, "Scan failed").await?;
        let result = match decode::<SingleScanBody>(&body, "scan result")? {
            SingleScanBody::Wrapped { result } => result,
            SingleScanBody::Bare(result) => result,
        };
        info!(image = %result.image, decision = %result.decision, "scan complete");
        Ok(result)
    }

    /// `POST scan/batch`, one repeated multipart field `files` per image.
    pub async fn batch_scan(
        &self,
        files: &[ImageFile],
        token: Option<&str>,
    ) -> Result<Vec<ScanResult>, ApiError> {
        let token = bearer(token)?;
        let mut form = Form::new();
        for file in files {
            form = form.part("files", Self::part(file)?);
        }
        let req = self
            .client
            .post(self.config.endpoint("scan/batch"))
            .bearer_auth(token)
            .multipart(form);
        debug!(count = files.len(), "uploading batch");
        let body = self.send(req, "Batch scan failed").await?;
        let results = match decode::<BatchScanBody>(&body, "batch results")? {
            BatchScanBody::Wrapped { results } => results,
            BatchScanBody::Bare(results) => results,
        };
        info!(submitted = files.len(), returned = results.len(), "batch complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_shapes() {
        assert_eq!(
            detail_from_body(r#"{"detail":"Incorrect username or password"}"#).as_deref(),
            Some("Incorrect username or password")
        );
        assert_eq!(
            detail_from_body(r#"{"detail":[{"loc":["body","file"],"msg":"field required"}]}"#)
                .as_deref(),
            Some("field required")
        );
        assert_eq!(detail_from_body(r#"{"detail":""}"#), None);
        assert_eq!(detail_from_body(r#"{"message":"nope"}"#), None);
        assert_eq!(detail_from_body("<html>502</html>"), None);
    }

    #[test]
    fn bearer_requires_non_empty_token() {
        assert!(bearer(None).unwrap_err().is_auth());
        assert!(bearer(Some("  ")).unwrap_err().is_auth());
        assert_eq!(bearer(Some("abc")).unwrap(), "abc");
    }

    #[test]
    fn single_body_both_shapes() {
        let wrapped: SingleScanBody = serde_json::from_str(
            r#"{"status":"success","result":{"image":"a.jpg","decision":"Accept"}}"#,
        )
        .unwrap();
        assert!(matches!(wrapped, SingleScanBody::Wrapped { ref result } if result.image == "a.jpg"));
        let bare: SingleScanBody =
            serde_json::from_str(r#"{"image":"a.jpg","decision":"Flag"}"#).unwrap();
        assert!(matches!(bare, SingleScanBody::Bare(ref r) if r.image == "a.jpg"));
    }

    #[test]
    fn single_body_without_result_does_not_decode() {
        let err = decode::<SingleScanBody>(r#"{"status":"queued","result":null}"#, "scan result")
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(decode::<BatchScanBody>(r#"{"results":[{"filename":"a.jpg"}]}"#, "batch").is_err());
    }

    #[test]
    fn batch_body_both_shapes() {
        let wrapped: BatchScanBody = serde_json::from_str(
            r#"{"total_scanned":1,"results":[{"filename":"a.jpg","action":"Accept"}]}"#,
        )
        .unwrap();
        assert!(matches!(wrapped, BatchScanBody::Wrapped { ref results } if results.len() == 1));
        let bare: BatchScanBody =
            serde_json::from_str(r#"[{"filename":"a.jpg","action":"Accept"},{"filename":"b.jpg","action":"ERROR"}]"#)
                .unwrap();
        assert!(matches!(bare, BatchScanBody::Bare(ref r) if r.len() == 2));
    }

    #[test]
    fn token_defaults() {
        let t: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(t.token_type, "bearer");
        assert_eq!(t.role, None);
        assert!(ApiClient::checked_token(TokenResponse {
            access_token: " ".into(),
            token_type: "bearer".into(),
            role: None,
        })
        .is_err());
    }

    #[test]
    fn rejects_bad_server_url() {
        let config = ClientConfig {
            server_url: "localhost:8000".into(),
            ..Default::default()
        };
        assert!(matches!(ApiClient::new(config), Err(ApiError::Config(_))));
    }
}
