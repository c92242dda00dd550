//! Scan submission: validate, upload, normalize, reconcile.

use crate::api::{ApiClient, ApiError};
use crate::scan::file::{validate_batch, validate_single, ImageFile};
use crate::scan::result::ScanResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const SINGLE_SUCCESS: &str = "Single image scanned successfully!";
pub const BATCH_SUCCESS: &str = "Batch images scanned successfully!";
pub const BATCH_PARTIAL: &str = "Some images failed to scan. Check results for details.";
pub const SINGLE_FAILED: &str = "The image could not be scanned. Check results for details.";
const MISSING_RESULT: &str = "No result returned for this image";

/// Result rows of one submission plus the message shown with them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub results: Vec<ScanResult>,
    /// At least one row carries an error decision.
    pub partial_failure: bool,
    pub message: String,
}

impl ScanOutcome {
    pub fn single(result: ScanResult) -> Self {
        Self::from_results(vec![result], SINGLE_SUCCESS, SINGLE_FAILED)
    }

    pub fn batch(results: Vec<ScanResult>) -> Self {
        Self::from_results(results, BATCH_SUCCESS, BATCH_PARTIAL)
    }

    fn from_results(results: Vec<ScanResult>, success: &str, failed: &str) -> Self {
        let partial_failure = results.iter().any(ScanResult::is_error);
        let message = if partial_failure {
            failed.to_string()
        } else {
            success.to_string()
        };
        Self {
            results,
            partial_failure,
            message,
        }
    }
}

/// Scan one image. Fails locally, without a request, when no file is selected
/// or the token is missing. The returned row always names the submitted file.
pub async fn scan_single(
    client: &ApiClient,
    file: Option<&ImageFile>,
    token: Option<&str>,
) -> Result<ScanResult, ApiError> {
    let file = validate_single(file)?;
    let mut result = client.upload_image(file, token).await?;
    if result.image != file.name() {
        debug!(reported = %result.image, submitted = file.name(), "renaming single result");
        result.image = file.name().to_string();
    }
    Ok(result)
}

/// Scan several images in one request. Per-item failures come back as error
/// rows; the call itself only fails for local, network or HTTP-level errors.
/// Always yields exactly one row per submitted file.
pub async fn scan_batch(
    client: &ApiClient,
    files: &[ImageFile],
    token: Option<&str>,
) -> Result<Vec<ScanResult>, ApiError> {
    validate_batch(files)?;
    let results = client.batch_scan(files, token).await?;
    Ok(reconcile_batch(files, results))
}

/// Match backend rows to submitted files by name. Rows with unknown names fill
/// files still missing a row and take that file's name. Files left over get an
/// error placeholder and surplus rows are dropped. Every row names a submitted file.
pub fn reconcile_batch(files: &[ImageFile], results: Vec<ScanResult>) -> Vec<ScanResult> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    for file in files {
        *pending.entry(file.name()).or_default() += 1;
    }

    let mut matched = Vec::with_capacity(files.len());
    let mut unmatched = Vec::new();
    for mut result in results {
        let name = result.image_basename().to_string();
        match pending.get_mut(name.as_str()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                result.image = name;
                matched.push(result);
            }
            _ => unmatched.push(result),
        }
    }

    let missing: Vec<&str> = files
        .iter()
        .filter_map(|f| {
            let n = pending.get_mut(f.name())?;
            if *n > 0 {
                *n -= 1;
                Some(f.name())
            } else {
                None
            }
        })
        .collect();

    let mut unmatched = unmatched.into_iter();
    for name in missing {
        match unmatched.next() {
            Some(mut result) => {
                debug!(reported = %result.image, submitted = name, "assigning unmatched row");
                result.image = name.to_string();
                matched.push(result);
            }
            None => {
                warn!(image = name, "backend returned no row for image");
                matched.push(ScanResult::error_placeholder(name, MISSING_RESULT));
            }
        }
    }
    let surplus = unmatched.count();
    if surplus > 0 {
        warn!(surplus, "dropping rows for images that were not submitted");
    }
    matched
}
