//! Scan result model, normalized from the backend's schema variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// Categorical outcome of one image scan.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decision {
    /// Accepted as genuine.
    Accept,
    /// Flagged as counterfeit, expired or otherwise suspect.
    Flag,
    /// The backend could not evaluate this image.
    Error,
    /// A label this client does not know; shown verbatim.
    Other(String),
}

impl Decision {
    /// Case-insensitive parse of the labels the backend has used across versions.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "accept" | "accepted" | "genuine" | "authentic" => Decision::Accept,
            "flag" | "flagged" | "counterfeit" | "expired" | "suspect" => Decision::Flag,
            "error" | "failed" => Decision::Error,
            _ => Decision::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Decision::Accept => "Accept",
            Decision::Flag => "Flag",
            Decision::Error => "ERROR",
            Decision::Other(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Decision::Error)
    }
}

impl From<String> for Decision {
    fn from(s: String) -> Self {
        Decision::parse(&s)
    }
}

impl From<Decision> for String {
    fn from(d: Decision) -> Self {
        d.as_str().to_string()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation of a single image, in canonical field names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScanResult")]
pub struct ScanResult {
    pub image: String,
    pub decision: Decision,
    /// 0..=1.
    pub confidence: f64,
    pub reconstruction_error: f64,
    pub is_anomaly: bool,
    /// RFC 3339 date-time as sent by the backend.
    pub timestamp: Option<String>,
    /// Per-item failure detail on error rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire shape: every name the backend has used for a field.
#[derive(Deserialize)]
struct RawScanResult {
    image: Option<String>,
    filename: Option<String>,
    image_filename: Option<String>,
    decision: Option<String>,
    action: Option<String>,
    prediction: Option<String>,
    confidence: Option<f64>,
    reconstruction_error: Option<f64>,
    anomaly_score: Option<f64>,
    is_anomaly: Option<bool>,
    timestamp: Option<String>,
    scanned_at: Option<String>,
    error: Option<String>,
    detail: Option<String>,
}

/// A row carrying neither a decision nor an error is not a scan result.
impl TryFrom<RawScanResult> for ScanResult {
    type Error = String;

    fn try_from(raw: RawScanResult) -> Result<Self, Self::Error> {
        let error = raw.error.or(raw.detail).filter(|e| !e.trim().is_empty());
        let decision = match raw
            .decision
            .or(raw.action)
            .or(raw.prediction)
            .filter(|d| !d.trim().is_empty())
        {
            Some(d) => Decision::parse(&d),
            None if error.is_some() => Decision::Error,
            None => return Err("scan result has no decision or error".to_string()),
        };
        let is_anomaly = raw
            .is_anomaly
            .unwrap_or(matches!(decision, Decision::Flag));
        Ok(Self {
            image: raw
                .image
                .or(raw.filename)
                .or(raw.image_filename)
                .unwrap_or_default(),
            decision,
            confidence: raw.confidence.unwrap_or(0.0),
            reconstruction_error: raw.reconstruction_error.or(raw.anomaly_score).unwrap_or(0.0),
            is_anomaly,
            timestamp: raw.timestamp.or(raw.scanned_at).filter(|t| !t.trim().is_empty()),
            error,
        })
    }
}

impl ScanResult {
    /// Row standing in for an image the backend did not evaluate.
    pub fn error_placeholder(image: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            decision: Decision::Error,
            confidence: 0.0,
            reconstruction_error: 0.0,
            is_anomaly: false,
            timestamp: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.decision.is_error()
    }

    /// Timestamp as UTC. Offset-less values (naive UTC) are accepted.
    pub fn timestamp_utc(&self) -> Option<OffsetDateTime> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }

    /// `2024-05-01 10:00:00 UTC`, or `N/A`.
    pub fn display_timestamp(&self) -> String {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
        self.timestamp_utc()
            .and_then(|t| t.format(&fmt).ok())
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Confidence as a percentage with two decimals.
    pub fn display_confidence(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }

    pub fn display_reconstruction_error(&self) -> String {
        format!("{:.5}", self.reconstruction_error)
    }

    /// File name without any directory the backend may have prefixed.
    pub(crate) fn image_basename(&self) -> &str {
        self.image
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.image.as_str())
    }
}

fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(t);
    }
    OffsetDateTime::parse(&format!("{}Z", s), &Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_labels() {
        assert_eq!(Decision::parse("Accept"), Decision::Accept);
        assert_eq!(Decision::parse("ACCEPTED"), Decision::Accept);
        assert_eq!(Decision::parse("FLAGGED"), Decision::Flag);
        assert_eq!(Decision::parse(" flag "), Decision::Flag);
        assert_eq!(Decision::parse("ERROR"), Decision::Error);
        assert_eq!(
            Decision::parse("Review"),
            Decision::Other("Review".to_string())
        );
        assert_eq!(Decision::Error.to_string(), "ERROR");
    }

    #[test]
    fn canonical_fields() {
        let r: ScanResult = serde_json::from_str(
            r#"{"image":"a.jpg","decision":"Accept","confidence":0.91,
                "reconstruction_error":0.01234,"is_anomaly":false,
                "timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(r.image, "a.jpg");
        assert_eq!(r.decision, Decision::Accept);
        assert!(!r.is_anomaly);
        assert_eq!(r.display_timestamp(), "2024-05-01 10:00:00 UTC");
    }

    #[test]
    fn batch_variant_names_normalize() {
        let r: ScanResult = serde_json::from_str(
            r#"{"filename":"b.png","action":"Flag","confidence":0.77,
                "reconstruction_error":0.04,"is_anomaly":true,
                "scanned_at":"2024-05-01T10:00:00.123456"}"#,
        )
        .unwrap();
        assert_eq!(r.image, "b.png");
        assert_eq!(r.decision, Decision::Flag);
        assert!(r.timestamp_utc().is_some());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["image"], "b.png");
        assert_eq!(json["decision"], "Flag");
        assert!(json.get("filename").is_none());
    }

    #[test]
    fn both_names_present_prefers_canonical() {
        let r: ScanResult = serde_json::from_str(
            r#"{"image":"canon.jpg","filename":"alias.jpg","decision":"Accept","action":"Flag"}"#,
        )
        .unwrap();
        assert_eq!(r.image, "canon.jpg");
        assert_eq!(r.decision, Decision::Accept);
    }

    #[test]
    fn error_row_without_numbers() {
        let r: ScanResult =
            serde_json::from_str(r#"{"filename":"bad.jpg","error":"cannot identify image file"}"#)
                .unwrap();
        assert!(r.is_error());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.display_timestamp(), "N/A");
        assert_eq!(r.error.as_deref(), Some("cannot identify image file"));
    }

    #[test]
    fn row_without_decision_or_error_is_rejected() {
        assert!(serde_json::from_str::<ScanResult>(r#"{"status":"queued","result":null}"#).is_err());
        assert!(serde_json::from_str::<ScanResult>(r#"{"image":"a.jpg","confidence":0.5}"#).is_err());
        assert!(serde_json::from_str::<ScanResult>(r#"{"image":"a.jpg","decision":""}"#).is_err());
    }

    #[test]
    fn missing_anomaly_flag_follows_decision() {
        let r: ScanResult = serde_json::from_str(r#"{"image":"x.jpg","decision":"FLAGGED"}"#).unwrap();
        assert!(r.is_anomaly);
    }

    #[test]
    fn display_helpers() {
        let mut r = ScanResult::error_placeholder("uploads/tmp/c.jpg", "x");
        r.confidence = 0.98766;
        r.reconstruction_error = 0.0123456;
        assert_eq!(r.display_confidence(), "98.77%");
        assert_eq!(r.display_reconstruction_error(), "0.01235");
        assert_eq!(r.image_basename(), "c.jpg");
    }
}
