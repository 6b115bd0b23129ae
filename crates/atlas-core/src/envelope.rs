//! The single failure shape surfaced to callers.
//!
//! Every remote call and every cache-store operation reports failure as
//! an [`ErrorEnvelope`]: a status (HTTP code or one of the symbolic
//! variants), a `detail` naming the specific cause, and an optional
//! short `message`. Structured API error bodies contribute their
//! `title`, `code` and field-level `errors`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status slot of an envelope.
///
/// Serialized as the bare HTTP code, or as `"customErr"`, `"unknown"`,
/// `"error"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr", into = "StatusRepr")]
pub enum EnvelopeStatus {
    Http(u16),
    CustomErr,
    Unknown,
    Error,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u16),
    Tag(String),
}

impl TryFrom<StatusRepr> for EnvelopeStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> Result<Self, String> {
        match repr {
            StatusRepr::Code(code) => Ok(EnvelopeStatus::Http(code)),
            StatusRepr::Tag(tag) => match tag.as_str() {
                "customErr" => Ok(EnvelopeStatus::CustomErr),
                "unknown" => Ok(EnvelopeStatus::Unknown),
                "error" => Ok(EnvelopeStatus::Error),
                other => Err(format!("unrecognised envelope status `{other}`")),
            },
        }
    }
}

impl From<EnvelopeStatus> for StatusRepr {
    fn from(status: EnvelopeStatus) -> Self {
        match status {
            EnvelopeStatus::Http(code) => StatusRepr::Code(code),
            EnvelopeStatus::CustomErr => StatusRepr::Tag("customErr".into()),
            EnvelopeStatus::Unknown => StatusRepr::Tag("unknown".into()),
            EnvelopeStatus::Error => StatusRepr::Tag("error".into()),
        }
    }
}

impl fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeStatus::Http(code) => write!(f, "{code}"),
            EnvelopeStatus::CustomErr => f.write_str("customErr"),
            EnvelopeStatus::Unknown => f.write_str("unknown"),
            EnvelopeStatus::Error => f.write_str("error"),
        }
    }
}

/// Which class of failure produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response was obtained.
    Transport,
    /// No response was obtained and the host reports no connectivity.
    Connectivity,
    /// A response (or stored payload) could not be decoded.
    Decode,
    /// The HTTP status signalled failure.
    HttpStatus,
    /// The HTTP status signalled success but the payload did not.
    Semantic,
    /// The persistent cache store failed.
    CacheStore,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Connectivity => "connectivity",
            FailureKind::Decode => "decode",
            FailureKind::HttpStatus => "http_status",
            FailureKind::Semantic => "semantic",
            FailureKind::CacheStore => "cache_store",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer into the request that an API field error refers to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiErrorSource {
    #[serde(default)]
    pub pointer: Option<String>,
}

/// One field-level error descriptor from an API error body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiFieldError {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ApiErrorSource>,
}

/// The normalized failure returned by every public operation.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{status}: {detail}")]
pub struct ErrorEnvelope {
    pub status: EnvelopeStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiFieldError>,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl ErrorEnvelope {
    pub fn new(kind: FailureKind, status: EnvelopeStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            message: None,
            title: None,
            code: None,
            errors: Vec::new(),
            kind,
        }
    }

    /// Envelope for failures with no HTTP status to report.
    pub fn custom(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::new(kind, EnvelopeStatus::CustomErr, detail)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The HTTP status code, when the failure carried one.
    pub fn http_status(&self) -> Option<u16> {
        match self.status {
            EnvelopeStatus::Http(code) => Some(code),
            _ => None,
        }
    }
}
