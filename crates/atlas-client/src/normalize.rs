//! Error normalization.
//!
//! Every remote call ends up here exactly once. `normalize` is pure: it
//! looks at what the transport produced and what the caller expected, and
//! either yields a [`Reply`] or folds the failure into an [`ErrorEnvelope`].
//!
//! Classes, highest priority first:
//!
//! 1. transport failure (offline is reported separately)
//! 2. body not parseable as JSON
//! 3. HTTP status outside 2xx
//! 4. 2xx carrying a body where an empty confirmation was expected

use atlas_core::{ApiFieldError, EnvelopeStatus, ErrorEnvelope, FailureKind};
use serde_json::Value;

pub const OFFLINE_MESSAGE: &str = "Browser offline";
pub const OFFLINE_DETAIL: &str = "Your browser doesn't currently have an internet connection.";
pub const UNKNOWN_MESSAGE: &str = "unknown error";
pub const GIBBERISH_DETAIL: &str =
    "The server threw an error, additionally the server is talking gibberish to us.";
pub const UNPARSED_ERROR_DETAIL: &str = "The server threw an error, additionally the JSON from \
     the response of the server could not be parsed.";

/// What the transport produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportOutcome<'a> {
    /// No response was obtained. `online` is the connectivity probe's verdict.
    Failed { online: bool },
    Responded { status: u16, body: &'a [u8] },
}

/// The success shape the caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// A 2xx with a JSON body.
    Json,
    /// A bare `204 No Content`; the body is never read on success.
    NoContent,
}

/// Per-call wording used when a failure has no server-provided detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    /// Detail for a transport failure while online.
    pub failure_detail: &'static str,
    /// Detail for a 2xx that neither confirmed nor explained itself.
    pub unknown_detail: &'static str,
    /// Message attached when the server rejected the call with an error body.
    pub rejection_message: Option<&'static str>,
}

impl Operation {
    /// An operation with generic wording derived from its name.
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            failure_detail: "An error occured while trying to reach the server.",
            unknown_detail: "The server answered with an unexpected response.",
            rejection_message: None,
        }
    }

    pub const fn failure_detail(mut self, detail: &'static str) -> Self {
        self.failure_detail = detail;
        self
    }

    pub const fn unknown_detail(mut self, detail: &'static str) -> Self {
        self.unknown_detail = detail;
        self
    }

    pub const fn rejection_message(mut self, message: &'static str) -> Self {
        self.rejection_message = Some(message);
        self
    }
}

/// A successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json { status: u16, value: Value },
    NoContent { status: u16 },
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Json { status, .. } | Reply::NoContent { status } => *status,
        }
    }

    /// The JSON body, `Value::Null` for a no-content reply.
    pub fn into_value(self) -> Value {
        match self {
            Reply::Json { value, .. } => value,
            Reply::NoContent { .. } => Value::Null,
        }
    }
}

/// The `error` object the API nests in failed responses.
///
/// Each member is read on its own; a member of the wrong type is dropped
/// without hiding the others.
#[derive(Debug, Default)]
struct ApiErrorBody {
    status: Option<u16>,
    detail: Option<String>,
    title: Option<String>,
    code: Option<i64>,
    first_field_detail: Option<String>,
    errors: Vec<ApiFieldError>,
}

impl ApiErrorBody {
    /// `error` member of the body, if it is an object.
    fn extract(body: &Value) -> Option<Self> {
        let error = body.get("error")?.as_object()?;
        let text = |key: &str| error.get(key).and_then(Value::as_str).map(str::to_string);
        let field_errors = error.get("errors").and_then(Value::as_array);

        Some(Self {
            status: error.get("status").and_then(numeric).and_then(|n| u16::try_from(n).ok()),
            detail: text("detail"),
            title: text("title"),
            code: error.get("code").and_then(numeric),
            first_field_detail: field_errors
                .and_then(|errors| errors.first())
                .and_then(|first| first.get("detail"))
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            errors: field_errors
                .into_iter()
                .flatten()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect(),
        })
    }

    fn into_envelope(
        self,
        kind: FailureKind,
        status: EnvelopeStatus,
        detail: String,
    ) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(kind, status, detail);
        envelope.title = self.title;
        envelope.code = self.code;
        envelope.errors = self.errors;
        envelope
    }
}

/// An integer sent either as a number or as a numeric string.
fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Classify one exchange.
pub fn normalize(
    outcome: TransportOutcome<'_>,
    expectation: Expectation,
    operation: &Operation,
) -> Result<Reply, ErrorEnvelope> {
    let (status, body) = match outcome {
        TransportOutcome::Failed { online: false } => {
            return Err(ErrorEnvelope::new(
                FailureKind::Connectivity,
                EnvelopeStatus::Error,
                OFFLINE_DETAIL,
            )
            .with_message(OFFLINE_MESSAGE));
        }
        TransportOutcome::Failed { online: true } => {
            return Err(ErrorEnvelope::new(
                FailureKind::Transport,
                EnvelopeStatus::Error,
                operation.failure_detail,
            )
            .with_message(UNKNOWN_MESSAGE));
        }
        TransportOutcome::Responded { status, body } => (status, body),
    };

    if expectation == Expectation::NoContent && status == 204 {
        return Ok(Reply::NoContent { status });
    }

    let value = match parse_body(body, expectation) {
        Some(value) => value,
        None => return Err(decode_failure(Some(status))),
    };

    if !(200..300).contains(&status) {
        return Err(http_failure(status, &value, operation));
    }

    match expectation {
        Expectation::Json => Ok(Reply::Json { status, value }),
        Expectation::NoContent => Err(semantic_failure(status, &value, operation)),
    }
}

/// Envelope for a payload that could not be decoded. `None` when no HTTP
/// status applies (e.g. a persisted payload).
pub fn decode_failure(status: Option<u16>) -> ErrorEnvelope {
    let status = status.map_or(EnvelopeStatus::CustomErr, EnvelopeStatus::Http);
    ErrorEnvelope::new(FailureKind::Decode, status, GIBBERISH_DETAIL)
}

fn parse_body(body: &[u8], expectation: Expectation) -> Option<Value> {
    // An empty body is the expected answer to a no-content call, whatever
    // the status; only classes 3 and 4 look at it.
    if expectation == Expectation::NoContent && body.iter().all(u8::is_ascii_whitespace) {
        return Some(Value::Null);
    }
    serde_json::from_slice(body).ok()
}

fn http_failure(status: u16, body: &Value, operation: &Operation) -> ErrorEnvelope {
    let Some(error) = ApiErrorBody::extract(body) else {
        return ErrorEnvelope::new(
            FailureKind::HttpStatus,
            EnvelopeStatus::Http(status),
            UNPARSED_ERROR_DETAIL,
        );
    };
    let detail = error
        .first_field_detail
        .clone()
        .unwrap_or_else(|| reason_phrase(status));
    let mut envelope =
        error.into_envelope(FailureKind::HttpStatus, EnvelopeStatus::Http(status), detail);
    envelope.message = operation.rejection_message.map(str::to_string);
    envelope
}

fn semantic_failure(status: u16, body: &Value, operation: &Operation) -> ErrorEnvelope {
    let Some(error) = ApiErrorBody::extract(body) else {
        return ErrorEnvelope::new(
            FailureKind::Semantic,
            EnvelopeStatus::Unknown,
            operation.unknown_detail,
        )
        .with_message(UNKNOWN_MESSAGE);
    };
    let status = EnvelopeStatus::Http(error.status.unwrap_or(status));
    let detail = error
        .first_field_detail
        .clone()
        .or_else(|| error.detail.clone())
        .unwrap_or_else(|| operation.unknown_detail.to_string());
    let mut envelope = error.into_envelope(FailureKind::Semantic, status, detail);
    envelope.message = Some(
        operation
            .rejection_message
            .unwrap_or(UNKNOWN_MESSAGE)
            .to_string(),
    );
    envelope
}

/// Canonical reason phrase for a status code ("Bad Request").
fn reason_phrase(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OP: Operation = Operation::named("test")
        .failure_detail("could not reach")
        .unknown_detail("no idea")
        .rejection_message("Rejected");

    fn respond(
        status: u16,
        body: &[u8],
        expectation: Expectation,
    ) -> Result<Reply, ErrorEnvelope> {
        normalize(TransportOutcome::Responded { status, body }, expectation, &OP)
    }

    #[test]
    fn offline_transport_failure() {
        let err = normalize(TransportOutcome::Failed { online: false }, Expectation::Json, &OP)
            .unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Error);
        assert_eq!(err.message.as_deref(), Some("Browser offline"));
        assert_eq!(err.detail, OFFLINE_DETAIL);
        assert_eq!(err.kind, FailureKind::Connectivity);
    }

    #[test]
    fn online_transport_failure_uses_operation_detail() {
        let err = normalize(TransportOutcome::Failed { online: true }, Expectation::NoContent, &OP)
            .unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Error);
        assert_eq!(err.message.as_deref(), Some("unknown error"));
        assert_eq!(err.detail, "could not reach");
        assert_eq!(err.kind, FailureKind::Transport);
    }

    #[test]
    fn json_success() {
        let reply = respond(200, br#"{"id": 7}"#, Expectation::Json).unwrap();
        assert_eq!(reply.status(), 200);
        assert_eq!(reply.into_value(), json!({"id": 7}));
    }

    #[test]
    fn unparseable_body_is_a_decode_failure_with_status() {
        for status in [200, 502] {
            let err = respond(status, b"<html>oops</html>", Expectation::Json).unwrap_err();
            assert_eq!(err.status, EnvelopeStatus::Http(status));
            assert_eq!(err.detail, GIBBERISH_DETAIL);
            assert_eq!(err.kind, FailureKind::Decode);
        }
    }

    #[test]
    fn empty_body_on_json_call_is_a_decode_failure() {
        let err = respond(200, b"", Expectation::Json).unwrap_err();
        assert_eq!(err.kind, FailureKind::Decode);
    }

    #[test]
    fn decode_failure_without_status_is_custom() {
        let err = decode_failure(None);
        assert_eq!(err.status, EnvelopeStatus::CustomErr);
        assert_eq!(err.detail, GIBBERISH_DETAIL);
    }

    #[test]
    fn http_failure_surfaces_first_field_detail() {
        let body = json!({
            "error": {
                "status": 400,
                "errors": [
                    {
                        "source": {"pointer": ""},
                        "detail": "Measurement ID should be an integer between 1 and 2147483647"
                    },
                    {"detail": "second"}
                ],
                "code": 102,
                "detail": "There was a problem with your request",
                "title": "Bad Request"
            }
        });
        let err = respond(400, body.to_string().as_bytes(), Expectation::Json).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(400));
        assert_eq!(
            err.detail,
            "Measurement ID should be an integer between 1 and 2147483647"
        );
        assert_eq!(err.title.as_deref(), Some("Bad Request"));
        assert_eq!(err.code, Some(102));
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.kind, FailureKind::HttpStatus);
        assert_eq!(err.message.as_deref(), Some("Rejected"));
    }

    #[test]
    fn mistyped_error_members_do_not_hide_field_detail() {
        let body = json!({
            "error": {
                "status": 400,
                "code": "E102",
                "title": 17,
                "detail": {"nested": true},
                "errors": [{"detail": "Measurement ID should be an integer"}]
            }
        });
        let err = respond(400, body.to_string().as_bytes(), Expectation::Json).unwrap_err();
        assert_eq!(err.detail, "Measurement ID should be an integer");
        assert_eq!(err.code, None);
        assert_eq!(err.title, None);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.message.as_deref(), Some("Rejected"));
    }

    #[test]
    fn field_detail_survives_a_malformed_source() {
        let body = json!({
            "error": {"errors": [{"detail": "bad interval", "source": "interval"}, 5]}
        });
        let err = respond(400, body.to_string().as_bytes(), Expectation::Json).unwrap_err();
        assert_eq!(err.detail, "bad interval");
        assert!(err.errors.is_empty());
    }

    #[test]
    fn embedded_status_may_be_a_string() {
        let body = json!({"error": {"status": "409", "code": "102", "detail": "Already stopped"}});
        let err = respond(200, body.to_string().as_bytes(), Expectation::NoContent).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(409));
        assert_eq!(err.code, Some(102));
        assert_eq!(err.detail, "Already stopped");
    }

    #[test]
    fn http_failure_without_field_errors_uses_reason_phrase() {
        let body = json!({"error": {"detail": "Not found.", "status": 404}});
        let err = respond(404, body.to_string().as_bytes(), Expectation::Json).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(404));
        assert_eq!(err.detail, "Not Found");
    }

    #[test]
    fn http_failure_without_error_object() {
        let err = respond(500, br#"{"oops": true}"#, Expectation::Json).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(500));
        assert_eq!(err.detail, UNPARSED_ERROR_DETAIL);
    }

    #[test]
    fn no_content_success_never_reads_body() {
        // A body that would fail to parse is ignored on 204.
        let reply = respond(204, b"not json at all", Expectation::NoContent).unwrap();
        assert_eq!(reply, Reply::NoContent { status: 204 });
    }

    #[test]
    fn no_content_call_with_embedded_error_is_semantic_failure() {
        let body = json!({
            "error": {"status": 409, "detail": "Already stopped", "title": "Conflict"}
        });
        let err = respond(200, body.to_string().as_bytes(), Expectation::NoContent).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(409));
        assert_eq!(err.detail, "Already stopped");
        assert_eq!(err.kind, FailureKind::Semantic);
        assert_eq!(err.message.as_deref(), Some("Rejected"));
    }

    #[test]
    fn no_content_call_with_unexplained_body_is_unknown() {
        let err = respond(200, br#"{"ok": true}"#, Expectation::NoContent).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Unknown);
        assert_eq!(err.detail, "no idea");
        assert_eq!(err.message.as_deref(), Some("unknown error"));

        let err = respond(200, b"", Expectation::NoContent).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Unknown);
    }

    #[test]
    fn no_content_call_rejected_with_status() {
        let body = json!({"error": {"errors": [{"detail": "You do not own this measurement"}]}});
        let err = respond(403, body.to_string().as_bytes(), Expectation::NoContent).unwrap_err();
        assert_eq!(err.status, EnvelopeStatus::Http(403));
        assert_eq!(err.detail, "You do not own this measurement");
        assert_eq!(err.message.as_deref(), Some("Rejected"));
    }
}
