//! Remote error taxonomy and classification.
//!
//! Every failure coming back from the calendar provider is first captured as
//! a raw [`TransportError`] and then turned into a [`RetryableError`] by
//! [`classify`]. Classification is pure: it never panics and always produces
//! a value, whatever the response body looks like.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Reason reported by the provider when a sync token can no longer be used.
pub const FULL_SYNC_REQUIRED: &str = "fullSyncRequired";

/// Raw failure of a single remote call, before classification.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    #[error("network error: {details}")]
    Network { details: String, timeout: bool },
    #[error("malformed response: {details}")]
    MalformedResponse { details: String },
    #[error("{details}")]
    Application { details: String },
}

impl TransportError {
    /// Case-insensitive lookup of a response header.
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            TransportError::Http { headers, .. } => headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::MalformedResponse {
                details: err.to_string(),
            }
        } else if err.is_builder() {
            TransportError::Application {
                details: err.to_string(),
            }
        } else {
            TransportError::Network {
                details: err.to_string(),
                timeout: err.is_timeout(),
            }
        }
    }
}

/// A classified remote failure.
#[derive(Debug, Clone, Error)]
#[error("{}{message} (HTTP {code}, {domain}/{reason})", context_prefix(.context))]
pub struct RetryableError {
    pub code: u16,
    pub reason: String,
    pub domain: String,
    pub message: String,
    pub retry_after_seconds: Option<u64>,
    /// gRPC-style status string from structured error bodies (e.g. `UNAVAILABLE`).
    pub status: Option<String>,
    /// Label of the operation that failed, set by the retry executor.
    pub context: Option<String>,
    #[source]
    pub source: TransportError,
}

fn context_prefix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|label| format!("{label}: "))
        .unwrap_or_default()
}

impl RetryableError {
    pub fn with_context(mut self, label: impl Into<String>) -> Self {
        self.context = Some(label.into());
        self
    }

    /// The provider no longer accepts the resumption cursor.
    pub fn is_cursor_invalidated(&self) -> bool {
        self.code == 410 || self.reason == FULL_SYNC_REQUIRED
    }

    /// The bearer token was rejected.
    pub fn is_auth(&self) -> bool {
        self.code == 401
    }
}

/// Top-level `error` object of a provider response, in its richer shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
    #[serde(default)]
    pub errors: Vec<FirstError>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

/// First entry of the legacy `error.errors` array.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FirstError {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parsed error body, one variant per recognised shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Structured(ErrorInfo),
    Legacy {
        first: FirstError,
        message: Option<String>,
    },
    Opaque(String),
}

#[derive(Deserialize)]
struct Envelope {
    error: JsonValue,
}

impl ErrorBody {
    /// Parse an error body, trying the shapes in priority order.
    pub fn parse(body: &str) -> Self {
        let Ok(Envelope { error }) = serde_json::from_str::<Envelope>(body) else {
            return ErrorBody::Opaque(body.trim().to_string());
        };

        let JsonValue::Object(_) = error else {
            return ErrorBody::Opaque(match error {
                JsonValue::String(text) => text,
                _ => body.trim().to_string(),
            });
        };

        let info: ErrorInfo = match serde_json::from_value(error) {
            Ok(info) => info,
            Err(_) => return ErrorBody::Opaque(body.trim().to_string()),
        };

        let has_detail_reason = info.details.iter().any(|d| d.reason.is_some());
        if has_detail_reason || info.status.is_some() {
            return ErrorBody::Structured(info);
        }

        if let Some(first) = info.errors.first() {
            return ErrorBody::Legacy {
                first: first.clone(),
                message: info.message,
            };
        }

        ErrorBody::Opaque(info.message.unwrap_or_else(|| body.trim().to_string()))
    }

    fn reason(&self) -> Option<&str> {
        match self {
            ErrorBody::Structured(info) => info
                .details
                .iter()
                .find_map(|d| d.reason.as_deref())
                .or_else(|| info.errors.first().and_then(|e| e.reason.as_deref())),
            ErrorBody::Legacy { first, .. } => first.reason.as_deref(),
            ErrorBody::Opaque(text) => quota_reason(text),
        }
    }

    fn domain(&self) -> Option<&str> {
        match self {
            ErrorBody::Structured(info) => info
                .details
                .iter()
                .find_map(|d| d.domain.as_deref())
                .or_else(|| info.errors.first().and_then(|e| e.domain.as_deref())),
            ErrorBody::Legacy { first, .. } => first.domain.as_deref(),
            ErrorBody::Opaque(_) => None,
        }
    }

    fn message(&self) -> Option<&str> {
        let message = match self {
            ErrorBody::Structured(info) => info.message.as_deref(),
            ErrorBody::Legacy { first, message } => {
                message.as_deref().or(first.message.as_deref())
            }
            ErrorBody::Opaque(text) => Some(text.as_str()),
        };
        message.map(str::trim).filter(|m| !m.is_empty())
    }

    fn status(&self) -> Option<&str> {
        match self {
            ErrorBody::Structured(info) => info.status.as_deref(),
            _ => None,
        }
    }
}

/// Quota-type wording found in free-text bodies.
fn quota_reason(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    const QUOTA_PATTERNS: [&str; 4] = ["quotaexceeded", "quota exceeded", "daily limit", "billing limit"];
    const RATE_PATTERNS: [&str; 4] = [
        "ratelimitexceeded",
        "rate limit",
        "too many requests",
        "servicelimit",
    ];

    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
        Some("quotaExceeded")
    } else if RATE_PATTERNS.iter().any(|p| lower.contains(p)) {
        Some("rateLimitExceeded")
    } else {
        None
    }
}

fn default_reason(code: u16) -> &'static str {
    match code {
        400 => "badRequest",
        401 => "authError",
        403 => "forbidden",
        404 => "notFound",
        409 => "conflict",
        410 => "gone",
        429 => "rateLimitExceeded",
        500 => "internalError",
        502 | 503 | 504 => "backendError",
        _ => "unknown",
    }
}

const MESSAGES: &[(u16, &str, &str)] = &[
    (400, "badRequest", "The request was rejected as invalid"),
    (401, "authError", "Authentication failed; the access token is invalid or expired"),
    (403, "forbidden", "Access to the calendar was denied"),
    (403, "rateLimitExceeded", "Rate limit exceeded"),
    (403, "userRateLimitExceeded", "Per-user rate limit exceeded"),
    (403, "quotaExceeded", "API quota exhausted"),
    (404, "notFound", "Calendar not found"),
    (410, FULL_SYNC_REQUIRED, "Sync token expired; a full sync is required"),
    (410, "gone", "Sync token expired; a full sync is required"),
    (429, "rateLimitExceeded", "Too many requests"),
    (429, "quotaExceeded", "API quota exhausted"),
    (500, "backendError", "Provider backend error"),
    (500, "internalError", "Provider internal error"),
    (502, "backendError", "Bad gateway"),
    (503, "backendError", "Provider temporarily unavailable"),
    (504, "backendError", "Provider timed out"),
];

fn lookup_message(code: u16, reason: &str) -> Option<&'static str> {
    MESSAGES
        .iter()
        .find(|(c, r, _)| *c == code && *r == reason)
        .map(|(_, _, message)| *message)
}

/// Parse a `Retry-After` value: delta seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<i64>() {
        return Some(seconds.max(0) as u64);
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|at| (at.with_timezone(&Utc) - now).num_seconds().max(0) as u64)
}

/// Classify a transport failure using the current time for `Retry-After` dates.
pub fn classify(err: &TransportError) -> RetryableError {
    classify_at(err, Utc::now())
}

pub fn classify_at(err: &TransportError, now: DateTime<Utc>) -> RetryableError {
    match err {
        TransportError::Http { status, body, .. } => {
            let code = *status;
            let parsed = ErrorBody::parse(body);
            let reason = parsed
                .reason()
                .map(str::to_string)
                .unwrap_or_else(|| default_reason(code).to_string());
            let domain = parsed.domain().unwrap_or("global").to_string();
            let message = match (lookup_message(code, &reason), parsed.message()) {
                (Some(known), _) => known.to_string(),
                (None, Some(provider)) => format!("HTTP {code}: {provider}"),
                (None, None) => format!("HTTP {code}"),
            };

            RetryableError {
                code,
                reason,
                domain,
                message,
                retry_after_seconds: err
                    .header("retry-after")
                    .and_then(|value| parse_retry_after(value, now)),
                status: parsed.status().map(str::to_string),
                context: None,
                source: err.clone(),
            }
        }
        TransportError::Network { details, timeout } => RetryableError {
            code: 503,
            reason: "backendError".to_string(),
            domain: "network".to_string(),
            message: if *timeout {
                format!("Request timed out: {details}")
            } else {
                format!("Network error: {details}")
            },
            retry_after_seconds: None,
            status: Some(if *timeout { "DEADLINE_EXCEEDED" } else { "UNAVAILABLE" }.to_string()),
            context: None,
            source: err.clone(),
        },
        TransportError::MalformedResponse { details } => RetryableError {
            code: 502,
            reason: "malformedResponse".to_string(),
            domain: "transport".to_string(),
            message: format!("Malformed response: {details}"),
            retry_after_seconds: None,
            status: None,
            context: None,
            source: err.clone(),
        },
        TransportError::Application { details } => RetryableError {
            code: 500,
            reason: "unknown".to_string(),
            domain: "application".to_string(),
            message: details.clone(),
            retry_after_seconds: None,
            status: None,
            context: None,
            source: err.clone(),
        },
    }
}
