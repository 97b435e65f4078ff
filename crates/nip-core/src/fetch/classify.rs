//! Classify HTTP status and curl errors into coarse failure kinds.
//!
//! Kinds feed log fields and failure summaries. Every kind stays retryable
//! until the endpoint budget is exhausted; rotating to the next endpoint is
//! how a persistent local failure (bad mirror, 403, broken TLS) gets routed
//! around.

use super::error::AttemptError;

/// High-level classification of an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server-side HTTP error (5xx other than 503).
    Http5xx(u16),
    /// Response arrived but failed validation.
    Validation,
    /// Anything else (4xx, storage, unclassified curl errors).
    Other,
}

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Curl(ce) => classify_curl_error(ce),
        AttemptError::Http(code) => classify_http_status(*code),
        AttemptError::Validation(_) => ErrorKind::Validation,
        AttemptError::Storage(_) => ErrorKind::Other,
    }
}
