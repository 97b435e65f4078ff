//! Error types for single attempts and for a whole fetch.

use std::fmt;
use std::time::Duration;

/// Failure of one attempt against one endpoint (curl failure, HTTP error,
/// storage failure, or a response that did not validate). Stays inside the
/// retry loop; callers only ever see `FetchError`.
#[derive(Debug)]
pub enum AttemptError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Disk write failed (disk full, permission denied).
    Storage(std::io::Error),
    /// Response arrived but failed the caller's validation check.
    Validation(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Curl(e) => write!(f, "{}", e),
            AttemptError::Http(code) => write!(f, "HTTP {}", code),
            AttemptError::Storage(e) => write!(f, "storage: {}", e),
            AttemptError::Validation(reason) => write!(f, "validation: {}", reason),
        }
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Curl(e) => Some(e),
            AttemptError::Storage(e) => Some(e),
            AttemptError::Http(_) | AttemptError::Validation(_) => None,
        }
    }
}

/// Terminal outcome of a fetch that did not produce a validated artifact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The candidate list was empty; nothing to try.
    #[error("no endpoints to fetch from")]
    NoEndpoints,
    /// A stop was requested between attempts.
    #[error("fetch interrupted by stop request")]
    Interrupted,
    /// Every attempt on every endpoint failed.
    #[error("all endpoints exhausted after {attempts} attempts in {elapsed:.1?}: {last_error}")]
    AllEndpointsExhausted {
        attempts: u32,
        elapsed: Duration,
        last_error: AttemptError,
    },
}
