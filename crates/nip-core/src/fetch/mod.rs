//! Endpoint failover, retry and response validation for remote fetches.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures), capped exponential backoff and multi-endpoint
//! rotation so that higher layers (batch runner, CLI) share a consistent
//! policy. A fetch either yields a validated artifact on disk or a typed
//! error; per-attempt failures never escape the loop.

mod classify;
mod error;
mod policy;
mod run;
mod transport;
mod validate;

pub use classify::{classify, classify_curl_error, classify_http_status, ErrorKind};
pub use error::{AttemptError, FetchError};
pub use policy::RetryPolicy;
pub use run::{fetch_to_file, fetch_validated, FetchReport};
pub use transport::{http_get_to_file, HttpOptions};
pub use validate::Validator;
