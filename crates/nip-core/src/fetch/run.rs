//! Fetch loop: rotate endpoints, retry with backoff, validate every response.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use url::Url;

use crate::control::StopSignal;
use crate::endpoint::Candidate;

use super::classify::classify;
use super::error::{AttemptError, FetchError};
use super::policy::RetryPolicy;
use super::transport::{http_get_to_file, HttpOptions};
use super::validate::Validator;

/// Outcome of a successful fetch: which endpoint won and what it cost.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// URL that produced the validated artifact.
    pub endpoint: Url,
    /// Position of the winning endpoint in the configured mirror order.
    pub endpoint_ordinal: usize,
    /// Attempts consumed across all endpoints, including the winning one.
    pub attempts: u32,
    /// Wall-clock time across all endpoints, including backoff sleeps.
    pub elapsed: Duration,
    /// Where the artifact was written.
    pub dest: PathBuf,
}

/// Tries `candidates` in order, giving each up to
/// `policy.attempts_per_endpoint` strictly sequential attempts, until one
/// attempt produces an artifact that passes `validator`.
///
/// Blocking: backoff sleeps happen after every failed attempt except the
/// last one overall, including across the rotation from one endpoint to the
/// next. The artifact of a failed or rejected attempt is removed before the
/// next attempt runs.
///
/// Generic over the transport so tests can script outcomes;
/// [`fetch_to_file`] plugs in the curl transport.
pub fn fetch_validated<F>(
    candidates: &[Candidate],
    dest: &Path,
    policy: &RetryPolicy,
    validator: &Validator,
    stop: &StopSignal,
    mut transport: F,
) -> Result<FetchReport, FetchError>
where
    F: FnMut(&Url, &Path) -> Result<u64, AttemptError>,
{
    if candidates.is_empty() {
        return Err(FetchError::NoEndpoints);
    }

    let started = Instant::now();
    let per_endpoint = policy.attempts_per_endpoint.max(1);
    let total_budget = per_endpoint.saturating_mul(candidates.len() as u32);
    let mut consumed = 0u32;
    let mut last_error: Option<AttemptError> = None;

    for cand in candidates {
        for attempt in 1..=per_endpoint {
            if stop.is_stopped() {
                let _ = fs::remove_file(dest);
                return Err(FetchError::Interrupted);
            }
            consumed += 1;
            tracing::debug!(
                "fetch attempt {}/{} on {} (validator: {})",
                attempt,
                per_endpoint,
                cand.url,
                validator.name()
            );

            let outcome = transport(&cand.url, dest).and_then(|bytes| {
                validator
                    .check(dest)
                    .map(|()| bytes)
                    .map_err(AttemptError::Validation)
            });

            match outcome {
                Ok(bytes) => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        "fetched {} via {} ({} bytes, {} attempts, {:.1?})",
                        dest.display(),
                        cand.url,
                        bytes,
                        consumed,
                        elapsed
                    );
                    return Ok(FetchReport {
                        endpoint: cand.url.clone(),
                        endpoint_ordinal: cand.ordinal,
                        attempts: consumed,
                        elapsed,
                        dest: dest.to_path_buf(),
                    });
                }
                Err(e) => {
                    let _ = fs::remove_file(dest);
                    tracing::warn!(
                        "attempt {}/{} on {} failed ({:?}): {}",
                        attempt,
                        per_endpoint,
                        cand.url,
                        classify(&e),
                        e
                    );
                    last_error = Some(e);
                    if consumed < total_budget {
                        std::thread::sleep(policy.delay_for(attempt));
                    }
                }
            }
        }
    }

    let elapsed = started.elapsed();
    let Some(last_error) = last_error else {
        return Err(FetchError::NoEndpoints);
    };
    tracing::error!(
        "all {} endpoints exhausted for {} after {} attempts in {:.1?}: {}",
        candidates.len(),
        dest.display(),
        consumed,
        elapsed,
        last_error
    );
    Err(FetchError::AllEndpointsExhausted {
        attempts: consumed,
        elapsed,
        last_error,
    })
}

/// [`fetch_validated`] with the curl GET transport.
pub fn fetch_to_file(
    candidates: &[Candidate],
    dest: &Path,
    policy: &RetryPolicy,
    validator: &Validator,
    stop: &StopSignal,
    opts: &HttpOptions,
) -> Result<FetchReport, FetchError> {
    fetch_validated(candidates, dest, policy, validator, stop, |url, dest| {
        http_get_to_file(url, dest, opts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(url: &str, ordinal: usize) -> Candidate {
        Candidate {
            url: Url::parse(url).unwrap(),
            ordinal,
        }
    }

    fn fast_policy(attempts_per_endpoint: u32) -> RetryPolicy {
        RetryPolicy {
            attempts_per_endpoint,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn first_attempt_success_consumes_one() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        let cands = vec![cand("https://a.example/x", 0)];
        let mut calls = 0u32;

        let report = fetch_validated(
            &cands,
            &dest,
            &fast_policy(5),
            &Validator::non_empty_file(),
            &StopSignal::new(),
            |_url, dest| {
                calls += 1;
                fs::write(dest, b"payload").map_err(AttemptError::Storage)?;
                Ok(7)
            },
        )
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.endpoint_ordinal, 0);
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn rotates_after_per_endpoint_budget() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        let cands = vec![
            cand("https://primary.example/x", 0),
            cand("https://mirror.example/x", 1),
        ];
        let mut tried: Vec<String> = Vec::new();

        let report = fetch_validated(
            &cands,
            &dest,
            &fast_policy(2),
            &Validator::non_empty_file(),
            &StopSignal::new(),
            |url, dest| {
                tried.push(url.host_str().unwrap().to_string());
                if url.host_str() == Some("primary.example") {
                    return Err(AttemptError::Http(503));
                }
                fs::write(dest, b"ok").map_err(AttemptError::Storage)?;
                Ok(2)
            },
        )
        .unwrap();

        // Two attempts on the primary, then success on the mirror.
        assert_eq!(
            tried,
            vec!["primary.example", "primary.example", "mirror.example"]
        );
        assert_eq!(report.attempts, 3);
        assert_eq!(report.endpoint_ordinal, 1);
        assert_eq!(report.endpoint.host_str(), Some("mirror.example"));
    }

    #[test]
    fn rejected_artifact_is_a_failed_attempt_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        let cands = vec![cand("https://a.example/x", 0), cand("https://b.example/x", 1)];

        let err = fetch_validated(
            &cands,
            &dest,
            &fast_policy(2),
            &Validator::non_empty_file(),
            &StopSignal::new(),
            |_url, dest| {
                fs::write(dest, b"").map_err(AttemptError::Storage)?;
                Ok(0)
            },
        )
        .unwrap_err();

        match err {
            FetchError::AllEndpointsExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert!(matches!(last_error, AttemptError::Validation(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert!(!dest.exists(), "rejected artifact should be removed");
    }

    #[test]
    fn empty_candidate_list_is_no_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let err = fetch_validated(
            &[],
            &dest,
            &fast_policy(1),
            &Validator::non_empty_file(),
            &StopSignal::new(),
            |_url, _dest| Ok(0),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::NoEndpoints));
    }

    #[test]
    fn stop_request_interrupts_before_next_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let stop = StopSignal::new();
        stop.request_stop();

        let err = fetch_validated(
            &[cand("https://a.example/x", 0)],
            &dest,
            &fast_policy(5),
            &Validator::non_empty_file(),
            &stop,
            |_url, _dest| panic!("transport must not run after a stop"),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Interrupted));
    }

    #[test]
    fn backoff_sleep_spans_endpoint_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let cands = vec![cand("https://a.example/x", 0), cand("https://b.example/x", 1)];
        let policy = RetryPolicy {
            attempts_per_endpoint: 1,
            base_delay: Duration::from_millis(40),
            max_delay: Duration::from_secs(1),
        };

        let started = Instant::now();
        let report = fetch_validated(
            &cands,
            &dest,
            &policy,
            &Validator::non_empty_file(),
            &StopSignal::new(),
            |url, dest| {
                if url.host_str() == Some("a.example") {
                    return Err(AttemptError::Http(500));
                }
                fs::write(dest, b"ok").map_err(AttemptError::Storage)?;
                Ok(2)
            },
        )
        .unwrap();

        // One failure on a, one backoff sleep, then success on b.
        assert_eq!(report.attempts, 2);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
