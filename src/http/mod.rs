// Blocking HTTP plumbing shared by every upstream client


use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("HTTP error {0}")]
    Status(u16),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay before the first retry; doubled for every later one
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[inline]
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no retry
    #[inline]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Build a ureq agent with a global timeout
#[inline]
pub fn build_agent(timeout: Duration, user_agent: Option<&str>) -> ureq::Agent {
    let mut builder = ureq::Agent::config_builder().timeout_global(Some(timeout));
    if let Some(user_agent) = user_agent {
        builder = builder.user_agent(user_agent);
    }
    builder.build().into()
}

/// Run `request_fn` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Blocks the calling thread between attempts.
#[inline]
pub fn call_with_retry<F>(
    target: &str,
    policy: &RetryPolicy,
    mut request_fn: F,
) -> Result<String, HttpError>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        debug!(
            "HTTP request to {} attempt {}/{}",
            target, attempt, policy.attempts
        );

        match request_fn() {
            Ok(body) => {
                debug!("Request to {} succeeded on attempt {}", target, attempt);
                return Ok(body);
            }
            Err(error) => {
                let (http_error, retryable) = classify(&error);
                if !retryable {
                    warn!("Non-retryable error from {}: {}", target, error);
                    return Err(http_error);
                }

                warn!(
                    "Retryable error from {}: {}, attempt {}/{}",
                    target, error, attempt, policy.attempts
                );
                last_error = Some(http_error);

                if attempt < policy.attempts {
                    let delay = policy.delay_for(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    if policy.attempts > 1 {
        error!("All retry attempts failed for request to {}", target);
    }

    Err(last_error.unwrap_or_else(|| HttpError::Transport("request failed after retries".into())))
}

/// Map a ureq error to an `HttpError` and whether it is worth retrying
fn classify(error: &ureq::Error) -> (HttpError, bool) {
    match error {
        ureq::Error::StatusCode(status) => {
            let retryable = *status >= 500 || *status == 429;
            (HttpError::Status(*status), retryable)
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => (HttpError::Transport(error.to_string()), true),
        _ => (HttpError::Transport(error.to_string()), false),
    }
}
