//! Capped exponential backoff for transient outbound failures.

use std::time::{Duration, SystemTime};

use reqwest_retry::{RetryDecision, RetryPolicy};

/// Retries transient failures after 250ms, 500ms, 1s, ... capped at `max_delay`.
///
/// Outbound calls sit on the request path of an MCP tool call, so delays stay
/// short compared to the client's own timeout.
pub struct BackoffPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }

    fn delay_for(&self, n_past_retries: u32) -> Duration {
        let factor = 2_u32.saturating_pow(n_past_retries);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl RetryPolicy for BackoffPolicy {
    fn should_retry(&self, _request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            RetryDecision::DoNotRetry
        } else {
            RetryDecision::Retry {
                execute_after: SystemTime::now() + self.delay_for(n_past_retries),
            }
        }
    }
}
