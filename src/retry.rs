//! Retry with exponential backoff for generation API calls

use std::time::{Duration, SystemTime};

use crate::transport::TransportError;

/// Retry policy shared by every outbound generation call
///
/// Controls how many attempts a call gets, how long to wait between them,
/// and which failures are worth another attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between attempts (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Decides whether a failure is transient
    pub retryable: fn(&TransportError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            retryable: is_retryable,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound and base delay, default predicate
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Policy that never retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether `error` on attempt number `attempt` (1-based) earns another try
    #[must_use]
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable)(error)
    }

    /// Compute the delay before the next attempt
    ///
    /// When `retry_after` is provided (e.g. from a 429 response), that value is
    /// used directly but capped at `max_delay`. Otherwise the delay follows
    /// exponential backoff: `min(base_delay * 2^attempt + jitter, max_delay)`.
    ///
    /// Jitter is 0-25% of the computed delay, taken from the sub-second clock.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(ra) = retry_after {
            return ra.min(self.max_delay);
        }

        let base = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let base = base.min(self.max_delay);

        let jitter_nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();

        let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
        let jitter = base.mul_f64(jitter_fraction);

        (base + jitter).min(self.max_delay)
    }
}

/// Determine whether an HTTP status indicates a recoverable error
///
/// Rate limits (429) and server errors (5xx) are worth retrying.
#[must_use]
pub const fn is_recoverable(status: u16) -> bool {
    status == 429 || (status >= 500 && status < 600)
}

/// Default predicate: network failures and recoverable statuses
#[must_use]
pub const fn is_retryable(error: &TransportError) -> bool {
    match error {
        TransportError::Network(_) => true,
        TransportError::Status { status, .. } => is_recoverable(*status),
        TransportError::Decode(_) => false,
    }
}

/// Parse a `Retry-After` header value given in seconds
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
