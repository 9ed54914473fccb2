//! Bounded, retried calls to the generation API

use std::sync::Arc;
use std::time::Duration;

use crate::request::Operation;
use crate::retry::RetryPolicy;
use crate::transport::{GenerationResult, Transport, TransportError};

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends operations through a [`Transport`] with timeout and retry
///
/// Callers never see transport errors: every path ends in a
/// [`GenerationResult`], with failures collapsed to
/// [`GenerationResult::Failure`].
#[derive(Clone)]
pub struct ApiInvoker {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl ApiInvoker {
    /// Create an invoker with the default policy and timeout
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the per-attempt timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry policy in effect
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `operation`, retrying transient failures
    pub async fn invoke(&self, operation: &Operation) -> GenerationResult {
        let kind = operation.kind();
        let mut attempt: u32 = 1;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.transport.send(operation)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(TransportError::Network(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f32()
                ))),
            };

            let error = match outcome {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(operation = kind, attempt, "call succeeded after retry");
                    }
                    return result;
                }
                Err(e) => e,
            };

            if !self.policy.should_retry(&error, attempt) {
                tracing::warn!(
                    operation = kind,
                    transport = self.transport.name(),
                    attempt,
                    error = %error,
                    "generation call failed"
                );
                return GenerationResult::Failure(error.to_string());
            }

            let delay = self.policy.delay_for_attempt(attempt - 1, error.retry_after());
            tracing::debug!(
                operation = kind,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying generation call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::request::{ImageRequest, Operation};

    /// Replays a script of outcomes, then succeeds
    struct Scripted {
        script: Mutex<Vec<TransportError>>,
        attempts: AtomicU32,
    }

    impl Scripted {
        fn new(mut failures: Vec<TransportError>) -> Self {
            failures.reverse();
            Self {
                script: Mutex::new(failures),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, _operation: &Operation) -> Result<GenerationResult, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(GenerationResult::Text("ok".to_string())),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn send(&self, _operation: &Operation) -> Result<GenerationResult, TransportError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(GenerationResult::Text("late".to_string()))
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    fn operation() -> Operation {
        Operation::Image(ImageRequest {
            model: "dall-e-3".to_string(),
            prompt: "a castle on a hill".to_string(),
            size: "1024x1024".to_string(),
        })
    }

    fn server_error() -> TransportError {
        TransportError::Status {
            status: 503,
            body: "overloaded".to_string(),
            retry_after: None,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let transport = Arc::new(Scripted::new(vec![
            server_error(),
            TransportError::Network("reset".to_string()),
        ]));
        let invoker = ApiInvoker::new(transport.clone()).with_policy(fast_policy());

        let result = invoker.invoke(&operation()).await;

        assert_eq!(result, GenerationResult::Text("ok".to_string()));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_after_one_attempt() {
        let transport = Arc::new(Scripted::new(vec![TransportError::Status {
            status: 400,
            body: "bad request".to_string(),
            retry_after: None,
        }]));
        let invoker = ApiInvoker::new(transport.clone()).with_policy(fast_policy());

        let result = invoker.invoke(&operation()).await;

        assert!(result.is_failure());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_policy_bound() {
        let transport = Arc::new(Scripted::new(vec![
            server_error(),
            server_error(),
            server_error(),
            server_error(),
        ]));
        let invoker = ApiInvoker::new(transport.clone()).with_policy(fast_policy());

        let result = invoker.invoke(&operation()).await;

        assert!(matches!(result, GenerationResult::Failure(ref m) if m.contains("503")));
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_collapses_to_failure() {
        let invoker = ApiInvoker::new(Arc::new(Stalled))
            .with_policy(RetryPolicy::no_retry())
            .with_timeout(Duration::from_millis(20));

        let result = invoker.invoke(&operation()).await;

        assert!(matches!(result, GenerationResult::Failure(ref m) if m.contains("timed out")));
    }
}
