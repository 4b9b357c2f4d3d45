//! Retry with bounded exponential backoff and jitter.
//!
//! Every outbound call a service module makes goes through one
//! [`RetryPolicy::invoke`] loop. The policy is plain data (attempt bound,
//! delay schedule, classification function) so it can be tested without
//! wrapping a real operation, and shared across concurrent callers.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How the policy treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient; worth another attempt
    Retryable,
    /// Rethrow immediately, no further attempts
    Permanent,
}

type Classifier<E> = Arc<dyn Fn(&E) -> FailureClass + Send + Sync>;
type Observer = Arc<dyn Fn(u32) + Send + Sync>;

/// A reusable retry policy.
///
/// Stateless between invocations; cloning is cheap and concurrent callers
/// may share one instance. The observer exists purely for progress display
/// and never influences control flow.
///
/// # Example
///
/// ```
/// use cloudcred::retry::{FailureClass, RetryPolicy};
///
/// #[tokio::main]
/// async fn main() {
///     let policy: RetryPolicy<String> = RetryPolicy::new(3)
///         .with_classifier(|e: &String| {
///             if e.contains("throttled") {
///                 FailureClass::Retryable
///             } else {
///                 FailureClass::Permanent
///             }
///         });
///
///     let result = policy.invoke(|| async { Ok::<_, String>(42) }).await;
///     assert_eq!(result, Ok(42));
/// }
/// ```
pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    classify: Classifier<E>,
    on_retry: Option<Observer>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            classify: self.classify.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Creates a policy with the given attempt bound.
    ///
    /// Defaults: every failure is retryable, 100ms base delay, 10s delay cap,
    /// no observer. An attempt bound of 0 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            classify: Arc::new(|_| FailureClass::Retryable),
            on_retry: None,
        }
    }

    /// Sets the first backoff delay. Subsequent delays double, capped at the
    /// maximum.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Caps the backoff delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the function separating retryable from permanent failures.
    pub fn with_classifier(
        mut self,
        classify: impl Fn(&E) -> FailureClass + Send + Sync + 'static,
    ) -> Self {
        self.classify = Arc::new(classify);
        self
    }

    /// Sets a callback fired once per retry with the failed attempt number.
    pub fn with_observer(mut self, observer: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Runs an operation under this policy.
    ///
    /// Permanent failures rethrow immediately. Retryable failures sleep a
    /// jittered, exponentially growing delay and try again, up to the attempt
    /// bound; the last failure is then rethrown as-is. Intermediate failures
    /// are observable only through the retry callback.
    ///
    /// The caller is suspended across attempts; the operation itself owns any
    /// timeout it needs.
    pub async fn invoke<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut delay = self.base_delay;

        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e)
                    if attempt < self.max_attempts
                        && (self.classify)(&e) == FailureClass::Retryable =>
                {
                    warn!(attempt, max = self.max_attempts, error = %e, "attempt failed, retrying");
                    if let Some(observer) = &self.on_retry {
                        observer(attempt);
                    }
                    sleep(jittered(delay)).await;
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop exited without returning")
    }
}

/// Full jitter over `(0, delay]`.
///
/// Concurrent callers that failed together must not retry together; each
/// picks an independent point in the window.
fn jittered(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis <= 1 {
        return Duration::from_millis(1);
    }
    Duration::from_millis(rand::thread_rng().gen_range(1..=millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_invokes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<&str> = RetryPolicy::new(3);

        let result: Result<(), &str> = policy
            .invoke(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("transient") }
            })
            .await;

        assert_eq!(result, Err("transient"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_rethrows_immediately() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<&str> =
            RetryPolicy::new(5).with_classifier(|_| FailureClass::Permanent);

        let result: Result<(), &str> = policy
            .invoke(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            })
            .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<&str> = RetryPolicy::new(5);

        let result = policy
            .invoke(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("not yet")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_retry_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_observer = seen.clone();
        let policy: RetryPolicy<&str> = RetryPolicy::new(3).with_observer(move |attempt| {
            seen_by_observer.lock().unwrap().push(attempt);
        });

        let _: Result<(), &str> = policy.invoke(|| async { Err("transient") }).await;

        // Two retries happen for three attempts; the final failure is not a retry.
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_classification() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<String> = RetryPolicy::new(10).with_classifier(|e: &String| {
            if e.starts_with("throttle") {
                FailureClass::Retryable
            } else {
                FailureClass::Permanent
            }
        });

        let result: Result<(), String> = policy
            .invoke(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("throttle".to_string())
                    } else {
                        Err("access denied".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result, Err("access denied".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_jitter_stays_within_window() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(800));
            assert!(d >= Duration::from_millis(1));
            assert!(d <= Duration::from_millis(800));
        }
        assert_eq!(jittered(Duration::ZERO), Duration::from_millis(1));
    }
}
