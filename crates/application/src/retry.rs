use std::time::Duration;

use domain::common::error::DomainError;

/// Delivery policy for one action: attempts, backoff between them and a
/// per-attempt timeout.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (after the initial attempt).
    pub max_retries: usize,
    /// Backoff delays between retries. If fewer entries than `max_retries`,
    /// the last entry is repeated.
    pub backoff_schedule: Vec<Duration>,
    /// Timeout per individual attempt.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_schedule: vec![Duration::from_millis(200), Duration::from_secs(1)],
            timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Build from the millisecond values used in configuration files.
    pub fn from_millis(max_retries: usize, backoff_ms: &[u64], timeout_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_schedule: backoff_ms.iter().copied().map(Duration::from_millis).collect(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff_schedule
            .get(attempt)
            .or_else(|| self.backoff_schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Run `f` until it succeeds, at most `1 + max_retries` times.
///
/// Each attempt is bounded by `config.timeout`; failed attempts sleep for the
/// scheduled backoff before the next one. Returns the number of attempts on
/// success and the last error otherwise.
pub async fn retry_with_backoff<F, Fut>(config: &RetryConfig, mut f: F) -> Result<usize, DomainError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), DomainError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match tokio::time::timeout(config.timeout, f()).await {
            Ok(Ok(())) => return Ok(attempt + 1),
            Ok(Err(e)) => {
                tracing::debug!(attempt = attempt + 1, error = %e, "delivery attempt failed");
                last_error = Some(e);
            }
            Err(_elapsed) => {
                tracing::debug!(attempt = attempt + 1, "delivery attempt timed out");
                last_error = Some(DomainError::EngineError("attempt timed out".to_string()));
            }
        }

        if attempt < config.max_retries {
            tokio::time::sleep(config.backoff_for(attempt)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| DomainError::EngineError("no delivery attempt made".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn make_config(max_retries: usize, timeout_ms: u64) -> RetryConfig {
        RetryConfig::from_millis(max_retries, &[1], timeout_ms)
    }

    #[test]
    fn from_millis_converts() {
        let c = RetryConfig::from_millis(3, &[10, 20], 500);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.backoff_schedule[1], Duration::from_millis(20));
        assert_eq!(c.timeout, Duration::from_millis(500));
    }

    #[test]
    fn backoff_repeats_last_entry() {
        let c = RetryConfig::from_millis(5, &[10, 20], 500);
        assert_eq!(c.backoff_for(0), Duration::from_millis(10));
        assert_eq!(c.backoff_for(4), Duration::from_millis(20));
        assert_eq!(
            RetryConfig::from_millis(1, &[], 1).backoff_for(0),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn first_attempt_success_reports_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&make_config(3, 1_000), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Ok(()) }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn transient_failures_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&make_config(3, 1_000), || {
            let attempt = calls_clone.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 2 {
                    Err(DomainError::EngineError("listener busy".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = retry_with_backoff(&make_config(2, 1_000), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Err(DomainError::EngineError("listener down".to_string())) }
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("listener down"));
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn slow_attempt_times_out() {
        let result = retry_with_backoff(&make_config(0, 10), || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("timed out"), "got: {err_msg}");
    }
}
