//! Bounded exponential backoff for transient LLM failures.
//!
//! Only errors reporting [`AppError::is_transient`] are retried; permanent
//! failures (quota exhausted, bad request, empty answer) return immediately.

use docent_core::{AppError, AppResult, SynthesisConfig};
use std::future::Future;
use std::time::Duration;

/// Retry schedule: `max_attempts` total calls, waits growing by `multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl From<&SynthesisConfig> for RetryPolicy {
    fn from(config: &SynthesisConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1),
        }
    }
}

impl RetryPolicy {
    /// Waits between consecutive attempts (`max_attempts - 1` entries).
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.initial_backoff;
        for _ in 1..self.max_attempts {
            delays.push(delay);
            delay = delay.saturating_mul(self.multiplier);
        }
        delays
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let delays = self.delays();
        let mut attempt = 0usize;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < delays.len() => {
                    let delay = delays[attempt];
                    attempt += 1;
                    tracing::warn!(
                        "Transient LLM failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_attempts,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    return Err(AppError::Llm(format!(
                        "Giving up after {} attempts: {}",
                        self.max_attempts, err
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_delays() {
        let delays = RetryPolicy::default().delays();
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn test_single_attempt_has_no_delays() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert!(policy.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::LlmUnavailable("503".to_string()))
                } else {
                    Ok("answer")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_failure() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result: AppResult<()> = RetryPolicy::default()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::LlmUnavailable("overloaded".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Llm(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: AppResult<()> = RetryPolicy::default()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Llm("quota exceeded".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_synthesis_config() {
        let policy = RetryPolicy::from(&SynthesisConfig {
            max_attempts: 4,
            initial_backoff_ms: 250,
            backoff_multiplier: 3,
        });
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_millis(250),
                Duration::from_millis(750),
                Duration::from_millis(2250)
            ]
        );
    }
}
