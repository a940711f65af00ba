//! Bounded exponential backoff for chunk fetches.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Outcome of an operation that never succeeded.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was classified as permanent.
    Fatal(E),
    /// Every attempt failed with a retryable error.
    AttemptsExceeded(E),
}

impl<E> RetryError<E> {
    /// The last error observed.
    pub fn into_inner(self) -> E {
        match self {
            Self::Fatal(err) | Self::AttemptsExceeded(err) => err,
        }
    }
}

/// Retry policy: at most `max_attempts` tries, waiting `base_delay * 2^n`
/// (capped at `max_delay`) between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Single attempt, no backoff.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, `classify` stops it, or attempts run out.
    ///
    /// `on_retry` is called with the attempt number (starting at 1) and the
    /// error before each backoff sleep.
    pub async fn run<F, Fut, T, E, C, R>(
        &self,
        mut op: F,
        classify: C,
        mut on_retry: R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDisposition,
        R: FnMut(usize, &E),
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        on_retry(attempt + 1, &err);
                        sleep(self.backoff_delay(attempt)).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    /// Delay before retry number `attempt + 1`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 1u128 << attempt.min(6);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}
