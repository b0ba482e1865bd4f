use std::fmt::Display;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one. `0` means a single attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay,
        }
    }

    pub fn none() -> RetryPolicy {
        RetryPolicy::new(0, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

/// Waits between retry attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs `op` until it succeeds, `is_retryable` rejects its error, or
/// `policy` runs out of attempts. `op` receives the zero-based attempt
/// number. The last error is returned unchanged. There is no sleep after
/// the final attempt.
pub fn retry<T, E, F, R>(
    policy: &RetryPolicy,
    sleeper: &mut dyn Sleeper,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
{
    let attempts = policy.attempts();
    let mut attempt = 0;
    loop {
        let error = match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !is_retryable(&error) {
            return Err(error);
        }
        attempt += 1;
        if attempt >= attempts {
            log::warn!("Attempt {attempt}/{attempts} failed: {error}. Giving up");
            return Err(error);
        }
        log::warn!(
            "Attempt {attempt}/{attempts} failed: {error}. Retrying in {:?}",
            policy.retry_delay
        );
        sleeper.sleep(policy.retry_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Vec<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
        }
    }

    #[test]
    fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let mut sleeper = RecordingSleeper::default();
        let mut calls = Vec::new();
        let result: Result<(), String> = retry(&policy, &mut sleeper, |_| true, |attempt| {
            calls.push(attempt);
            Err(format!("refused #{attempt}"))
        });
        assert_eq!(result, Err("refused #2".to_string()));
        assert_eq!(calls, vec![0, 1, 2]);
        assert_eq!(sleeper.sleeps, vec![Duration::from_millis(5); 2]);
    }

    #[test]
    fn test_zero_retries_is_single_attempt() {
        let mut sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), &str> = retry(&RetryPolicy::none(), &mut sleeper, |_| true, |_| {
            calls += 1;
            Err("refused")
        });
        assert_eq!(result, Err("refused"));
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps.is_empty());
    }

    #[test]
    fn test_success_after_failures() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let mut sleeper = RecordingSleeper::default();
        let result: Result<u32, &str> = retry(&policy, &mut sleeper, |_| true, |attempt| {
            if attempt < 2 {
                Err("refused")
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(sleeper.sleeps.len(), 2);
    }

    #[test]
    fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let mut sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), &str> = retry(&policy, &mut sleeper, |e| *e != "fatal", |_| {
            calls += 1;
            Err("fatal")
        });
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps.is_empty());
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(2));
        assert_eq!(policy.attempts(), 4);
    }
}
