use std::{fmt::Display, time::Duration};

use logminer_types::{log::error, models::config::RetryConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// `should_retry` rejected the error.
    Fatal(E),
    Exhausted { attempts: u32, error: E },
}

/// Delay before retry number `attempt`, starting at 1.
pub fn backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let initial = Duration::from_millis(config.initial_backoff_ms);
    let max = Duration::from_millis(config.max_backoff_ms);
    initial
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(max)
}

/// Runs `operation` until it succeeds, fails with an error `should_retry` rejects, or
/// `config.max_attempts` attempts have been made. Sleeps on the calling thread in between.
pub fn blocking_retry<T, E: Display>(
    description: impl Display,
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> bool,
    mut operation: impl FnMut() -> Result<T, E>,
) -> Result<T, RetryError<E>> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if !should_retry(&err) => return Err(RetryError::Fatal(err)),
            Err(err) if attempt >= max_attempts => {
                error!(
                    "error during {}: {}. giving up after {} attempts",
                    description, err, attempt
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    error: err,
                });
            }
            Err(err) => {
                let delay = backoff(config, attempt);
                error!(
                    "error during {} (attempt {}/{}): {}. retrying in {:?}...",
                    description, attempt, max_attempts, err, delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 200,
            max_backoff_ms: 1000,
        };
        assert_eq!(backoff(&config, 1), Duration::from_millis(200));
        assert_eq!(backoff(&config, 2), Duration::from_millis(400));
        assert_eq!(backoff(&config, 3), Duration::from_millis(800));
        assert_eq!(backoff(&config, 4), Duration::from_millis(1000));
        assert_eq!(backoff(&config, 40), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_until_success() {
        let calls = Cell::new(0);
        let result = blocking_retry("test", &config(5), |_: &String| true, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("flaky".to_string())
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_retry_exhausted() {
        let calls = Cell::new(0);
        let result: Result<(), _> = blocking_retry("test", &config(3), |_: &String| true, || {
            calls.set(calls.get() + 1);
            Err("down".to_string())
        });
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                error: "down".to_string()
            })
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = blocking_retry("test", &config(3), |_: &String| false, || {
            calls.set(calls.get() + 1);
            Err("fatal".to_string())
        });
        assert_eq!(result, Err(RetryError::Fatal("fatal".to_string())));
        assert_eq!(calls.get(), 1);
    }
}
