//! Explicit retry policy for calls that cross the generation boundary.

use tracing::{debug, warn};

/// Classification of failures as transient (worth another attempt) or fatal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Bounded retry of a fallible operation.
///
/// `max_attempts` counts every call including the first; the error of the
/// last attempt is returned unchanged. Fatal errors are returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` calls. Zero is treated as one:
    /// the operation always runs at least once.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    debug!(attempt, "attempt succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        %err,
                        "transient failure, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Transient(usize),
        Fatal,
    }

    impl fmt::Display for Failure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            matches!(self, Failure::Transient(_))
        }
    }

    #[test]
    fn retries_transient_failures_until_success() {
        let policy = RetryPolicy::new(3);
        let mut calls = 0;
        let got = policy.run(|attempt| {
            calls += 1;
            if attempt < 3 {
                Err(Failure::Transient(attempt))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(got, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn last_failure_is_reraised() {
        let policy = RetryPolicy::new(2);
        let got: Result<(), _> = policy.run(|attempt| Err(Failure::Transient(attempt)));
        assert_eq!(got, Err(Failure::Transient(2)));
    }

    #[test]
    fn fatal_failures_are_not_retried() {
        let policy = RetryPolicy::new(5);
        let mut calls = 0;
        let got: Result<(), _> = policy.run(|_| {
            calls += 1;
            Err(Failure::Fatal)
        });
        assert_eq!(got, Err(Failure::Fatal));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts(), 1);
        let got: Result<u8, Failure> = policy.run(|_| Ok(7));
        assert_eq!(got, Ok(7));
    }
}
