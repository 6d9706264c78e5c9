//! Attempt retry policy.
//!
//! The hosting process, not this controller, decides whether a failed job
//! gets another attempt. The policy itself is deliberately tiny and pure:
//! attempt `n` of a job allowed `max_attempts` attempts is the last one
//! exactly when `n >= max_attempts`. The controller also consults it to
//! decide whether work that should survive into a further attempt (history,
//! staging contents) may still be needed.
//!
//! `max_attempts == 0` is an invalid configuration and is rejected by
//! [`crate::config::ControllerConfig::validate`] before a `RetryContext` is
//! ever built; the policy itself stays total and does not re-check it.

use crate::identity::AttemptId;

/// The (attempt ordinal, configured maximum) pair the retry decision is a
/// pure function of. `max_attempts` is immutable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    /// 1-based ordinal of the running attempt.
    pub attempt_ordinal: u32,
    /// Maximum number of attempts the job is allowed.
    pub max_attempts: u32,
}

impl RetryContext {
    /// Build the context for a launched attempt.
    #[must_use]
    pub const fn new(attempt_ordinal: u32, max_attempts: u32) -> Self {
        Self {
            attempt_ordinal,
            max_attempts,
        }
    }

    /// Build the context from the attempt identity in the launch context.
    #[must_use]
    pub const fn for_attempt(attempt: AttemptId, max_attempts: u32) -> Self {
        Self::new(attempt.ordinal, max_attempts)
    }

    /// Whether no further attempt will be requested after this one.
    ///
    /// Monotonic in the ordinal: once an attempt is the last one, every
    /// later ordinal is too.
    #[must_use]
    pub const fn is_last_attempt(self) -> bool {
        self.attempt_ordinal >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_attempt_table() {
        assert!(RetryContext::new(1, 1).is_last_attempt());
        assert!(!RetryContext::new(1, 2).is_last_attempt());
        assert!(RetryContext::new(2, 2).is_last_attempt());
        assert!(!RetryContext::new(2, 3).is_last_attempt());
    }

    #[test]
    fn test_monotonic_in_ordinal() {
        for max_attempts in 1..=8 {
            let mut seen_last = false;
            for ordinal in 1..=16 {
                let last = RetryContext::new(ordinal, max_attempts).is_last_attempt();
                assert!(
                    !(seen_last && !last),
                    "is_last_attempt flipped back to false at ordinal {ordinal} with max {max_attempts}"
                );
                seen_last |= last;
            }
            assert!(seen_last);
        }
    }

    #[test]
    fn test_from_attempt_id() {
        let attempt: AttemptId = "attempt_1317529182569_0004_000002".parse().unwrap();
        let ctx = RetryContext::for_attempt(attempt, 2);
        assert_eq!(ctx.attempt_ordinal, 2);
        assert!(ctx.is_last_attempt());
    }
}
