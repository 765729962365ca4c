//! Retry policy for optimistic session writes
//!
//! Bundles the attempt ceiling, the backoff function and the error
//! classification so the mutator loop stays free of policy decisions.

use std::time::Duration;

use crate::error::Error;

/// Attempt ceiling used when nothing is configured
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay used when nothing is configured
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// How a failed attempt is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The record moved on between read and write
    Conflict,
    /// The store failed for reasons unrelated to the request
    Transient,
    /// The request itself is invalid; retrying cannot help
    Rejected,
}

/// What the mutator should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then re-fetch and try again
    Retry(Duration),
    /// Give up on the operation
    Abandon,
}

/// Bounded retry with linearly growing backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Same ceiling, no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after `attempt` (1-based) failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Classify an error raised by one attempt
    pub fn classify(&self, error: &Error) -> FailureKind {
        if error.is_conflict() {
            FailureKind::Conflict
        } else if error.is_transient() {
            FailureKind::Transient
        } else {
            FailureKind::Rejected
        }
    }

    /// Decide whether to try again after `attempt` failed with `error`
    pub fn decide(&self, attempt: u32, error: &Error) -> RetryDecision {
        match self.classify(error) {
            FailureKind::Rejected => RetryDecision::Abandon,
            _ if attempt >= self.max_attempts => RetryDecision::Abandon,
            _ => RetryDecision::Retry(self.delay_for(attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_delay_grows_with_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_classification() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.classify(&Error::Conflict("stale".into())),
            FailureKind::Conflict
        );
        assert_eq!(
            policy.classify(&Error::Transient("offline".into())),
            FailureKind::Transient
        );
        assert_eq!(policy.classify(&Error::NotFacilitator), FailureKind::Rejected);
        assert_eq!(
            policy.classify(&Error::SessionNotFound(Uuid::new_v4())),
            FailureKind::Rejected
        );
    }

    #[test]
    fn test_decide_respects_ceiling() {
        let policy = RetryPolicy::default();
        let conflict = Error::Conflict("stale".into());

        assert_eq!(
            policy.decide(1, &conflict),
            RetryDecision::Retry(Duration::from_millis(100))
        );
        assert_eq!(
            policy.decide(2, &conflict),
            RetryDecision::Retry(Duration::from_millis(200))
        );
        assert_eq!(policy.decide(3, &conflict), RetryDecision::Abandon);
    }

    #[test]
    fn test_rejections_never_retried() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(1, &Error::NotParticipant), RetryDecision::Abandon);
        assert_eq!(
            policy.decide(1, &Error::InvalidInput("blank".into())),
            RetryDecision::Abandon
        );
    }
}
