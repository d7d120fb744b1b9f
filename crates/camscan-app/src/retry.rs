//! Bounded retry of a single acquisition candidate

use std::time::Duration;

use camscan_core::prelude::*;

/// How often a candidate is tried, and how long to wait between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; values below 1 are raised to 1
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        if max_attempts == 0 {
            warn!("max_attempts = 0 is not usable, trying each candidate once");
        }
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try the same candidate again after the delay
    Retry { after: Duration },
    /// Move on to the next candidate in the chain
    Advance,
    /// Stop the whole session; no candidate can help
    Abort,
}

/// Attempt bookkeeping for the candidate currently being tried
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Record the start of an attempt; returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Re-attempts made on the current candidate
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn on_failure(&self, failure: &ScanFailure) -> RetryDecision {
        if failure.kind.aborts_fallback() {
            RetryDecision::Abort
        } else if failure.is_transient() && self.attempts < self.policy.max_attempts {
            RetryDecision::Retry {
                after: self.policy.backoff,
            }
        } else {
            RetryDecision::Advance
        }
    }

    /// Start counting afresh for the next candidate
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(max: u32) -> RetryState {
        RetryState::new(RetryPolicy::new(max, Duration::from_millis(50)))
    }

    #[test]
    fn test_busy_retries_until_max_then_advances() {
        let mut retry = state(3);
        let busy = ScanFailure::busy("device busy");

        retry.begin_attempt();
        assert_eq!(
            retry.on_failure(&busy),
            RetryDecision::Retry {
                after: Duration::from_millis(50)
            }
        );
        retry.begin_attempt();
        assert!(matches!(retry.on_failure(&busy), RetryDecision::Retry { .. }));
        retry.begin_attempt();
        assert_eq!(retry.on_failure(&busy), RetryDecision::Advance);
        assert_eq!(retry.retry_count(), 2);
    }

    #[test]
    fn test_permanent_failure_advances_immediately() {
        let mut retry = state(3);
        retry.begin_attempt();
        let decision = retry.on_failure(&ScanFailure::constraint_rejected("1920x1080 unsupported"));
        assert_eq!(decision, RetryDecision::Advance);

        retry.begin_attempt();
        assert_eq!(
            retry.on_failure(&ScanFailure::timeout("no answer in 5s")),
            RetryDecision::Advance
        );
    }

    #[test]
    fn test_fatal_failures_abort() {
        let mut retry = state(3);
        retry.begin_attempt();
        assert_eq!(
            retry.on_failure(&ScanFailure::permission_denied("NotAllowedError")),
            RetryDecision::Abort
        );
        assert_eq!(
            retry.on_failure(&ScanFailure::engine_init("wasm failed to load")),
            RetryDecision::Abort
        );
    }

    #[test]
    fn test_device_not_found_advances() {
        let mut retry = state(3);
        retry.begin_attempt();
        assert_eq!(
            retry.on_failure(&ScanFailure::device_not_found("cam-3")),
            RetryDecision::Advance
        );
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);

        let mut retry = RetryState::new(policy);
        retry.begin_attempt();
        assert_eq!(retry.on_failure(&ScanFailure::busy("busy")), RetryDecision::Advance);
    }

    #[test]
    fn test_reset_clears_attempts() {
        let mut retry = state(2);
        retry.begin_attempt();
        retry.begin_attempt();
        retry.reset();
        assert_eq!(retry.attempts(), 0);
        assert_eq!(retry.retry_count(), 0);
        assert_eq!(retry.begin_attempt(), 1);
    }
}
