//! Retry Policy: a pure function of `(attempts_after_failure, max_retries,
//! backoff_base, now)`. No IO; fully unit-testable in isolation from the
//! Store, keeping `mark_failed`'s SQL side effects separate from its
//! backoff arithmetic.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reset to `pending` with `run_at` pushed out by the backoff delay.
    Retry,
    /// Exhausted the retry budget; move to `dead`.
    Dead,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryOutcome {
    pub decision: RetryDecision,
    /// For `Retry`: the new `run_at`. For `Dead`: unused by callers other
    /// than as a convenience `now` echo.
    pub new_run_at: DateTime<Utc>,
}

/// Decide whether a job should retry or move to the DLQ.
///
/// `attempts_after_this_failure` is the attempt counter *after* incrementing
/// for the failure just recorded; the exponent used for backoff is that same
/// number, so the first retry waits `backoff_base^1`, the second
/// `backoff_base^2`, and so on.
pub fn decide(
    attempts_after_this_failure: i64,
    max_retries: i64,
    backoff_base: i64,
    now: DateTime<Utc>,
) -> RetryOutcome {
    if attempts_after_this_failure > max_retries {
        return RetryOutcome {
            decision: RetryDecision::Dead,
            new_run_at: now,
        };
    }

    let delay_seconds = backoff_base.saturating_pow(attempts_after_this_failure as u32);
    RetryOutcome {
        decision: RetryDecision::Retry,
        new_run_at: now + Duration::seconds(delay_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn retries_while_attempts_at_or_under_budget() {
        let out = decide(1, 3, 2, t(0));
        assert_eq!(out.decision, RetryDecision::Retry);
        assert_eq!(out.new_run_at, t(0) + Duration::seconds(2));

        let out = decide(3, 3, 2, t(0));
        assert_eq!(out.decision, RetryDecision::Retry);
        assert_eq!(out.new_run_at, t(0) + Duration::seconds(8));
    }

    #[test]
    fn dead_once_budget_exhausted() {
        let out = decide(4, 3, 2, t(0));
        assert_eq!(out.decision, RetryDecision::Dead);
    }

    #[test]
    fn backoff_grows_with_configured_base() {
        // max_retries 2, backoff_base 2: delays should be 2s, 4s, then dead.
        let first = decide(1, 2, 2, t(0));
        assert_eq!(first.decision, RetryDecision::Retry);
        assert_eq!(first.new_run_at, t(0) + Duration::seconds(2));

        let second = decide(2, 2, 2, t(0));
        assert_eq!(second.decision, RetryDecision::Retry);
        assert_eq!(second.new_run_at, t(0) + Duration::seconds(4));

        let third = decide(3, 2, 2, t(0));
        assert_eq!(third.decision, RetryDecision::Dead);
    }

    #[test]
    fn zero_max_retries_goes_straight_to_dead() {
        let out = decide(1, 0, 2, t(0));
        assert_eq!(out.decision, RetryDecision::Dead);
    }
}
