//! Failover — exponential backoff between broker restarts.
//!
//! The state is derived from the counters rather than stored:
//!
//! - no failures: `failures == 0`
//! - in backoff: `failures > 0` and `now < delay_expires`
//! - eligible to retry: `failures > 0` and `now >= delay_expires`
//!
//! `register_failure` and `reset_failures` are the only transitions. Failures
//! never expire on their own; the scheduler resets them once the broker
//! reports that it is running.

use std::time::Duration;

use brokerd_core::FailoverDefaults;
use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failover {
    /// Backoff after the first failure.
    pub delay: Duration,
    /// Upper bound for the backoff.
    pub max_delay: Duration,
    /// Failures after which the scheduler should give up. Unbounded if `None`.
    pub max_tries: Option<u32>,
    failures: u32,
    /// Set exactly when `failures > 0`.
    failure_time: Option<DateTime<Utc>>,
}

impl Failover {
    pub fn new(delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay,
            max_delay,
            max_tries: None,
            failures: 0,
            failure_time: None,
        }
    }

    pub fn from_defaults(defaults: &FailoverDefaults) -> Self {
        Self {
            max_tries: defaults.max_tries,
            ..Self::new(defaults.delay, defaults.max_delay)
        }
    }

    /// Rebuild a failover with recorded counters.
    ///
    /// Returns `None` when the counters break the `failure_time` invariant.
    pub fn restore(
        mut self,
        failures: u32,
        failure_time: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        if (failures > 0) != failure_time.is_some() {
            return None;
        }
        self.failures = failures;
        self.failure_time = failure_time;
        Some(self)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn failure_time(&self) -> Option<DateTime<Utc>> {
        self.failure_time
    }

    /// `min(max_delay, delay × 2^(failures − 1))`, or zero without failures.
    pub fn current_delay(&self) -> Duration {
        if self.failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(self.failures - 1);
        self.delay.saturating_mul(factor).min(self.max_delay)
    }

    /// When the current backoff window ends.
    pub fn delay_expires(&self) -> Option<DateTime<Utc>> {
        let failed_at = self.failure_time?;
        let delay = TimeDelta::from_std(self.current_delay()).unwrap_or(TimeDelta::MAX);
        Some(
            failed_at
                .checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    pub fn is_waiting_delay(&self, now: DateTime<Utc>) -> bool {
        self.delay_expires().is_some_and(|expires| now < expires)
    }

    /// Advisory: the scheduler never stops a broker on its own.
    pub fn is_max_tries_exceeded(&self) -> bool {
        self.max_tries.is_some_and(|max| self.failures >= max)
    }

    pub fn register_failure(&mut self, now: DateTime<Utc>) {
        self.failures = self.failures.saturating_add(1);
        self.failure_time = Some(now);
    }

    pub fn reset_failures(&mut self) {
        self.failures = 0;
        self.failure_time = None;
    }
}

impl Default for Failover {
    fn default() -> Self {
        Self::from_defaults(&FailoverDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    fn failover_with(failures: u32) -> Failover {
        let mut failover = Failover::new(Duration::from_secs(10), Duration::from_secs(60));
        for _ in 0..failures {
            failover.register_failure(t0());
        }
        failover
    }

    #[test]
    fn no_failures_means_no_delay() {
        let failover = failover_with(0);
        assert_eq!(failover.current_delay(), Duration::ZERO);
        assert_eq!(failover.delay_expires(), None);
        assert!(!failover.is_waiting_delay(t0()));
    }

    #[test]
    fn delay_doubles_per_failure() {
        assert_eq!(failover_with(1).current_delay(), Duration::from_secs(10));
        assert_eq!(failover_with(2).current_delay(), Duration::from_secs(20));
        assert_eq!(failover_with(3).current_delay(), Duration::from_secs(40));
    }

    #[test]
    fn delay_is_capped() {
        assert_eq!(failover_with(4).current_delay(), Duration::from_secs(60));
        assert_eq!(failover_with(40).current_delay(), Duration::from_secs(60));
    }

    #[test]
    fn waiting_flips_exactly_at_expiry() {
        let failover = failover_with(2);
        let expires = t0() + secs(20);
        assert_eq!(failover.delay_expires(), Some(expires));
        assert!(failover.is_waiting_delay(t0()));
        assert!(failover.is_waiting_delay(expires - TimeDelta::milliseconds(1)));
        assert!(!failover.is_waiting_delay(expires));
        assert!(!failover.is_waiting_delay(expires + secs(1)));
    }

    #[test]
    fn register_stamps_latest_failure() {
        let mut failover = failover_with(1);
        let later = t0() + secs(30);
        failover.register_failure(later);
        assert_eq!(failover.failures(), 2);
        assert_eq!(failover.failure_time(), Some(later));
        assert_eq!(failover.delay_expires(), Some(later + secs(20)));
    }

    #[test]
    fn reset_clears_counters() {
        let mut failover = failover_with(3);
        failover.reset_failures();
        assert_eq!(failover.failures(), 0);
        assert_eq!(failover.failure_time(), None);
        assert_eq!(failover.current_delay(), Duration::ZERO);
    }

    #[test]
    fn failures_do_not_expire_on_their_own() {
        let failover = failover_with(1);
        assert!(!failover.is_waiting_delay(t0() + secs(3600)));
        assert_eq!(failover.failures(), 1);
    }

    #[test]
    fn max_tries() {
        let mut failover = failover_with(2);
        assert!(!failover.is_max_tries_exceeded());

        failover.max_tries = Some(3);
        assert!(!failover.is_max_tries_exceeded());
        failover.register_failure(t0());
        assert!(failover.is_max_tries_exceeded());
    }

    #[test]
    fn restore_checks_invariant() {
        let base = Failover::new(Duration::from_secs(1), Duration::from_secs(8));
        assert!(base.clone().restore(1, None).is_none());
        assert!(base.clone().restore(0, Some(t0())).is_none());

        let restored = base.restore(2, Some(t0())).unwrap();
        assert_eq!(restored.failures(), 2);
        assert_eq!(restored.current_delay(), Duration::from_secs(2));
    }

    #[test]
    fn defaults_come_from_config() {
        let defaults = FailoverDefaults {
            delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(50),
            max_tries: Some(4),
        };
        let failover = Failover::from_defaults(&defaults);
        assert_eq!(failover.delay, Duration::from_secs(5));
        assert_eq!(failover.max_delay, Duration::from_secs(50));
        assert_eq!(failover.max_tries, Some(4));
        assert_eq!(failover.failures(), 0);
    }
}
