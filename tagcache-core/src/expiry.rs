//! Expiration policy and clocks.
//!
//! Every adapter evaluates expiry through [`is_expired`] with a `now`
//! supplied by the facade's [`Clock`], so relational and key-value storage
//! cannot disagree about whether an entry is live.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use crate::Timestamp;

/// Resolves relative lifetimes to absolute expiry timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    default_lifetime: Duration,
}

impl ExpirationPolicy {
    /// `default_lifetime` is used when a caller passes no lifetime. A zero
    /// default means entries never expire unless a lifetime is given.
    pub fn new(default_lifetime: Duration) -> Self {
        Self { default_lifetime }
    }

    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    /// Compute the absolute expiry for an entry written at `now`.
    ///
    /// - `None` resolves to the default lifetime
    /// - `Some(0)` never expires
    /// - `Some(n)` expires at `now + n`
    ///
    /// A lifetime too large to represent is treated as "never expires".
    pub fn compute_expiry(&self, now: Timestamp, lifetime: Option<Duration>) -> Option<Timestamp> {
        let lifetime = lifetime.unwrap_or(self.default_lifetime);
        if lifetime.is_zero() {
            return None;
        }
        TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
    }
}

/// An entry is expired once `now` reaches its expiry. `None` never expires.
pub fn is_expired(now: Timestamp, expires_at: Option<Timestamp>) -> bool {
    matches!(expires_at, Some(at) if now >= at)
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl ManualClock {
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_default_lifetime_applies_when_none() {
        let policy = ExpirationPolicy::new(Duration::from_secs(3600));
        assert_eq!(
            policy.compute_expiry(t0(), None),
            Some(t0() + TimeDelta::seconds(3600))
        );
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let policy = ExpirationPolicy::new(Duration::from_secs(3600));
        assert_eq!(policy.compute_expiry(t0(), Some(Duration::ZERO)), None);
    }

    #[test]
    fn test_zero_default_never_expires() {
        let policy = ExpirationPolicy::new(Duration::ZERO);
        assert_eq!(policy.compute_expiry(t0(), None), None);
    }

    #[test]
    fn test_explicit_lifetime() {
        let policy = ExpirationPolicy::new(Duration::ZERO);
        assert_eq!(
            policy.compute_expiry(t0(), Some(Duration::from_secs(5))),
            Some(t0() + TimeDelta::seconds(5))
        );
    }

    #[test]
    fn test_huge_lifetime_saturates_to_never() {
        let policy = ExpirationPolicy::new(Duration::ZERO);
        assert_eq!(policy.compute_expiry(t0(), Some(Duration::MAX)), None);
    }

    #[test]
    fn test_is_expired_boundaries() {
        let at = t0() + TimeDelta::seconds(10);
        assert!(!is_expired(t0(), Some(at)));
        assert!(is_expired(at, Some(at)));
        assert!(is_expired(at + TimeDelta::seconds(1), Some(at)));
        assert!(!is_expired(at + TimeDelta::days(10_000), None));
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::starting_at(t0());
        let other = clock.clone();
        other.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), t0() + TimeDelta::seconds(2));
        clock.set(t0());
        assert_eq!(other.now(), t0());
    }
}
