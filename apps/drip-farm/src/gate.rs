//! Interval gate and the clock it is fed from.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// Whether a faucet is due for another attempt.
///
/// Never attempted means due. Otherwise due once `interval` has fully elapsed
/// since the last attempt; the boundary itself counts as due. A clock that
/// went backwards reads as "not yet".
pub fn is_due(interval: Duration, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(last) = last_run else {
        return true;
    };
    match (now - last).to_std() {
        Ok(elapsed) => elapsed >= interval,
        Err(_) => false,
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let Ok(step) = chrono::Duration::from_std(by) else {
            return;
        };
        let mut now = self.lock();
        *now = now.checked_add_signed(step).unwrap_or(*now);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    const THIRTY_MIN: Duration = Duration::from_secs(30 * 60);

    #[test]
    fn test_never_run_is_due() {
        assert!(is_due(THIRTY_MIN, None, t0()));
        assert!(is_due(Duration::ZERO, None, t0()));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let last = t0();
        let exactly = last + chrono::Duration::minutes(30);
        let just_before = exactly - chrono::Duration::milliseconds(1);
        assert!(is_due(THIRTY_MIN, Some(last), exactly));
        assert!(!is_due(THIRTY_MIN, Some(last), just_before));
        assert!(is_due(THIRTY_MIN, Some(last), exactly + chrono::Duration::hours(5)));
    }

    #[test]
    fn test_zero_interval_always_due() {
        assert!(is_due(Duration::ZERO, Some(t0()), t0()));
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let last = t0();
        let earlier = last - chrono::Duration::minutes(1);
        assert!(!is_due(Duration::from_secs(1), Some(last), earlier));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), t0() + chrono::Duration::seconds(90));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}
