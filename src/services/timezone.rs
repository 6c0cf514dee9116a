//! Conversion between the zone people reason in and the zone feedings are
//! stored in.
//!
//! Both zones are explicit configuration. The current instant comes from a
//! [`Clock`] so conversions stay deterministic under test.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone)]
pub struct TimezoneService {
    user_tz: Tz,
    storage_tz: Tz,
    clock: Arc<dyn Clock>,
}

impl TimezoneService {
    pub fn new(user_tz: Tz, storage_tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            user_tz,
            storage_tz,
            clock,
        }
    }

    pub fn user_tz(&self) -> Tz {
        self.user_tz
    }

    pub fn storage_tz(&self) -> Tz {
        self.storage_tz
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn now_user(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.user_tz)
    }

    pub fn now_storage(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.storage_tz)
    }

    /// `now - minutes_ago`, computed in the user zone and converted once to
    /// the storage zone.
    pub fn resolve_offset(&self, minutes_ago: u32) -> DateTime<Tz> {
        let in_user_zone = self.now_user() - Duration::minutes(i64::from(minutes_ago));
        in_user_zone.with_timezone(&self.storage_tz)
    }

    pub fn to_user(&self, dt: &DateTime<Tz>) -> DateTime<Tz> {
        dt.with_timezone(&self.user_tz)
    }

    /// Time since `dt`, measured against the storage-zone clock.
    pub fn elapsed_since(&self, dt: &DateTime<Tz>) -> Duration {
        self.now_storage().signed_duration_since(*dt)
    }
}

impl std::fmt::Debug for TimezoneService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimezoneService")
            .field("user_tz", &self.user_tz)
            .field("storage_tz", &self.storage_tz)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::utils::datetime::parse_stored_timestamp;
    use chrono::{TimeZone, Timelike};

    fn service(now: DateTime<Utc>, storage: Tz) -> TimezoneService {
        TimezoneService::new(
            chrono_tz::America::Argentina::Buenos_Aires,
            storage,
            Arc::new(FixedClock(now)),
        )
    }

    #[test]
    fn test_resolve_offset_round_trips_wall_clock() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 42, 17).unwrap();
        for storage in [chrono_tz::UTC, chrono_tz::Europe::Moscow, chrono_tz::Asia::Kolkata] {
            let tz = service(now, storage);
            for minutes in [0u32, 5, 10, 15, 30, 45, 60] {
                let expected = tz.now_user() - Duration::minutes(i64::from(minutes));
                let stored = tz.resolve_offset(minutes);
                assert_eq!(stored.timezone(), storage);

                let back = tz.to_user(&stored);
                assert_eq!(back.hour(), expected.hour());
                assert_eq!(back.minute(), expected.minute());
            }
        }
    }

    #[test]
    fn test_resolve_offset_keeps_instant() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let tz = service(now, chrono_tz::UTC);
        let stored = tz.resolve_offset(15);
        assert_eq!(stored.with_timezone(&Utc), now - Duration::minutes(15));
    }

    #[test]
    fn test_elapsed_since_naive_row() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let tz = service(now, chrono_tz::Europe::Moscow);
        // 17:00 Moscow wall clock is 14:00 UTC.
        let last = parse_stored_timestamp("2024-03-10 17:00:00", tz.storage_tz()).unwrap();
        assert_eq!(tz.elapsed_since(&last), Duration::hours(1));
    }
}
