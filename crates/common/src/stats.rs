//! Process-lifetime delivery statistics.
//!
//! Counters cover the current calendar day only: the first increment or
//! snapshot taken on a different day (or month) than the one the counters were
//! started on discards them and starts over from zero. Nothing is persisted.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Local};
use serde::Serialize;

/// Counter selector for [`Statistics::increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Dispatches,
    FailedDispatches,
    FailedMessages,
    UpdatedPushKeys,
    DeviceRegistrations,
    DeviceUnregistrations,
    DeviceUnregistrationsInvalid,
}

/// Point-in-time copy of today's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dispatches: u64,
    pub failed_dispatches: u64,
    pub failed_messages: u64,
    pub updated_push_keys: u64,
    pub device_registrations: u64,
    pub device_unregistrations: u64,
    pub device_unregistrations_invalid: u64,
}

#[derive(Debug, Default)]
struct DailyCounters {
    /// `(month, day)` the counters belong to; `None` until first use.
    started: Option<(u32, u32)>,
    counters: StatsSnapshot,
}

impl DailyCounters {
    fn roll_over(&mut self, now: DateTime<Local>) {
        let today = (now.month(), now.day());
        if self.started != Some(today) {
            if self.started.is_some() {
                tracing::info!(
                    previous = ?self.counters,
                    "Day changed, resetting statistics"
                );
            }
            self.counters = StatsSnapshot::default();
            self.started = Some(today);
        }
    }
}

/// Shared statistics holder. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Statistics {
    inner: Mutex<DailyCounters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: StatKind) {
        self.increment_at(kind, Local::now());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Local::now())
    }

    /// Increment using an explicit wall-clock reading.
    pub fn increment_at(&self, kind: StatKind, now: DateTime<Local>) {
        let mut guard = self.lock();
        guard.roll_over(now);
        let counters = &mut guard.counters;
        let slot = match kind {
            StatKind::Dispatches => &mut counters.dispatches,
            StatKind::FailedDispatches => &mut counters.failed_dispatches,
            StatKind::FailedMessages => &mut counters.failed_messages,
            StatKind::UpdatedPushKeys => &mut counters.updated_push_keys,
            StatKind::DeviceRegistrations => &mut counters.device_registrations,
            StatKind::DeviceUnregistrations => &mut counters.device_unregistrations,
            StatKind::DeviceUnregistrationsInvalid => {
                &mut counters.device_unregistrations_invalid
            }
        };
        *slot += 1;
    }

    /// Snapshot using an explicit wall-clock reading.
    pub fn snapshot_at(&self, now: DateTime<Local>) -> StatsSnapshot {
        let mut guard = self.lock();
        guard.roll_over(now);
        guard.counters
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DailyCounters> {
        // A panic while holding the lock cannot leave the counters half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, month, day, hour, 0, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn test_counters_accumulate_within_a_day() {
        let stats = Statistics::new();
        stats.increment_at(StatKind::Dispatches, at(3, 10, 8));
        stats.increment_at(StatKind::Dispatches, at(3, 10, 9));
        stats.increment_at(StatKind::FailedDispatches, at(3, 10, 9));
        stats.increment_at(StatKind::DeviceRegistrations, at(3, 10, 22));

        let snapshot = stats.snapshot_at(at(3, 10, 23));
        assert_eq!(snapshot.dispatches, 2);
        assert_eq!(snapshot.failed_dispatches, 1);
        assert_eq!(snapshot.device_registrations, 1);
        assert_eq!(snapshot.failed_messages, 0);
    }

    #[test]
    fn test_counters_reset_on_day_change() {
        let stats = Statistics::new();
        stats.increment_at(StatKind::FailedMessages, at(3, 10, 23));
        stats.increment_at(StatKind::UpdatedPushKeys, at(3, 10, 23));

        let next_day = stats.snapshot_at(at(3, 11, 0));
        assert_eq!(next_day, StatsSnapshot::default());

        stats.increment_at(StatKind::FailedMessages, at(3, 11, 1));
        assert_eq!(stats.snapshot_at(at(3, 11, 2)).failed_messages, 1);
    }

    #[test]
    fn test_counters_reset_on_month_change_with_same_day_number() {
        let stats = Statistics::new();
        stats.increment_at(StatKind::DeviceUnregistrations, at(3, 10, 12));
        assert_eq!(
            stats.snapshot_at(at(4, 10, 12)).device_unregistrations,
            0
        );
    }

    #[test]
    fn test_snapshot_is_monotonic_within_a_day() {
        let stats = Statistics::new();
        let mut previous = stats.snapshot_at(at(5, 1, 0)).dispatches;
        for hour in 0..24 {
            stats.increment_at(StatKind::Dispatches, at(5, 1, hour));
            let current = stats.snapshot_at(at(5, 1, hour)).dispatches;
            assert!(current > previous);
            previous = current;
        }
        assert_eq!(previous, 24);
    }
}
