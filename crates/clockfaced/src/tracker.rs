//! Per-employee attendance state for the logged-in kiosk session.
//!
//! Remembers the last clock direction so the kiosk never offers a duplicate
//! consecutive clock-in/out, and rolls the state over at local midnight.
//! This is a UX guard only — the attendance service remains the authority
//! and may still reject a submission.

use chrono::NaiveDate;

use crate::api::AttendanceApi;
use clockface_core::LogType;

pub struct AttendanceTracker {
    current: Option<LogType>,
    last_seen_date: NaiveDate,
}

impl AttendanceTracker {
    pub fn new(current: Option<LogType>, today: NaiveDate) -> Self {
        Self {
            current,
            last_seen_date: today,
        }
    }

    /// Initialize from the attendance service's last-log endpoint. A fetch
    /// failure degrades to "unknown" rather than blocking startup; the
    /// service still enforces correctness on submission.
    pub async fn load(api: &dyn AttendanceApi, today: NaiveDate) -> Self {
        let current = match api.last_log().await {
            Ok(log_type) => {
                tracing::info!(?log_type, "loaded last attendance log");
                log_type
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch last log; starting without one");
                None
            }
        };
        Self::new(current, today)
    }

    pub fn current(&self) -> Option<LogType> {
        self.current
    }

    /// Whether a new attempt may start for `requested`: it must differ from
    /// the type already on record.
    pub fn can_start(&self, requested: LogType) -> bool {
        self.current != Some(requested)
    }

    /// Record an accepted submission.
    pub fn record(&mut self, log_type: LogType) {
        self.current = Some(log_type);
    }

    /// Midnight watchdog: if the local date moved past the last one seen,
    /// clear the recorded type so the new day's first action is not blocked.
    /// Returns true when a rollover happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today == self.last_seen_date {
            return false;
        }
        self.last_seen_date = today;
        if self.current.take().is_some() {
            tracing::info!(%today, "local midnight crossed; attendance state cleared");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn duplicate_type_blocked() {
        let tracker = AttendanceTracker::new(Some(LogType::In), day(1));
        assert!(!tracker.can_start(LogType::In));
        assert!(tracker.can_start(LogType::Out));
    }

    #[test]
    fn anything_allowed_when_unknown() {
        let tracker = AttendanceTracker::new(None, day(1));
        assert!(tracker.can_start(LogType::In));
        assert!(tracker.can_start(LogType::Out));
    }

    #[test]
    fn record_updates_current() {
        let mut tracker = AttendanceTracker::new(None, day(1));
        tracker.record(LogType::In);
        assert_eq!(tracker.current(), Some(LogType::In));
        assert!(!tracker.can_start(LogType::In));
    }

    #[test]
    fn same_day_checks_are_noops() {
        let mut tracker = AttendanceTracker::new(Some(LogType::In), day(1));
        assert!(!tracker.roll_over(day(1)));
        assert_eq!(tracker.current(), Some(LogType::In));
    }

    #[test]
    fn crossing_midnight_clears_state() {
        let mut tracker = AttendanceTracker::new(Some(LogType::In), day(1));
        assert!(tracker.roll_over(day(2)));
        assert_eq!(tracker.current(), None);
        assert!(tracker.can_start(LogType::In));

        // Subsequent checks the same day stay quiet.
        assert!(!tracker.roll_over(day(2)));
    }
}
