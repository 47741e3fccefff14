//! Automatic provider assignment.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::{is_excluded, AvailabilityIndex, ScheduleError, ScheduleResult};
use crate::db::Database;
use crate::models::minute_of_day;

/// Assigns a provider to a requested (date, time, modality) slot.
///
/// Selection is deterministic: candidates are evaluated in provider-name
/// ascending order and the first eligible, unbooked one wins. Identical
/// inputs always produce the same assignment.
pub struct AssignmentResolver<'a> {
    db: &'a Database,
    excluded: &'a [String],
}

impl<'a> AssignmentResolver<'a> {
    pub fn new(db: &'a Database, excluded: &'a [String]) -> Self {
        Self { db, excluded }
    }

    /// Pick a provider for the slot, or fail with `NoProviderAvailable`.
    ///
    /// Eligibility requires an active window for the request's weekday and
    /// modality, the time inside `[start, end)`, no exclusion-policy match,
    /// and no existing booking on the exact (provider, date, time) tuple.
    /// The booking check runs per candidate against the order store; it is
    /// independent of window membership.
    pub fn auto_assign(&self, date: &str, time: &str, modality: &str) -> ScheduleResult<String> {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ScheduleError::InvalidSlot(format!("bad date: {date}")))?;
        if minute_of_day(time).is_none() {
            return Err(ScheduleError::InvalidSlot(format!("bad time: {time}")));
        }

        let weekday = parsed.weekday().num_days_from_monday() as u8;
        let index = AvailabilityIndex::new(self.db);
        let windows = index.active_windows(weekday, modality)?;

        debug!(
            date,
            time,
            modality,
            candidates = windows.len(),
            "resolving provider assignment"
        );

        for window in windows {
            if is_excluded(&window.provider, self.excluded) {
                continue;
            }
            if !window.contains(time) {
                continue;
            }
            if self.db.is_slot_booked(&window.provider, date, time)? {
                continue;
            }
            return Ok(window.provider);
        }

        Err(ScheduleError::NoProviderAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilityWindow, Order};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_window(db: &Database, provider: &str, weekday: u8, modality: &str) {
        db.upsert_window(&AvailabilityWindow::new(
            provider.into(),
            weekday,
            modality.into(),
            "08:00".into(),
            "12:00".into(),
            20,
        ))
        .unwrap();
    }

    fn book(db: &Database, provider: &str, subject: &str, date: &str, time: &str) {
        let mut order = Order::new(
            subject.into(),
            "Ana".into(),
            "Mora".into(),
            "audiometria".into(),
            date.into(),
            time.into(),
        );
        order.provider = Some(provider.into());
        db.insert_order(&order).unwrap();
    }

    // 2024-03-11 is a Monday (weekday 0)
    const MONDAY: &str = "2024-03-11";

    #[test]
    fn test_no_windows_means_no_provider() {
        let db = setup_db();
        let resolver = AssignmentResolver::new(&db, &[]);

        let err = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap_err();
        assert!(matches!(err, ScheduleError::NoProviderAvailable));
    }

    #[test]
    fn test_single_eligible_provider_is_assigned() {
        let db = setup_db();
        add_window(&db, "Dra. Rivas", 0, "audiometria");

        let resolver = AssignmentResolver::new(&db, &[]);
        let provider = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap();
        assert_eq!(provider, "Dra. Rivas");
    }

    #[test]
    fn test_wrong_weekday_or_modality_is_ineligible() {
        let db = setup_db();
        add_window(&db, "Dra. Rivas", 1, "audiometria");
        add_window(&db, "Dr. Sol", 0, "vision");

        let resolver = AssignmentResolver::new(&db, &[]);
        let err = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap_err();
        assert!(matches!(err, ScheduleError::NoProviderAvailable));
    }

    #[test]
    fn test_time_outside_window_is_ineligible() {
        let db = setup_db();
        add_window(&db, "Dra. Rivas", 0, "audiometria");

        let resolver = AssignmentResolver::new(&db, &[]);
        // End is exclusive
        assert!(resolver.auto_assign(MONDAY, "12:00", "audiometria").is_err());
        assert!(resolver.auto_assign(MONDAY, "07:59", "audiometria").is_err());
        assert!(resolver.auto_assign(MONDAY, "11:59", "audiometria").is_ok());
    }

    #[test]
    fn test_first_by_name_wins_deterministically() {
        let db = setup_db();
        add_window(&db, "Zamora", 0, "audiometria");
        add_window(&db, "Alonso", 0, "audiometria");

        let resolver = AssignmentResolver::new(&db, &[]);
        for _ in 0..5 {
            let provider = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap();
            assert_eq!(provider, "Alonso");
        }
    }

    #[test]
    fn test_booked_candidate_is_skipped() {
        let db = setup_db();
        add_window(&db, "Alonso", 0, "audiometria");
        add_window(&db, "Zamora", 0, "audiometria");
        book(&db, "Alonso", "1", MONDAY, "09:00");

        let resolver = AssignmentResolver::new(&db, &[]);
        let provider = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap();
        assert_eq!(provider, "Zamora");

        // A booking at a different time does not block
        let provider = resolver.auto_assign(MONDAY, "09:20", "audiometria").unwrap();
        assert_eq!(provider, "Alonso");
    }

    #[test]
    fn test_excluded_provider_is_skipped() {
        let db = setup_db();
        add_window(&db, "Cuenta Admin", 0, "audiometria");
        add_window(&db, "Dra. Rivas", 0, "audiometria");

        let excluded = vec!["admin".to_string()];
        let resolver = AssignmentResolver::new(&db, &excluded);
        let provider = resolver.auto_assign(MONDAY, "09:00", "audiometria").unwrap();
        assert_eq!(provider, "Dra. Rivas");
    }

    #[test]
    fn test_invalid_date_or_time_is_rejected() {
        let db = setup_db();
        let resolver = AssignmentResolver::new(&db, &[]);

        assert!(matches!(
            resolver.auto_assign("11/03/2024", "09:00", "audiometria"),
            Err(ScheduleError::InvalidSlot(_))
        ));
        assert!(matches!(
            resolver.auto_assign(MONDAY, "9am", "audiometria"),
            Err(ScheduleError::InvalidSlot(_))
        ));
    }
}
