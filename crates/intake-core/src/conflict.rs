//! Duplicate-order conflict detection.
//!
//! Runs before a new order is admitted: an open (PENDING) order for the same
//! subject blocks creation; a closed (ATTENDED) one is only a warning.

use serde::Serialize;

use crate::db::{Database, DbResult};
use crate::models::OrderSummary;

/// Outcome of a duplicate check. A store failure is a `DbError`, not a
/// variant here - "unknown" must never be conflated with "duplicate found".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuplicateCheck {
    None,
    Pending {
        order: OrderSummary,
        has_linked_intake: bool,
    },
    Attended {
        order: OrderSummary,
    },
}

/// Read-only detector over the local store.
pub struct ConflictDetector<'a> {
    db: &'a Database,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Check for a prior order for this subject.
    ///
    /// A PENDING order wins over any ATTENDED history; when more than one
    /// PENDING row exists (tolerated, not expected) the most recently created
    /// one is reported. Linkage is best-effort: any intake record matching
    /// the order's shared key or the subject id counts.
    pub fn check_duplicate(&self, subject_id: &str) -> DbResult<DuplicateCheck> {
        if let Some(order) = self.db.find_pending_by_subject(subject_id)? {
            let has_linked_intake = self
                .db
                .has_intake_for(&order.shared_key, &order.subject_id)?;
            return Ok(DuplicateCheck::Pending {
                order: (&order).into(),
                has_linked_intake,
            });
        }

        if let Some(order) = self.db.find_latest_attended(subject_id)? {
            return Ok(DuplicateCheck::Attended {
                order: (&order).into(),
            });
        }

        Ok(DuplicateCheck::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntakeRecord, Order, OrderStatus};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_order(subject_id: &str, status: OrderStatus) -> Order {
        let mut order = Order::new(
            subject_id.into(),
            "Ana".into(),
            "Mora".into(),
            "audiometria".into(),
            "2024-03-11".into(),
            "09:00".into(),
        );
        order.status = status;
        order
    }

    #[test]
    fn test_no_history() {
        let db = setup_db();
        let check = ConflictDetector::new(&db).check_duplicate("415117423").unwrap();
        assert_eq!(check, DuplicateCheck::None);
    }

    #[test]
    fn test_pending_without_intake() {
        let db = setup_db();
        let order = make_order("415117423", OrderStatus::Pending);
        db.insert_order(&order).unwrap();

        let check = ConflictDetector::new(&db).check_duplicate("415117423").unwrap();
        match check {
            DuplicateCheck::Pending {
                order: summary,
                has_linked_intake,
            } => {
                assert_eq!(summary.shared_key, order.shared_key);
                assert_eq!(summary.created_at, order.created_at);
                assert!(!has_linked_intake);
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn test_pending_with_linked_intake_by_subject() {
        let db = setup_db();
        db.insert_order(&make_order("415117423", OrderStatus::Pending))
            .unwrap();
        // Linked by subject id only; no shared key on the intake record
        db.insert_intake(&IntakeRecord::new(
            "415117423".into(),
            "Ana".into(),
            "Mora".into(),
        ))
        .unwrap();

        let check = ConflictDetector::new(&db).check_duplicate("415117423").unwrap();
        assert!(matches!(
            check,
            DuplicateCheck::Pending {
                has_linked_intake: true,
                ..
            }
        ));
    }

    #[test]
    fn test_pending_shadows_attended() {
        let db = setup_db();
        let mut old = make_order("415117423", OrderStatus::Attended);
        old.created_at = "2023-01-05T10:00:00+00:00".into();
        db.insert_order(&old).unwrap();
        db.insert_order(&make_order("415117423", OrderStatus::Pending))
            .unwrap();

        let check = ConflictDetector::new(&db).check_duplicate("415117423").unwrap();
        assert!(matches!(check, DuplicateCheck::Pending { .. }));
    }

    #[test]
    fn test_attended_only_is_warning() {
        let db = setup_db();
        db.insert_order(&make_order("415117423", OrderStatus::Attended))
            .unwrap();

        let check = ConflictDetector::new(&db).check_duplicate("415117423").unwrap();
        match check {
            DuplicateCheck::Attended { order } => {
                assert_eq!(order.status, OrderStatus::Attended);
            }
            other => panic!("expected attended, got {other:?}"),
        }
    }

    #[test]
    fn test_other_subject_does_not_match() {
        let db = setup_db();
        db.insert_order(&make_order("415117423", OrderStatus::Pending))
            .unwrap();

        let check = ConflictDetector::new(&db).check_duplicate("999").unwrap();
        assert_eq!(check, DuplicateCheck::None);
    }
}
