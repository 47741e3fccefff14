//! Rule-driven intake notifications.
//!
//! Configured rules pair an employer code with a health flag; when a
//! submitted questionnaire matches both, a notification goes to the rule's
//! recipients. Delivery is best-effort and never affects the intake commit.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::IntakeRecord;

/// Notification errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// One configured trigger: fires when an intake for `employer_code` has the
/// named health flag set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyRule {
    pub employer_code: String,
    pub flag: String,
    pub recipients: Vec<String>,
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Delivery backend.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification) -> NotifyResult<()>;
}

/// Default backend: writes the notification to the log. Stands in until a
/// mail or messaging transport is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, notification: &Notification) -> NotifyResult<()> {
        info!(
            subject = %notification.subject,
            recipients = ?notification.recipients,
            "notification"
        );
        Ok(())
    }
}

/// Evaluate the rules against a submitted intake record.
///
/// A rule fires only when the employer code matches exactly and the named
/// flag is both known and true. Unknown flag names never fire.
pub fn evaluate(record: &IntakeRecord, rules: &[NotifyRule]) -> Vec<Notification> {
    rules
        .iter()
        .filter(|rule| {
            record.employer_code.as_deref() == Some(rule.employer_code.as_str())
                && record.flag(&rule.flag) == Some(true)
        })
        .map(|rule| Notification {
            subject: format!("Health flag alert: {}", rule.flag),
            body: format!(
                "Intake for {} (id {}) reports {}.",
                record.full_name(),
                record.subject_id,
                rule.flag
            ),
            recipients: rule.recipients.clone(),
        })
        .collect()
}

/// Deliver each notification, logging failures instead of propagating them.
pub fn dispatch(notifier: &dyn Notifier, notifications: &[Notification]) {
    for notification in notifications {
        if let Err(e) = notifier.deliver(notification) {
            warn!(subject = %notification.subject, error = %e, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn rule(employer: &str, flag: &str) -> NotifyRule {
        NotifyRule {
            employer_code: employer.into(),
            flag: flag.into(),
            recipients: vec!["salud@acme.test".into()],
        }
    }

    fn record_with(employer: Option<&str>, hearing_loss: bool) -> IntakeRecord {
        let mut record = IntakeRecord::new("415117423".into(), "Ana".into(), "Mora".into());
        record.employer_code = employer.map(Into::into);
        record.hearing_loss = hearing_loss;
        record
    }

    #[test]
    fn test_rule_fires_on_employer_and_flag() {
        let rules = vec![rule("ACME", "hearing_loss")];
        let fired = evaluate(&record_with(Some("ACME"), true), &rules);

        assert_eq!(fired.len(), 1);
        assert!(fired[0].body.contains("Ana Mora"));
        assert_eq!(fired[0].recipients, vec!["salud@acme.test".to_string()]);
    }

    #[test]
    fn test_rule_requires_both_conditions() {
        let rules = vec![rule("ACME", "hearing_loss")];

        assert!(evaluate(&record_with(Some("ACME"), false), &rules).is_empty());
        assert!(evaluate(&record_with(Some("OTHER"), true), &rules).is_empty());
        assert!(evaluate(&record_with(None, true), &rules).is_empty());
    }

    #[test]
    fn test_unknown_flag_never_fires() {
        let rules = vec![rule("ACME", "no_such_flag")];
        assert!(evaluate(&record_with(Some("ACME"), true), &rules).is_empty());
    }

    #[test]
    fn test_multiple_rules_fire_independently() {
        let mut record = record_with(Some("ACME"), true);
        record.diabetes = true;
        let rules = vec![rule("ACME", "hearing_loss"), rule("ACME", "diabetes")];

        assert_eq!(evaluate(&record, &rules).len(), 2);
    }

    struct SpyNotifier {
        delivered: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Notifier for SpyNotifier {
        fn deliver(&self, notification: &Notification) -> NotifyResult<()> {
            if self.fail {
                return Err(NotifyError::Delivery("smtp down".into()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push(notification.subject.clone());
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_swallows_delivery_errors() {
        let spy = SpyNotifier {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        };
        let notifications = evaluate(
            &record_with(Some("ACME"), true),
            &[rule("ACME", "hearing_loss")],
        );

        // Must not panic or propagate
        dispatch(&spy, &notifications);
        assert!(spy.delivered.lock().unwrap().is_empty());
    }
}
