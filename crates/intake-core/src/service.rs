//! Service facade: the operation surface callers (CLI, HTTP layer, FFI)
//! build on.
//!
//! Every write follows the same shape: validate, take the store lock, commit
//! locally together with an outbox task, release the lock, then report the
//! mirror's secondary status. A mirror failure is information, never an
//! error.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use intake_mirror::{ExternalStore, HttpExternalStore};

use crate::config::CoreConfig;
use crate::conflict::{ConflictDetector, DuplicateCheck};
use crate::db::Database;
use crate::models::{
    minute_of_day, IntakePatch, IntakeRecord, Order, OrderFilter, OrderPatch, OrderStatus,
    OrderSummary,
};
use crate::notify::{self, LogNotifier, Notifier};
use crate::reconcile::{flush, MirrorHandle, MirrorStatus, Reconciler};
use crate::schedule::AssignmentResolver;
use crate::{CoreError, CoreResult};

/// Uniform response envelope for transport layers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &CoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Request to admit a new order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateOrderRequest {
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    pub exam_type: String,
    /// Explicit provider; when absent one is auto-assigned
    pub provider: Option<String>,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub observations: Option<String>,
    /// Operator override: admit despite an open order for the same subject
    pub allow_duplicate: bool,
}

/// Request to submit an intake questionnaire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IntakeRequest {
    /// Link to an order; resolved from the subject's open order when absent
    pub shared_key: Option<String>,
    pub subject_id: String,
    pub first_name: String,
    pub last_name: String,
    pub employer_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub sex: Option<String>,
    pub age: Option<i64>,
    pub diabetes: bool,
    pub hypertension: bool,
    pub hearing_loss: bool,
    pub vision_impairment: bool,
    pub family_diabetes: bool,
    pub family_hypertension: bool,
    pub family_cancer: bool,
    pub observations: Option<String>,
}

/// Request to close an order as attended.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttendRequest {
    pub observations: Option<String>,
    pub recommendations: Option<String>,
    /// Subject details, needed only when the shared key has no local order
    /// yet and an ATTENDED record must be created for it.
    pub subject_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub exam_type: Option<String>,
    pub provider: Option<String>,
    /// Defaults to today when creating
    pub scheduled_date: Option<String>,
    /// Defaults to the current time when creating
    pub scheduled_time: Option<String>,
}

/// A committed write plus its secondary mirror status.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome<T> {
    pub record: T,
    pub mirror: MirrorStatus,
    /// Prior closed order for the same subject, surfaced as a warning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_attended: Option<OrderSummary>,
}

/// The engine's entry point. Owns the local store, the external store
/// client, and (optionally) the background dispatcher; cheap to share
/// behind an `Arc`.
pub struct IntakeService {
    db: Arc<Mutex<Database>>,
    store: Arc<dyn ExternalStore>,
    notifier: Arc<dyn Notifier>,
    config: CoreConfig,
    dispatcher: Option<MirrorHandle>,
}

impl IntakeService {
    /// Build a service that mirrors inline: each commit flushes the outbox
    /// on the calling thread and reports the real outcome.
    pub fn new(db: Database, store: Arc<dyn ExternalStore>, config: CoreConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            store,
            notifier: Arc::new(LogNotifier),
            config,
            dispatcher: None,
        }
    }

    /// Open the local store at `path` and connect the external store from
    /// configuration.
    pub fn open<P: AsRef<Path>>(path: P, config: CoreConfig) -> CoreResult<Self> {
        let db = Database::open(path)?;
        let store = HttpExternalStore::new(&config.external.base_url, config.external.timeout_secs)
            .map_err(|e| CoreError::Internal(format!("external store client: {e}")))?;
        Ok(Self::new(db, Arc::new(store), config))
    }

    /// Move mirroring to a background thread. Commits then return
    /// `MirrorStatus::Queued` immediately.
    pub fn with_dispatcher(mut self) -> Self {
        self.dispatcher = Some(MirrorHandle::spawn(
            Arc::clone(&self.db),
            Arc::clone(&self.store),
        ));
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Admit a new order.
    ///
    /// An open order for the same subject rejects the request unless the
    /// operator set `allow_duplicate`; closed history only comes back as a
    /// warning. When no provider is named, one is assigned
    /// deterministically. The local commit decides the result; the mirror
    /// status rides along.
    pub fn create_order(&self, req: CreateOrderRequest) -> CoreResult<CommitOutcome<Order>> {
        validate_required("subject_id", &req.subject_id)?;
        validate_required("first_name", &req.first_name)?;
        validate_required("last_name", &req.last_name)?;
        validate_required("exam_type", &req.exam_type)?;
        validate_slot(&req.scheduled_date, &req.scheduled_time)?;

        let (order, prior_attended, shared_key) = {
            let mut db = self.db.lock()?;

            let mut prior_attended = None;
            if !req.allow_duplicate {
                match ConflictDetector::new(&db).check_duplicate(&req.subject_id)? {
                    DuplicateCheck::None => {}
                    DuplicateCheck::Pending {
                        order,
                        has_linked_intake,
                    } => {
                        return Err(CoreError::Duplicate {
                            order,
                            has_linked_intake,
                        })
                    }
                    DuplicateCheck::Attended { order } => prior_attended = Some(order),
                }
            }

            let provider = match &req.provider {
                Some(provider) if !provider.trim().is_empty() => provider.clone(),
                _ => AssignmentResolver::new(&db, &self.config.excluded_providers).auto_assign(
                    &req.scheduled_date,
                    &req.scheduled_time,
                    &req.exam_type,
                )?,
            };

            let mut order = Order::new(
                req.subject_id,
                req.first_name,
                req.last_name,
                req.exam_type,
                req.scheduled_date,
                req.scheduled_time,
            );
            order.employer_code = req.employer_code;
            order.phone = req.phone;
            order.email = req.email;
            order.sex = req.sex;
            order.age = req.age;
            order.provider = Some(provider);
            order.observations = req.observations;

            // A concurrent admit can slip past the check above; the
            // single-PENDING index catches it at commit.
            if let Err(e) = Reconciler::new(&mut db).commit_create(&order) {
                if e.is_constraint() {
                    if let Some(open) = db.find_pending_by_subject(&order.subject_id)? {
                        let has_linked_intake =
                            db.has_intake_for(&open.shared_key, &open.subject_id)?;
                        return Err(CoreError::Duplicate {
                            order: (&open).into(),
                            has_linked_intake,
                        });
                    }
                }
                return Err(e.into());
            }

            let shared_key = order.shared_key.clone();
            (order, prior_attended, shared_key)
        };

        info!(shared_key = %shared_key, subject_id = %order.subject_id, "order admitted");
        let mirror = self.mirror_after_commit(&shared_key);
        Ok(CommitOutcome {
            record: order,
            mirror,
            prior_attended,
        })
    }

    /// Apply a partial update to an order.
    pub fn update_order(
        &self,
        shared_key: &str,
        patch: OrderPatch,
    ) -> CoreResult<CommitOutcome<Order>> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(CoreError::Validation("nothing to update".into()));
        }
        if let Some(date) = &patch.scheduled_date {
            validate_date(date)?;
        }
        if let Some(time) = &patch.scheduled_time {
            validate_time(time)?;
        }

        let order = {
            let mut db = self.db.lock()?;
            let (order, _task_id) = Reconciler::new(&mut db)
                .commit_update(shared_key, &patch)?
                .ok_or_else(|| CoreError::NotFound(format!("order {shared_key}")))?;
            order
        };

        let mirror = self.mirror_after_commit(shared_key);
        Ok(CommitOutcome {
            record: order,
            mirror,
            prior_attended: None,
        })
    }

    /// Close an order as attended, recording findings.
    ///
    /// Upsert by shared key: when no local order carries the key (walk-in,
    /// or a record first seen through the external store), an ATTENDED one
    /// is created from the request's subject details.
    pub fn mark_attended(
        &self,
        shared_key: &str,
        req: AttendRequest,
    ) -> CoreResult<CommitOutcome<Order>> {
        let patch = OrderPatch {
            status: Some(OrderStatus::Attended),
            observations: req.observations.clone(),
            recommendations: req.recommendations.clone(),
            ..Default::default()
        }
        .normalized();

        let order = {
            let mut db = self.db.lock()?;
            match Reconciler::new(&mut db).commit_update(shared_key, &patch)? {
                Some((order, _task_id)) => order,
                None => {
                    let order = attended_order_from(shared_key, req)?;
                    Reconciler::new(&mut db).commit_create(&order)?;
                    order
                }
            }
        };

        info!(shared_key, "order closed as attended");
        let mirror = self.mirror_after_commit(shared_key);
        Ok(CommitOutcome {
            record: order,
            mirror,
            prior_attended: None,
        })
    }

    /// Duplicate pre-check, for surfacing the conflict before a form is
    /// filled in.
    pub fn check_duplicate(&self, subject_id: &str) -> CoreResult<DuplicateCheck> {
        let db = self.db.lock()?;
        Ok(ConflictDetector::new(&db).check_duplicate(subject_id)?)
    }

    pub fn get_order(&self, shared_key: &str) -> CoreResult<Order> {
        let db = self.db.lock()?;
        db.get_order(shared_key)?
            .ok_or_else(|| CoreError::NotFound(format!("order {shared_key}")))
    }

    pub fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let db = self.db.lock()?;
        Ok(db.list_orders(filter)?)
    }

    /// Submit an intake questionnaire.
    ///
    /// Local-only: intake never mirrors. Linkage to an order is best-effort
    /// via the subject's open order; configured notification rules fire
    /// after the commit.
    pub fn create_intake(&self, req: IntakeRequest) -> CoreResult<IntakeRecord> {
        validate_required("subject_id", &req.subject_id)?;
        validate_required("first_name", &req.first_name)?;
        validate_required("last_name", &req.last_name)?;

        let record = {
            let db = self.db.lock()?;

            let shared_key = match req.shared_key {
                Some(key) => Some(key),
                None => db
                    .find_pending_by_subject(&req.subject_id)?
                    .map(|order| order.shared_key),
            };

            let mut record =
                IntakeRecord::new(req.subject_id, req.first_name, req.last_name);
            record.shared_key = shared_key;
            record.employer_code = req.employer_code;
            record.phone = req.phone;
            record.email = req.email;
            record.sex = req.sex;
            record.age = req.age;
            record.diabetes = req.diabetes;
            record.hypertension = req.hypertension;
            record.hearing_loss = req.hearing_loss;
            record.vision_impairment = req.vision_impairment;
            record.family_diabetes = req.family_diabetes;
            record.family_hypertension = req.family_hypertension;
            record.family_cancer = req.family_cancer;
            record.observations = req.observations;

            record.id = db.insert_intake(&record)?;
            record
        };

        debug!(id = record.id, subject_id = %record.subject_id, "intake recorded");
        let notifications = notify::evaluate(&record, &self.config.notify_rules);
        notify::dispatch(self.notifier.as_ref(), &notifications);

        Ok(record)
    }

    /// Apply a partial update to an intake record.
    pub fn update_intake(&self, id: i64, patch: &IntakePatch) -> CoreResult<IntakeRecord> {
        let db = self.db.lock()?;
        if !db.update_intake(id, patch)? {
            return Err(CoreError::NotFound(format!("intake record {id}")));
        }
        db.get_intake(id)?
            .ok_or_else(|| CoreError::NotFound(format!("intake record {id}")))
    }

    pub fn get_intake(&self, id: i64) -> CoreResult<IntakeRecord> {
        let db = self.db.lock()?;
        db.get_intake(id)?
            .ok_or_else(|| CoreError::NotFound(format!("intake record {id}")))
    }

    /// Administrative delete. Local-only: pending mirror work is dropped,
    /// but an already-mirrored external record is deliberately left alone.
    pub fn delete_order(&self, shared_key: &str) -> CoreResult<()> {
        let db = self.db.lock()?;
        if !db.delete_order(shared_key)? {
            return Err(CoreError::NotFound(format!("order {shared_key}")));
        }
        db.supersede_queued_for_key(shared_key)?;
        db.delete_intake_by_shared_key(shared_key)?;
        info!(shared_key, "order deleted locally");
        Ok(())
    }

    /// Access the shared store, for embedding callers that need direct
    /// queries.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    fn mirror_after_commit(&self, shared_key: &str) -> MirrorStatus {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.notify();
            return MirrorStatus::Queued;
        }

        // Inline mode: flush on the calling thread and report the real
        // outcome for this entity.
        match flush(&self.db, self.store.as_ref()) {
            Ok(outcomes) => outcomes
                .into_iter()
                .find(|o| o.shared_key == shared_key)
                .map(|o| o.status)
                .unwrap_or(MirrorStatus::Queued),
            Err(e) => MirrorStatus::Failed {
                detail: e.to_string(),
            },
        }
    }
}

/// Build the ATTENDED order an upsert-by-key creates when the key is new to
/// the local store.
fn attended_order_from(shared_key: &str, req: AttendRequest) -> CoreResult<Order> {
    let subject_id = req.subject_id.unwrap_or_default();
    let first_name = req.first_name.unwrap_or_default();
    let last_name = req.last_name.unwrap_or_default();
    let exam_type = req.exam_type.unwrap_or_default();
    validate_required("subject_id", &subject_id)?;
    validate_required("first_name", &first_name)?;
    validate_required("last_name", &last_name)?;
    validate_required("exam_type", &exam_type)?;

    let now = chrono::Utc::now();
    let scheduled_date = req
        .scheduled_date
        .unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
    let scheduled_time = req
        .scheduled_time
        .unwrap_or_else(|| now.format("%H:%M").to_string());
    validate_slot(&scheduled_date, &scheduled_time)?;

    let mut order = Order::new(
        subject_id,
        first_name,
        last_name,
        exam_type,
        scheduled_date,
        scheduled_time,
    );
    order.shared_key = shared_key.to_string();
    order.provider = req.provider;
    order.status = OrderStatus::Attended;
    order.observations = req.observations;
    order.recommendations = req.recommendations;
    Ok(order)
}

fn validate_required(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_date(date: &str) -> CoreResult<()> {
    if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(CoreError::Validation(format!(
            "scheduled_date must be YYYY-MM-DD, got {date}"
        )));
    }
    Ok(())
}

fn validate_time(time: &str) -> CoreResult<()> {
    if minute_of_day(time).is_none() {
        return Err(CoreError::Validation(format!(
            "scheduled_time must be HH:MM, got {time}"
        )));
    }
    Ok(())
}

fn validate_slot(date: &str, time: &str) -> CoreResult<()> {
    validate_date(date)?;
    validate_time(time)
}
