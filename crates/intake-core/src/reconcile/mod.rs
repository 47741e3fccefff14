//! Dual-store reconciliation.
//!
//! The local store is the transactional source of truth; the external store
//! is kept eventually consistent through a best-effort mirror:
//!
//! 1. The local commit (insert or COALESCE-merge update) lands first, along
//!    with one outbox task in the same transaction. The caller's result is
//!    decided here.
//! 2. A dispatcher drains the outbox and performs at most one HTTP round
//!    trip per task: create is a pure insert keyed by the shared key; update
//!    first resolves the external store's internal id via the shared key.
//! 3. Failures are logged and reported as a secondary status. They never
//!    roll back or fail the local commit.

pub mod dispatcher;
pub mod map;

pub use dispatcher::*;
pub use map::*;

use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, warn};

use intake_mirror::{ExternalStore, MirrorError};

use crate::db::{enqueue_stmt, get_order_stmt, insert_order_stmt, update_order_stmt};
use crate::db::{Database, DbError, DbResult, MirrorOp, MirrorTask};
use crate::models::{Order, OrderPatch};

/// Secondary, non-blocking status of a mirror attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MirrorStatus {
    /// Task enqueued; a background dispatcher will pick it up.
    Queued,
    /// The external store accepted the write.
    Applied { internal_id: String },
    /// The round trip failed or the record could not be resolved. The local
    /// commit stands.
    Failed { detail: String },
    /// A newer commit made this attempt moot.
    Superseded,
}

/// Result of dispatching one outbox task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task_id: i64,
    pub shared_key: String,
    pub status: MirrorStatus,
}

/// Commits local writes and enqueues their mirror tasks atomically.
pub struct Reconciler<'a> {
    db: &'a mut Database,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Insert a new order and enqueue its mirror-create task in one
    /// transaction. Returns the task id.
    pub fn commit_create(&mut self, order: &Order) -> DbResult<i64> {
        let payload = serde_json::to_string(&map::external_payload(order))
            .map_err(|e| DbError::Constraint(format!("unserializable payload: {e}")))?;

        let tx = self.db.transaction()?;
        insert_order_stmt(&tx, order)?;
        let task_id = enqueue_stmt(&tx, &order.shared_key, MirrorOp::Create, &payload, order.version)?;
        tx.commit()?;

        debug!(shared_key = %order.shared_key, task_id, "order committed, mirror queued");
        Ok(task_id)
    }

    /// Apply a partial update and enqueue a mirror-update task carrying the
    /// full post-commit row, in one transaction. `Ok(None)` when no such
    /// order exists.
    pub fn commit_update(
        &mut self,
        shared_key: &str,
        patch: &OrderPatch,
    ) -> DbResult<Option<(Order, i64)>> {
        let tx = self.db.transaction()?;
        if update_order_stmt(&tx, shared_key, patch)? == 0 {
            return Ok(None);
        }

        let order = get_order_stmt(&tx, shared_key)?
            .ok_or_else(|| DbError::NotFound(format!("order {shared_key}")))?;
        let payload = serde_json::to_string(&map::external_payload(&order))
            .map_err(|e| DbError::Constraint(format!("unserializable payload: {e}")))?;
        let task_id = enqueue_stmt(&tx, shared_key, MirrorOp::Update, &payload, order.version)?;
        tx.commit()?;

        debug!(shared_key, version = order.version, task_id, "order updated, mirror queued");
        Ok(Some((order, task_id)))
    }
}

/// Drain queued tasks and push each to the external store.
///
/// The lock is taken only to drain and to record outcomes, never across a
/// round trip. One attempt per task; no retry, no backoff.
pub fn flush(db: &Mutex<Database>, store: &dyn ExternalStore) -> DbResult<Vec<TaskOutcome>> {
    let tasks = {
        let mut db = db.lock().map_err(|_| DbError::Lock)?;
        db.drain_queued()?
    };

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        let status = apply_task(store, &task);
        if let MirrorStatus::Failed { detail } = &status {
            warn!(shared_key = %task.shared_key, task_id = task.id, detail, "mirror attempt failed");
        }

        {
            let db = db.lock().map_err(|_| DbError::Lock)?;
            let (state, detail) = match &status {
                MirrorStatus::Applied { internal_id } => ("applied", Some(internal_id.clone())),
                MirrorStatus::Failed { detail } => ("failed", Some(detail.clone())),
                MirrorStatus::Superseded => {
                    ("superseded", Some("external record is newer".to_string()))
                }
                MirrorStatus::Queued => ("queued", None),
            };
            db.mark_task(task.id, state, detail.as_deref())?;
        }

        outcomes.push(TaskOutcome {
            task_id: task.id,
            shared_key: task.shared_key,
            status,
        });
    }

    Ok(outcomes)
}

fn apply_task(store: &dyn ExternalStore, task: &MirrorTask) -> MirrorStatus {
    let payload = match serde_json::from_str(&task.payload) {
        Ok(payload) => payload,
        Err(e) => {
            return MirrorStatus::Failed {
                detail: format!("bad payload: {e}"),
            }
        }
    };

    match task.op {
        MirrorOp::Create => match store.create(&payload) {
            Ok(record) => MirrorStatus::Applied {
                internal_id: record.id,
            },
            Err(e) => failed(e),
        },
        MirrorOp::Update => match store.find_by_shared_key(&task.shared_key) {
            Ok(Some(record)) => {
                // A later commit may already have landed; do not clobber it.
                if record.fields.version.unwrap_or(0) >= task.version {
                    return MirrorStatus::Superseded;
                }
                match store.update_by_internal_id(&record.id, &payload) {
                    Ok(()) => MirrorStatus::Applied {
                        internal_id: record.id,
                    },
                    Err(e) => failed(e),
                }
            }
            Ok(None) => MirrorStatus::Failed {
                detail: format!("no external record for shared key {}", task.shared_key),
            },
            Err(e) => failed(e),
        },
    }
}

fn failed(err: MirrorError) -> MirrorStatus {
    MirrorStatus::Failed {
        detail: err.to_string(),
    }
}
