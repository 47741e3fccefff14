//! Mirror outbox database operations.
//!
//! Every local commit enqueues one task in the same transaction. The
//! dispatcher drains queued tasks, coalescing per shared key so a later
//! commit's mirror can never be overwritten by an earlier one completing
//! late.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbResult};

/// Mirror operation carried by an outbox task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOp {
    Create,
    Update,
}

impl MirrorOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorOp::Create => "create",
            MirrorOp::Update => "update",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(MirrorOp::Create),
            "update" => Some(MirrorOp::Update),
            _ => None,
        }
    }
}

/// A queued mirror task.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorTask {
    pub id: i64,
    pub shared_key: String,
    pub op: MirrorOp,
    /// External-form JSON payload, built at commit time
    pub payload: String,
    /// Local commit version this payload reflects
    pub version: i64,
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<MirrorTask> {
    let op: String = row.get(2)?;
    Ok(MirrorTask {
        id: row.get(0)?,
        shared_key: row.get(1)?,
        op: MirrorOp::parse(&op).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown mirror op: {op}").into(),
            )
        })?,
        payload: row.get(3)?,
        version: row.get(4)?,
    })
}

pub(crate) fn enqueue_stmt(
    conn: &Connection,
    shared_key: &str,
    op: MirrorOp,
    payload: &str,
    version: i64,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO mirror_outbox (shared_key, op, payload, version) VALUES (?1, ?2, ?3, ?4)",
        params![shared_key, op.as_str(), payload, version],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Take the queued tasks to dispatch, one per shared key.
    ///
    /// Drained tasks move to `inflight` inside the same transaction, so a
    /// task is handed to at most one dispatching thread. Older queued
    /// versions of the same key are marked superseded. When a queued create
    /// is coalesced away under a later update, the surviving task is
    /// promoted to a create so the external record still comes into
    /// existence (with the newest payload).
    pub fn drain_queued(&mut self) -> DbResult<Vec<MirrorTask>> {
        let tx = self.conn.transaction()?;

        let all: Vec<MirrorTask> = {
            let mut stmt = tx.prepare(
                "SELECT id, shared_key, op, payload, version FROM mirror_outbox
                 WHERE status = 'queued'
                 ORDER BY shared_key ASC, version ASC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_task)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut keep: Vec<MirrorTask> = Vec::new();
        let mut superseded: Vec<i64> = Vec::new();

        let mut i = 0;
        while i < all.len() {
            let mut j = i;
            while j + 1 < all.len() && all[j + 1].shared_key == all[i].shared_key {
                j += 1;
            }
            let group = &all[i..=j];
            let any_create = group.iter().any(|t| t.op == MirrorOp::Create);
            let mut newest = group[group.len() - 1].clone();
            for task in &group[..group.len() - 1] {
                superseded.push(task.id);
            }
            if any_create && newest.op != MirrorOp::Create {
                tx.execute(
                    "UPDATE mirror_outbox SET op = 'create' WHERE id = ?",
                    [newest.id],
                )?;
                newest.op = MirrorOp::Create;
            }
            keep.push(newest);
            i = j + 1;
        }

        for id in superseded {
            tx.execute(
                "UPDATE mirror_outbox SET status = 'superseded',
                     detail = 'coalesced under a newer local commit'
                 WHERE id = ?",
                [id],
            )?;
        }

        for task in &keep {
            tx.execute(
                "UPDATE mirror_outbox SET status = 'inflight' WHERE id = ?",
                [task.id],
            )?;
        }

        tx.commit()?;
        Ok(keep)
    }

    /// Record a task's terminal state.
    pub fn mark_task(&self, id: i64, status: &str, detail: Option<&str>) -> DbResult<()> {
        self.conn.execute(
            "UPDATE mirror_outbox SET status = ?2, detail = ?3 WHERE id = ?1",
            params![id, status, detail],
        )?;
        Ok(())
    }

    /// Status and detail of one task, for observability and tests.
    pub fn task_state(&self, id: i64) -> DbResult<Option<(String, Option<String>)>> {
        self.conn
            .query_row(
                "SELECT status, detail FROM mirror_outbox WHERE id = ?",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Number of tasks still waiting for dispatch.
    pub fn queued_task_count(&self) -> DbResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM mirror_outbox WHERE status = 'queued'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Drop any still-queued work for an entity (used on administrative
    /// delete).
    pub fn supersede_queued_for_key(&self, shared_key: &str) -> DbResult<usize> {
        let rows = self.conn.execute(
            "UPDATE mirror_outbox SET status = 'superseded', detail = 'entity deleted locally'
             WHERE shared_key = ? AND status = 'queued'",
            [shared_key],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn enqueue(db: &Database, key: &str, op: MirrorOp, version: i64) -> i64 {
        enqueue_stmt(db.conn(), key, op, "{}", version).unwrap()
    }

    #[test]
    fn test_drain_single_task() {
        let mut db = setup_db();
        let id = enqueue(&db, "k1", MirrorOp::Create, 1);

        let tasks = db.drain_queued().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, id);
        assert_eq!(tasks[0].op, MirrorOp::Create);

        // Drained means handed off, not still available
        assert_eq!(db.queued_task_count().unwrap(), 0);
        let (status, _) = db.task_state(id).unwrap().unwrap();
        assert_eq!(status, "inflight");

        db.mark_task(id, "applied", None).unwrap();
        let (status, _) = db.task_state(id).unwrap().unwrap();
        assert_eq!(status, "applied");
    }

    #[test]
    fn test_drained_task_is_handed_out_only_once() {
        let mut db = setup_db();
        let id = enqueue(&db, "k1", MirrorOp::Create, 1);

        let first = db.drain_queued().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, id);

        // A second drain before the task is marked must come back empty,
        // otherwise two flushing threads would both mirror the same commit.
        let second = db.drain_queued().unwrap();
        assert!(second.is_empty(), "task {id} drained twice: {second:?}");
    }

    #[test]
    fn test_drain_coalesces_to_newest_version() {
        let mut db = setup_db();
        let old = enqueue(&db, "k1", MirrorOp::Update, 2);
        let new = enqueue(&db, "k1", MirrorOp::Update, 3);
        let other = enqueue(&db, "k2", MirrorOp::Update, 1);

        let tasks = db.drain_queued().unwrap();
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert!(ids.contains(&new));
        assert!(ids.contains(&other));
        assert!(!ids.contains(&old));

        let (status, detail) = db.task_state(old).unwrap().unwrap();
        assert_eq!(status, "superseded");
        assert!(detail.unwrap().contains("newer local commit"));
    }

    #[test]
    fn test_drain_promotes_create_over_later_update() {
        let mut db = setup_db();
        let create = enqueue(&db, "k1", MirrorOp::Create, 1);
        let update = enqueue(&db, "k1", MirrorOp::Update, 2);

        let tasks = db.drain_queued().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, update);
        // Promoted: the external record does not exist yet
        assert_eq!(tasks[0].op, MirrorOp::Create);

        let (status, _) = db.task_state(create).unwrap().unwrap();
        assert_eq!(status, "superseded");
    }

    #[test]
    fn test_supersede_queued_for_key() {
        let mut db = setup_db();
        enqueue(&db, "k1", MirrorOp::Create, 1);
        enqueue(&db, "k2", MirrorOp::Create, 1);

        assert_eq!(db.supersede_queued_for_key("k1").unwrap(), 1);
        let tasks = db.drain_queued().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].shared_key, "k2");
    }
}
