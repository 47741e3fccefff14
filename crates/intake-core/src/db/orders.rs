//! Order database operations.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{classify_sqlite, Database, DbResult};
use crate::models::{Order, OrderFilter, OrderPatch, OrderStatus};

const ORDER_COLUMNS: &str = "shared_key, subject_id, first_name, last_name, employer_code, \
     phone, email, sex, age, exam_type, provider, scheduled_date, scheduled_time, \
     status, observations, recommendations, version, created_at, updated_at";

pub(crate) fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        shared_key: row.get(0)?,
        subject_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        employer_code: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        sex: row.get(7)?,
        age: row.get(8)?,
        exam_type: row.get(9)?,
        provider: row.get(10)?,
        scheduled_date: row.get(11)?,
        scheduled_time: row.get(12)?,
        status: row.get(13)?,
        observations: row.get(14)?,
        recommendations: row.get(15)?,
        version: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

pub(crate) fn insert_order_stmt(conn: &Connection, order: &Order) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO orders (
            shared_key, subject_id, first_name, last_name, employer_code,
            phone, email, sex, age, exam_type, provider, scheduled_date,
            scheduled_time, status, observations, recommendations, version,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
        params![
            order.shared_key,
            order.subject_id,
            order.first_name,
            order.last_name,
            order.employer_code,
            order.phone,
            order.email,
            order.sex,
            order.age,
            order.exam_type,
            order.provider,
            order.scheduled_date,
            order.scheduled_time,
            order.status,
            order.observations,
            order.recommendations,
            order.version,
            order.created_at,
            order.updated_at,
        ],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

/// COALESCE-style partial update: absent patch fields keep their stored
/// value. Bumps the commit version. Returns the number of rows touched.
pub(crate) fn update_order_stmt(
    conn: &Connection,
    shared_key: &str,
    patch: &OrderPatch,
) -> DbResult<usize> {
    let rows = conn
        .execute(
            r#"
            UPDATE orders SET
                first_name = COALESCE(?2, first_name),
                last_name = COALESCE(?3, last_name),
                employer_code = COALESCE(?4, employer_code),
                phone = COALESCE(?5, phone),
                email = COALESCE(?6, email),
                sex = COALESCE(?7, sex),
                age = COALESCE(?8, age),
                exam_type = COALESCE(?9, exam_type),
                provider = COALESCE(?10, provider),
                scheduled_date = COALESCE(?11, scheduled_date),
                scheduled_time = COALESCE(?12, scheduled_time),
                status = COALESCE(?13, status),
                observations = COALESCE(?14, observations),
                recommendations = COALESCE(?15, recommendations),
                version = version + 1,
                updated_at = datetime('now')
            WHERE shared_key = ?1
            "#,
            params![
                shared_key,
                patch.first_name,
                patch.last_name,
                patch.employer_code,
                patch.phone,
                patch.email,
                patch.sex,
                patch.age,
                patch.exam_type,
                patch.provider,
                patch.scheduled_date,
                patch.scheduled_time,
                patch.status,
                patch.observations,
                patch.recommendations,
            ],
        )
        .map_err(classify_sqlite)?;
    Ok(rows)
}

pub(crate) fn get_order_stmt(conn: &Connection, shared_key: &str) -> DbResult<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE shared_key = ?"),
        [shared_key],
        row_to_order,
    )
    .optional()
    .map_err(Into::into)
}

impl Database {
    /// Insert a new order. Violating the single-PENDING-per-subject index
    /// surfaces as `DbError::Constraint`.
    pub fn insert_order(&self, order: &Order) -> DbResult<()> {
        insert_order_stmt(&self.conn, order)
    }

    /// Get an order by shared key.
    pub fn get_order(&self, shared_key: &str) -> DbResult<Option<Order>> {
        get_order_stmt(&self.conn, shared_key)
    }

    /// Apply a partial update. Returns false when no such order exists.
    pub fn update_order(&self, shared_key: &str, patch: &OrderPatch) -> DbResult<bool> {
        Ok(update_order_stmt(&self.conn, shared_key, patch)? > 0)
    }

    /// The open (PENDING) order for a subject, if any. When the uniqueness
    /// invariant has been violated upstream, the most recently created row
    /// wins.
    pub fn find_pending_by_subject(&self, subject_id: &str) -> DbResult<Option<Order>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders
                     WHERE subject_id = ? AND status = 'PENDING'
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                [subject_id],
                row_to_order,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The most recent ATTENDED order for a subject, if any.
    pub fn find_latest_attended(&self, subject_id: &str) -> DbResult<Option<Order>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ORDER_COLUMNS} FROM orders
                     WHERE subject_id = ? AND status = 'ATTENDED'
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                [subject_id],
                row_to_order,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Whether any order already occupies this exact (provider, date, time)
    /// tuple.
    pub fn is_slot_booked(
        &self,
        provider: &str,
        scheduled_date: &str,
        scheduled_time: &str,
    ) -> DbResult<bool> {
        let booked: bool = self.conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM orders
                 WHERE provider = ? AND scheduled_date = ? AND scheduled_time = ?
             )",
            [provider, scheduled_date, scheduled_time],
            |row| row.get(0),
        )?;
        Ok(booked)
    }

    /// List orders matching a filter, newest first.
    pub fn list_orders(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(subject_id) = &filter.subject_id {
            clauses.push("subject_id = ?");
            args.push(subject_id.clone().into());
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            args.push(status.as_str().to_string().into());
        }
        if let Some(date) = &filter.scheduled_date {
            clauses.push("scheduled_date = ?");
            args.push(date.clone().into());
        }
        if let Some(provider) = &filter.provider {
            clauses.push("provider = ?");
            args.push(provider.clone().into());
        }
        if let Some(name) = &filter.name_like {
            clauses.push("(first_name || ' ' || last_name) LIKE ?");
            args.push(format!("%{name}%").into());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{where_clause} ORDER BY created_at DESC, rowid DESC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_order)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete an order. Returns false when no such order exists.
    pub fn delete_order(&self, shared_key: &str) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM orders WHERE shared_key = ?", [shared_key])?;
        Ok(rows > 0)
    }
}
