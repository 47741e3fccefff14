//! Intake record database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{IntakePatch, IntakeRecord};

const INTAKE_COLUMNS: &str = "id, shared_key, subject_id, first_name, last_name, employer_code, \
     phone, email, sex, age, diabetes, hypertension, hearing_loss, vision_impairment, \
     family_diabetes, family_hypertension, family_cancer, observations, created_at, updated_at";

fn row_to_intake(row: &Row<'_>) -> rusqlite::Result<IntakeRecord> {
    Ok(IntakeRecord {
        id: row.get(0)?,
        shared_key: row.get(1)?,
        subject_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        employer_code: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
        sex: row.get(8)?,
        age: row.get(9)?,
        diabetes: row.get(10)?,
        hypertension: row.get(11)?,
        hearing_loss: row.get(12)?,
        vision_impairment: row.get(13)?,
        family_diabetes: row.get(14)?,
        family_hypertension: row.get(15)?,
        family_cancer: row.get(16)?,
        observations: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

impl Database {
    /// Insert a new intake record, returning its assigned id.
    pub fn insert_intake(&self, record: &IntakeRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO intake_records (
                shared_key, subject_id, first_name, last_name, employer_code,
                phone, email, sex, age, diabetes, hypertension, hearing_loss,
                vision_impairment, family_diabetes, family_hypertension,
                family_cancer, observations, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                record.shared_key,
                record.subject_id,
                record.first_name,
                record.last_name,
                record.employer_code,
                record.phone,
                record.email,
                record.sex,
                record.age,
                record.diabetes,
                record.hypertension,
                record.hearing_loss,
                record.vision_impairment,
                record.family_diabetes,
                record.family_hypertension,
                record.family_cancer,
                record.observations,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get an intake record by local id.
    pub fn get_intake(&self, id: i64) -> DbResult<Option<IntakeRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {INTAKE_COLUMNS} FROM intake_records WHERE id = ?"),
                [id],
                row_to_intake,
            )
            .optional()
            .map_err(Into::into)
    }

    /// COALESCE-style partial update. Returns false when no such record
    /// exists.
    pub fn update_intake(&self, id: i64, patch: &IntakePatch) -> DbResult<bool> {
        let rows = self.conn.execute(
            r#"
            UPDATE intake_records SET
                shared_key = COALESCE(?2, shared_key),
                first_name = COALESCE(?3, first_name),
                last_name = COALESCE(?4, last_name),
                employer_code = COALESCE(?5, employer_code),
                phone = COALESCE(?6, phone),
                email = COALESCE(?7, email),
                sex = COALESCE(?8, sex),
                age = COALESCE(?9, age),
                diabetes = COALESCE(?10, diabetes),
                hypertension = COALESCE(?11, hypertension),
                hearing_loss = COALESCE(?12, hearing_loss),
                vision_impairment = COALESCE(?13, vision_impairment),
                family_diabetes = COALESCE(?14, family_diabetes),
                family_hypertension = COALESCE(?15, family_hypertension),
                family_cancer = COALESCE(?16, family_cancer),
                observations = COALESCE(?17, observations),
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                id,
                patch.shared_key,
                patch.first_name,
                patch.last_name,
                patch.employer_code,
                patch.phone,
                patch.email,
                patch.sex,
                patch.age,
                patch.diabetes,
                patch.hypertension,
                patch.hearing_loss,
                patch.vision_impairment,
                patch.family_diabetes,
                patch.family_hypertension,
                patch.family_cancer,
                patch.observations,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Whether any intake record links to an order by shared key or subject
    /// identity number. Used by the duplicate check.
    pub fn has_intake_for(&self, shared_key: &str, subject_id: &str) -> DbResult<bool> {
        let linked: bool = self.conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM intake_records WHERE shared_key = ?1 OR subject_id = ?2
             )",
            [shared_key, subject_id],
            |row| row.get(0),
        )?;
        Ok(linked)
    }

    /// Delete an intake record by id.
    pub fn delete_intake(&self, id: i64) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM intake_records WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    /// Delete intake records linked to an order. Returns how many rows went.
    pub fn delete_intake_by_shared_key(&self, shared_key: &str) -> DbResult<usize> {
        let rows = self
            .conn
            .execute("DELETE FROM intake_records WHERE shared_key = ?", [shared_key])?;
        Ok(rows)
    }
}
