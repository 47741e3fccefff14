//! Provider availability database operations.

use rusqlite::{params, Row};

use super::{Database, DbResult};
use crate::models::AvailabilityWindow;

const WINDOW_COLUMNS: &str =
    "provider, weekday, modality, start_time, end_time, slot_minutes, active";

fn row_to_window(row: &Row<'_>) -> rusqlite::Result<AvailabilityWindow> {
    Ok(AvailabilityWindow {
        provider: row.get(0)?,
        weekday: row.get(1)?,
        modality: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        slot_minutes: row.get(5)?,
        active: row.get(6)?,
    })
}

impl Database {
    /// Insert or replace the window for a (provider, weekday, modality)
    /// tuple. The uniqueness constraint keeps it to one window per tuple.
    pub fn upsert_window(&self, window: &AvailabilityWindow) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO provider_availability (
                provider, weekday, modality, start_time, end_time, slot_minutes, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(provider, weekday, modality) DO UPDATE SET
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                slot_minutes = excluded.slot_minutes,
                active = excluded.active
            "#,
            params![
                window.provider,
                window.weekday,
                window.modality,
                window.start_time,
                window.end_time,
                window.slot_minutes,
                window.active,
            ],
        )?;
        Ok(())
    }

    /// All active windows for a weekday/modality, provider-name ascending.
    pub fn active_windows(&self, weekday: u8, modality: &str) -> DbResult<Vec<AvailabilityWindow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WINDOW_COLUMNS} FROM provider_availability
             WHERE weekday = ?1 AND modality = ?2 AND active = 1
             ORDER BY provider ASC"
        ))?;
        let rows = stmt.query_map(params![weekday, modality], row_to_window)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The active window for one provider on a weekday/modality, if any.
    pub fn window_for(
        &self,
        provider: &str,
        weekday: u8,
        modality: &str,
    ) -> DbResult<Option<AvailabilityWindow>> {
        use rusqlite::OptionalExtension;
        self.conn
            .query_row(
                &format!(
                    "SELECT {WINDOW_COLUMNS} FROM provider_availability
                     WHERE provider = ?1 AND weekday = ?2 AND modality = ?3 AND active = 1"
                ),
                params![provider, weekday, modality],
                row_to_window,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Deactivate the window for a tuple. Returns false when none exists.
    pub fn deactivate_window(&self, provider: &str, weekday: u8, modality: &str) -> DbResult<bool> {
        let rows = self.conn.execute(
            "UPDATE provider_availability SET active = 0
             WHERE provider = ?1 AND weekday = ?2 AND modality = ?3",
            params![provider, weekday, modality],
        )?;
        Ok(rows > 0)
    }
}
