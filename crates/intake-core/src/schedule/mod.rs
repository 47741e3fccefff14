//! Provider scheduling: availability lookup and automatic assignment.
//!
//! Pipeline: weekday from date → active windows for (weekday, modality) →
//! exclusion policy → window membership → double-booking check → first
//! candidate by name.

mod assign;

pub use assign::*;

use thiserror::Error;

use crate::db::Database;
use crate::models::AvailabilityWindow;

/// Scheduling errors.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("no provider available for the requested slot")]
    NoProviderAvailable,

    #[error("invalid slot: {0}")]
    InvalidSlot(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Pure lookup over the weekly availability table.
pub struct AvailabilityIndex<'a> {
    db: &'a Database,
}

impl<'a> AvailabilityIndex<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The active windows a provider has for a weekday/modality.
    pub fn windows_for(
        &self,
        provider: &str,
        weekday: u8,
        modality: &str,
    ) -> ScheduleResult<Vec<AvailabilityWindow>> {
        Ok(self
            .db
            .window_for(provider, weekday, modality)?
            .into_iter()
            .collect())
    }

    /// All providers' active windows for a weekday/modality, provider-name
    /// ascending.
    pub fn active_windows(
        &self,
        weekday: u8,
        modality: &str,
    ) -> ScheduleResult<Vec<AvailabilityWindow>> {
        Ok(self.db.active_windows(weekday, modality)?)
    }
}

/// Exclusion policy: administrative accounts that must never be
/// auto-assigned, matched case-insensitively as substrings of the provider's
/// full name. The list comes from configuration, never from code.
pub fn is_excluded(provider: &str, excluded: &[String]) -> bool {
    let name = provider.to_lowercase();
    excluded
        .iter()
        .any(|needle| !needle.is_empty() && name.contains(&needle.to_lowercase()))
}
