//! Client for the external record store.
//!
//! The external store is a separate, independently-authoritative system
//! reachable over HTTP with JSON payloads. Records there are correlated with
//! local orders through a shared key, but carry their own internal identity
//! and their own (Spanish) field naming.
//!
//! Three operations are consumed by the reconciliation engine:
//!
//! - `find_by_shared_key`: resolve a record (and its internal id) by shared key
//! - `create`: insert a new record, shared key included up front
//! - `update_by_internal_id`: update an existing record by its internal id

pub mod client;
pub mod wire;

pub use client::*;
pub use wire::*;

use thiserror::Error;

/// Errors talking to the external store.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("external store returned status {code}")]
    Status { code: u16 },

    #[error("external store unavailable: {0}")]
    Unavailable(String),
}

pub type MirrorResult<T> = Result<T, MirrorError>;

/// Operations the reconciler needs from the external store.
///
/// `find_by_internal_id` is implicit: the find response carries the full
/// record, internal id included.
pub trait ExternalStore: Send + Sync {
    /// Look up a record by the shared key. `Ok(None)` means the key is
    /// unknown to the external store, which is distinct from a transport
    /// failure.
    fn find_by_shared_key(&self, shared_key: &str) -> MirrorResult<Option<ExternalOrder>>;

    /// Insert a new record. The shared key travels inside the payload, so no
    /// prior lookup is needed.
    fn create(&self, payload: &ExternalOrderPayload) -> MirrorResult<ExternalOrder>;

    /// Update an existing record by its internal id.
    fn update_by_internal_id(
        &self,
        internal_id: &str,
        payload: &ExternalOrderPayload,
    ) -> MirrorResult<()>;
}
