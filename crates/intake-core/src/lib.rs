//! Medical intake and appointment reconciliation engine.
//!
//! Orders (appointments plus attendance history) live in two stores: a local
//! SQLite database that is the transactional source of truth, and an external
//! HTTP/JSON store kept eventually consistent through a best-effort mirror.
//! Intake questionnaires and provider availability are local-only.
//!
//! # Architecture
//!
//! ```text
//!                      ┌─────────────────┐
//!                      │  IntakeService  │   validate → conflict → assign
//!                      └────────┬────────┘
//!            ┌─────────────┬────┴─────┬──────────────┐
//!            ▼             ▼          ▼              ▼
//!     ConflictDetector  Assignment  Reconciler    notify
//!            │          Resolver      │ commit + outbox (one tx)
//!            └─────────────┴──────────┤
//!                                     ▼
//!                      ┌─────────────────┐   drain / coalesce
//!                      │  local SQLite   │──────────┐
//!                      └─────────────────┘          ▼
//!                                          ┌─────────────────┐
//!                                          │  ExternalStore  │  HTTP/JSON
//!                                          └─────────────────┘
//! ```
//!
//! The local commit always decides an operation's result. Mirror failures
//! surface as a secondary [`reconcile::MirrorStatus`], never as errors.

pub mod config;
pub mod conflict;
pub mod db;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod schedule;
pub mod service;

pub use config::{CoreConfig, ExternalConfig};
pub use conflict::{ConflictDetector, DuplicateCheck};
pub use db::{Database, DbError, DbResult};
pub use models::{
    AvailabilityWindow, IntakePatch, IntakeRecord, Order, OrderFilter, OrderPatch, OrderStatus,
    OrderSummary,
};
pub use reconcile::{MirrorHandle, MirrorStatus, Reconciler};
pub use schedule::{AssignmentResolver, AvailabilityIndex, ScheduleError};
pub use service::{
    ApiResponse, AttendRequest, CommitOutcome, CreateOrderRequest, IntakeRequest, IntakeService,
};

use thiserror::Error;

use crate::schedule::ScheduleError as Sched;

/// Top-level operation errors, with transport status mapping.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("subject already has an open order ({})", .order.shared_key)]
    Duplicate {
        order: OrderSummary,
        has_linked_intake: bool,
    },

    #[error("no provider available for the requested slot")]
    NoProviderAvailable,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP-style status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::Duplicate { .. }
            | CoreError::NoProviderAvailable => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Store(_) | CoreError::Internal(_) => 500,
        }
    }
}

impl From<ScheduleError> for CoreError {
    fn from(err: ScheduleError) -> Self {
        match err {
            Sched::NoProviderAvailable => CoreError::NoProviderAvailable,
            Sched::InvalidSlot(detail) => CoreError::Validation(detail),
            Sched::Database(e) => CoreError::Store(e),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for CoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CoreError::Internal("store lock poisoned".into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
