//! SQLite schema definition.

/// Complete database schema for the local store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Orders (appointment/history records, shared with the external store)
-- ============================================================================

CREATE TABLE IF NOT EXISTS orders (
    shared_key TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    employer_code TEXT,
    phone TEXT,
    email TEXT,
    sex TEXT,
    age INTEGER,
    exam_type TEXT NOT NULL,
    provider TEXT,
    scheduled_date TEXT NOT NULL,                 -- YYYY-MM-DD
    scheduled_time TEXT NOT NULL,                 -- HH:MM
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'ATTENDED')),
    observations TEXT,
    recommendations TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- At most one PENDING order per subject, enforced by the store so a
-- check-then-insert race cannot produce two open orders.
CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_one_pending
    ON orders(subject_id) WHERE status = 'PENDING';

CREATE INDEX IF NOT EXISTS idx_orders_subject ON orders(subject_id);
CREATE INDEX IF NOT EXISTS idx_orders_booking ON orders(provider, scheduled_date, scheduled_time);

-- ============================================================================
-- Intake Records (questionnaire submissions, locally authoritative)
-- ============================================================================

CREATE TABLE IF NOT EXISTS intake_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    shared_key TEXT,                              -- best-effort order linkage, no FK
    subject_id TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    employer_code TEXT,
    phone TEXT,
    email TEXT,
    sex TEXT,
    age INTEGER,
    diabetes INTEGER NOT NULL DEFAULT 0,
    hypertension INTEGER NOT NULL DEFAULT 0,
    hearing_loss INTEGER NOT NULL DEFAULT 0,
    vision_impairment INTEGER NOT NULL DEFAULT 0,
    family_diabetes INTEGER NOT NULL DEFAULT 0,
    family_hypertension INTEGER NOT NULL DEFAULT 0,
    family_cancer INTEGER NOT NULL DEFAULT 0,
    observations TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_intake_subject ON intake_records(subject_id);
CREATE INDEX IF NOT EXISTS idx_intake_shared_key ON intake_records(shared_key);

-- ============================================================================
-- Provider Availability (weekly windows)
-- ============================================================================

CREATE TABLE IF NOT EXISTS provider_availability (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    weekday INTEGER NOT NULL CHECK (weekday BETWEEN 0 AND 6),   -- 0 = Monday
    modality TEXT NOT NULL,
    start_time TEXT NOT NULL,                     -- HH:MM inclusive
    end_time TEXT NOT NULL,                       -- HH:MM exclusive
    slot_minutes INTEGER NOT NULL DEFAULT 20,
    active INTEGER NOT NULL DEFAULT 1,
    UNIQUE (provider, weekday, modality)
);

CREATE INDEX IF NOT EXISTS idx_availability_lookup ON provider_availability(weekday, modality, active);

-- ============================================================================
-- Mirror Outbox (one task per local commit, drained by the dispatcher)
-- ============================================================================

CREATE TABLE IF NOT EXISTS mirror_outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    shared_key TEXT NOT NULL,
    op TEXT NOT NULL CHECK (op IN ('create', 'update')),
    payload TEXT NOT NULL,                        -- external-form JSON
    version INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'queued'
        CHECK (status IN ('queued', 'inflight', 'applied', 'failed', 'superseded')),
    detail TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_outbox_queued ON mirror_outbox(status, shared_key, version);
"#;
