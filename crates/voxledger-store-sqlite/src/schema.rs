//! SQL schema for the voxledger SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS hospitals (
    hospital_id     TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    token_balance   INTEGER NOT NULL DEFAULT 0,   -- may go negative
    contract_status TEXT NOT NULL DEFAULT 'active',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id TEXT PRIMARY KEY,
    hospital_id TEXT NOT NULL REFERENCES hospitals(hospital_id),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS call_sessions (
    call_session_id       TEXT PRIMARY KEY,
    campaign_id           TEXT NOT NULL REFERENCES campaigns(campaign_id),
    status                TEXT NOT NULL DEFAULT 'queued',
    call_duration_seconds INTEGER,
    billed                INTEGER NOT NULL DEFAULT 0,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id   TEXT PRIMARY KEY,
    hospital_id      TEXT NOT NULL REFERENCES hospitals(hospital_id),
    amount           INTEGER NOT NULL,            -- negative = debit
    transaction_type TEXT NOT NULL,               -- 'call_usage' | 'recharge'
    reference_id     TEXT,
    created_at       TEXT NOT NULL
);

-- One debit per call session, ever.
CREATE UNIQUE INDEX IF NOT EXISTS transactions_call_usage_uniq
    ON transactions(reference_id)
    WHERE transaction_type = 'call_usage';

CREATE TABLE IF NOT EXISTS template_versions (
    template_version_id TEXT PRIMARY KEY,
    template_id         TEXT NOT NULL,
    version             INTEGER NOT NULL,
    questions_json      TEXT NOT NULL,
    is_published        INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    UNIQUE (template_id, version)
);

CREATE UNIQUE INDEX IF NOT EXISTS template_versions_published_uniq
    ON template_versions(template_id)
    WHERE is_published = 1;

CREATE TABLE IF NOT EXISTS template_responses (
    response_id     TEXT PRIMARY KEY,
    template_id     TEXT NOT NULL,
    hospital_id     TEXT NOT NULL REFERENCES hospitals(hospital_id),
    session_id      TEXT,
    answers_json    TEXT NOT NULL,
    response_hash   TEXT NOT NULL UNIQUE,
    completion_rate REAL NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS campaigns_hospital_idx    ON campaigns(hospital_id);
CREATE INDEX IF NOT EXISTS sessions_campaign_idx     ON call_sessions(campaign_id);
CREATE INDEX IF NOT EXISTS transactions_hospital_idx ON transactions(hospital_id);
CREATE INDEX IF NOT EXISTS responses_template_idx    ON template_responses(template_id);

PRAGMA user_version = 1;
";
