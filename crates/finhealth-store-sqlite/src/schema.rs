//! SQL schema for the financial-health SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Bronze. Replaced one (ticker, statement) partition at a time.
CREATE TABLE IF NOT EXISTS raw_rows (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker         TEXT NOT NULL,
    period_end     TEXT NOT NULL,   -- YYYY-MM-DD
    period_type    TEXT NOT NULL,   -- 'annual' | 'quarterly'
    statement      TEXT NOT NULL,   -- 'income' | 'balance' | 'cashflow'
    field_name_raw TEXT NOT NULL,
    value          TEXT             -- provider text, NULL when absent
);

CREATE INDEX IF NOT EXISTS raw_rows_partition_idx ON raw_rows(ticker, statement);

-- Everything below is replaced wholesale on each pipeline run.
CREATE TABLE IF NOT EXISTS companies (
    ticker TEXT PRIMARY KEY,
    name   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS facts (
    ticker      TEXT NOT NULL,
    period_end  TEXT NOT NULL,
    period_type TEXT NOT NULL,
    field       TEXT NOT NULL,
    value       REAL,
    PRIMARY KEY (ticker, period_end, period_type, field)
);

CREATE TABLE IF NOT EXISTS kpis (
    ticker      TEXT NOT NULL,
    period_end  TEXT NOT NULL,
    period_type TEXT NOT NULL,
    kpi         TEXT NOT NULL,
    value       REAL,
    PRIMARY KEY (ticker, period_end, period_type, kpi)
);

CREATE TABLE IF NOT EXISTS scores (
    ticker      TEXT PRIMARY KEY,
    period_end  TEXT NOT NULL,
    period_type TEXT NOT NULL,
    composite   REAL NOT NULL CHECK (composite BETWEEN 0 AND 100),
    rating      TEXT NOT NULL,
    sub_scores  TEXT NOT NULL,   -- JSON object: category -> score
    notes       TEXT NOT NULL    -- JSON array of strings
);

CREATE TABLE IF NOT EXISTS score_failures (
    ticker TEXT PRIMARY KEY,
    reason TEXT NOT NULL
);

-- Run ledger. Append-only.
CREATE TABLE IF NOT EXISTS runs (
    run_id             TEXT PRIMARY KEY,
    started_at         TEXT NOT NULL,   -- RFC 3339 UTC
    finished_at        TEXT NOT NULL,
    vocabulary_version INTEGER NOT NULL,
    stats              TEXT NOT NULL,   -- JSON
    digests            TEXT NOT NULL    -- JSON
);

PRAGMA user_version = 1;
";
