//! Table and index definitions for the snapshot store.

use crate::Result;
use rusqlite::Connection;

/// Tables, uniqueness constraints and the indexes the read queries rely on.
///
/// Dates are `YYYY-MM-DD` text and timestamps RFC 3339 UTC text, so lexical
/// comparison matches chronological order.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS models (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    author TEXT,
    pipeline_tag TEXT,
    first_seen_at TEXT NOT NULL,
    paper_id TEXT,
    benchmark_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_models_first_seen
    ON models(first_seen_at);

CREATE TABLE IF NOT EXISTS model_snapshots (
    model_id TEXT NOT NULL REFERENCES models(id) ON DELETE CASCADE,
    snapshot_date TEXT NOT NULL,
    downloads_30d INTEGER,
    likes INTEGER NOT NULL DEFAULT 0,
    pipeline_tag TEXT,
    tags_json TEXT NOT NULL DEFAULT '[]',
    business_score REAL,
    business_summary TEXT,
    UNIQUE (model_id, snapshot_date)
);

-- Snapshots for a model ordered by date (history, trending first/last).
CREATE INDEX IF NOT EXISTS idx_snapshots_model_date
    ON model_snapshots(model_id, snapshot_date DESC);

-- Window scans by date (trending).
CREATE INDEX IF NOT EXISTS idx_snapshots_date
    ON model_snapshots(snapshot_date);

CREATE TABLE IF NOT EXISTS papers (
    arxiv_id TEXT PRIMARY KEY,
    title TEXT,
    abstract TEXT,
    submitted_at TEXT,
    authors_json TEXT NOT NULL DEFAULT '[]',
    category TEXT,
    pwc_sota_flag INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_papers_submitted
    ON papers(submitted_at);

CREATE TABLE IF NOT EXISTS arena_rankings (
    snapshot_date TEXT NOT NULL,
    model_name TEXT NOT NULL,
    rank INTEGER NOT NULL,
    elo_score INTEGER NOT NULL,
    UNIQUE (snapshot_date, model_name)
);

-- Latest-date lookup and per-date listing by rank.
CREATE INDEX IF NOT EXISTS idx_arena_date_rank
    ON arena_rankings(snapshot_date, rank);
"#;

/// Configure a connection: foreign keys on, WAL journal, busy timeout.
pub(crate) fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys=ON;
        PRAGMA journal_mode=WAL;
        PRAGMA busy_timeout=30000;
        PRAGMA synchronous=NORMAL;
        PRAGMA temp_store=MEMORY;
        ",
    )?;
    Ok(())
}

/// Ensure all tables and indexes exist.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
