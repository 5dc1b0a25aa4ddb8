// crates/hardstop-store-sqlite/src/migrations.rs
// ============================================================================
// Module: Migration Registry
// Description: Numbered, idempotent, additive-only schema migrations.
// Purpose: Evolve the artifact store without ever dropping a column.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! The schema evolves through a numbered migration list with a persisted
//! `schema_version`. Each migration is idempotent and append-only: new
//! tables, new columns, new indexes. Dropping columns is forbidden; a
//! required column that goes missing is schema drift, surfaced as a fatal
//! finding by the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;

use crate::store::SqliteStoreError;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Current schema version: the highest migration number in the registry.
pub const SCHEMA_VERSION: i64 = 2;

/// One numbered migration.
struct Migration {
    /// Migration number (1-based, strictly increasing).
    version: i64,
    /// Statements executed in order inside one transaction.
    statements: &'static [&'static str],
}

/// The full migration registry, in version order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS raw_items (
                raw_item_id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                canonical_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                status TEXT NOT NULL,
                fetched_at_utc TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                UNIQUE (source_id, canonical_id),
                UNIQUE (content_hash)
            )",
            "CREATE INDEX IF NOT EXISTS idx_raw_items_ingest
                ON raw_items (fetched_at_utc, raw_item_id)",
            "CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                suppressed INTEGER NOT NULL,
                primary_rule_id TEXT,
                recorded_at_utc TEXT NOT NULL,
                payload_json TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_events_suppressed
                ON events (suppressed, recorded_at_utc)",
            "CREATE TABLE IF NOT EXISTS alerts (
                alert_id TEXT PRIMARY KEY,
                correlation_key TEXT NOT NULL,
                first_seen_utc TEXT NOT NULL,
                last_seen_utc TEXT NOT NULL,
                payload_json TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alerts_window
                ON alerts (correlation_key, last_seen_utc)",
            "CREATE INDEX IF NOT EXISTS idx_alerts_seen
                ON alerts (last_seen_utc, first_seen_utc)",
            "CREATE TABLE IF NOT EXISTS source_runs (
                run_group_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                source_id TEXT NOT NULL,
                status TEXT NOT NULL,
                run_at_utc TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                UNIQUE (run_group_id, phase, source_id)
            )",
            "CREATE INDEX IF NOT EXISTS idx_source_runs_recent
                ON source_runs (source_id, phase, run_at_utc)",
            "CREATE TABLE IF NOT EXISTS incident_evidence (
                artifact_id TEXT PRIMARY KEY,
                alert_id TEXT NOT NULL,
                artifact_hash TEXT NOT NULL,
                payload_json TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_evidence_alert
                ON incident_evidence (alert_id, artifact_id)",
            "CREATE TABLE IF NOT EXISTS run_records (
                run_id TEXT PRIMARY KEY,
                run_group_id TEXT NOT NULL,
                operator_id TEXT NOT NULL,
                started_at_utc TEXT NOT NULL,
                payload_json TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_run_records_group
                ON run_records (run_group_id, started_at_utc)",
        ],
    },
    Migration {
        version: 2,
        statements: &[
            // Additive: tier column on events for brief tier counts without
            // payload parsing. Nullable so version-1 rows stay valid.
            "ALTER TABLE events ADD COLUMN tier TEXT",
        ],
    },
];

/// Columns every deployment requires; absence is fatal schema drift.
pub(crate) const REQUIRED_COLUMNS: &[(&str, &str)] = &[
    ("raw_items", "content_hash"),
    ("raw_items", "canonical_id"),
    ("events", "payload_json"),
    ("alerts", "correlation_key"),
    ("alerts", "last_seen_utc"),
    ("source_runs", "run_group_id"),
    ("incident_evidence", "artifact_hash"),
    ("run_records", "run_id"),
];

// ============================================================================
// SECTION: Application
// ============================================================================

/// Applies every pending migration inside one transaction each.
///
/// Safe to run on every startup: versions at or below the persisted value
/// are skipped, and each statement is itself idempotent.
pub(crate) fn apply(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let current = current_version(connection)?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let tx = connection
            .transaction()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for statement in migration.statements {
            if let Err(err) = tx.execute_batch(statement) {
                // ALTER TABLE ADD COLUMN is not IF NOT EXISTS; re-running on a
                // database that already carries the column must stay a no-op.
                if !err.to_string().contains("duplicate column name") {
                    return Err(SqliteStoreError::Db(err.to_string()));
                }
            }
        }
        tx.execute("DELETE FROM schema_version", [])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [migration.version])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

/// Reads the persisted schema version (0 when the table is absent or empty).
pub(crate) fn current_version(connection: &Connection) -> Result<i64, SqliteStoreError> {
    let has_table: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if has_table == 0 {
        return Ok(0);
    }
    connection
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Verifies every required column is present, returning the missing pairs.
pub(crate) fn missing_required_columns(
    connection: &Connection,
) -> Result<Vec<(String, String)>, SqliteStoreError> {
    let mut missing = Vec::new();
    for (table, column) in REQUIRED_COLUMNS {
        let query = format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?1");
        let present: i64 = connection
            .query_row(&query, [column], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if present == 0 {
            missing.push(((*table).to_string(), (*column).to_string()));
        }
    }
    Ok(missing)
}
