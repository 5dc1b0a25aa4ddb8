// crates/hardstop-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Repository Implementation
// Description: Core repository traits on a mutex-guarded SQLite connection.
// Purpose: Persist artifacts durably with deterministic serialization.
// Dependencies: hardstop-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One SQLite database backs every repository. The connection is guarded by
//! a mutex; each operation runs inside a transaction with commit-or-rollback
//! on all exit paths. Structured columns store canonical JSON so identical
//! artifacts persist byte-identically; datetime columns store ISO 8601 `Z`
//! text so lexicographic comparison in SQL matches chronological order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use hardstop_core::Alert;
use hardstop_core::AlertId;
use hardstop_core::Event;
use hardstop_core::EventId;
use hardstop_core::IncidentEvidence;
use hardstop_core::RawItem;
use hardstop_core::RawItemId;
use hardstop_core::RawItemStatus;
use hardstop_core::RuleId;
use hardstop_core::RunPhase;
use hardstop_core::RunRecord;
use hardstop_core::SaveOutcome;
use hardstop_core::SourceId;
use hardstop_core::SourceRun;
use hardstop_core::StoreError;
use hardstop_core::SuppressedEventView;
use hardstop_core::SuppressionStage;
use hardstop_core::SuppressionStamp;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing::canonical_json_bytes;
use hardstop_core::interfaces::AlertStore;
use hardstop_core::interfaces::EventStore;
use hardstop_core::interfaces::EvidenceStore;
use hardstop_core::interfaces::RawItemStore;
use hardstop_core::interfaces::RunRecordStore;
use hardstop_core::interfaces::SourceRunStore;
use hardstop_core::runtime::status::SchemaFinding;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::migrations;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQLite store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw artifact payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored payload failed deserialization.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Required column missing.
    #[error("sqlite store schema drift: {0}")]
    SchemaDrift(String),
    /// Invalid store data or duplicate append.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::SchemaDrift(message) => Self::SchemaDrift(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed repository set.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Startup applies pending migrations and checks required columns.
#[derive(Clone)]
pub struct HardstopStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl HardstopStore {
    /// Opens (or creates) the store at a path and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn open(path: &Path) -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open(path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::initialize(connection)
    }

    /// Opens an in-memory store (tests and dry runs).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Self::initialize(connection)
    }

    /// Applies pragmas and migrations to a fresh connection.
    fn initialize(mut connection: Connection) -> Result<Self, SqliteStoreError> {
        connection
            .execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = FULL;
                 PRAGMA busy_timeout = 5000;",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        migrations::apply(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Reports schema-drift findings for the run-status evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the column check itself fails.
    pub fn schema_findings(&self) -> Result<Vec<SchemaFinding>, SqliteStoreError> {
        let guard = self.lock()?;
        let missing = migrations::missing_required_columns(&guard)?;
        Ok(missing
            .into_iter()
            .map(|(table, column)| SchemaFinding {
                column: format!("{table}.{column}"),
                required: true,
            })
            .collect())
    }

    /// Locks the connection, mapping poisoning to a store error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Serialization Helpers
// ============================================================================

/// Serializes a payload column canonically.
fn to_payload<T: Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    let bytes =
        canonical_json_bytes(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes a payload column.
fn from_payload<T: DeserializeOwned>(text: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(text).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

// ============================================================================
// SECTION: Raw Item Store
// ============================================================================

impl RawItemStore for HardstopStore {
    fn save(&self, item: &RawItem) -> Result<SaveOutcome, StoreError> {
        let mut guard = self.lock().map_err(StoreError::from)?;
        let tx = guard.transaction().map_err(|err| StoreError::Store(err.to_string()))?;

        let by_canonical: Option<String> = tx
            .query_row(
                "SELECT raw_item_id FROM raw_items WHERE source_id = ?1 AND canonical_id = ?2",
                params![item.source_id.as_str(), item.canonical_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        if let Some(existing) = by_canonical {
            tx.commit().map_err(|err| StoreError::Store(err.to_string()))?;
            return Ok(SaveOutcome::Duplicate {
                raw_item_id: RawItemId::new(existing),
            });
        }

        let by_hash: Option<String> = tx
            .query_row(
                "SELECT raw_item_id FROM raw_items WHERE content_hash = ?1",
                params![item.content_hash.value],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        if let Some(existing) = by_hash {
            tx.commit().map_err(|err| StoreError::Store(err.to_string()))?;
            return Ok(SaveOutcome::Duplicate {
                raw_item_id: RawItemId::new(existing),
            });
        }

        let payload = to_payload(item).map_err(StoreError::from)?;
        tx.execute(
            "INSERT INTO raw_items
                (raw_item_id, source_id, canonical_id, content_hash, status,
                 fetched_at_utc, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                item.raw_item_id.as_str(),
                item.source_id.as_str(),
                item.canonical_id,
                item.content_hash.value,
                item.status.as_str(),
                item.fetched_at_utc.render(),
                payload,
            ],
        )
        .map_err(|err| StoreError::Store(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(SaveOutcome::Created {
            raw_item_id: item.raw_item_id.clone(),
        })
    }

    fn list_for_ingest(
        &self,
        since: Option<UtcTimestamp>,
        include_suppressed: bool,
    ) -> Result<Vec<RawItem>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let floor = since.map_or_else(String::new, UtcTimestamp::render);
        let statuses = if include_suppressed {
            "('new', 'suppressed')"
        } else {
            "('new')"
        };
        let query = format!(
            "SELECT payload_json FROM raw_items
             WHERE status IN {statuses} AND fetched_at_utc >= ?1
             ORDER BY fetched_at_utc ASC, raw_item_id ASC"
        );
        let mut statement =
            guard.prepare(&query).map_err(|err| StoreError::Store(err.to_string()))?;
        let rows = statement
            .query_map(params![floor], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut items = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::Store(err.to_string()))?;
            items.push(from_payload(&payload).map_err(StoreError::from)?);
        }
        Ok(items)
    }

    fn mark_suppressed(
        &self,
        raw_item_id: &RawItemId,
        stamp: &SuppressionStamp,
        stage: SuppressionStage,
    ) -> Result<(), StoreError> {
        self.mutate_raw_item(raw_item_id, |item| {
            item.status = RawItemStatus::Suppressed;
            let mut applied = stamp.clone();
            applied.stage = stage;
            item.suppression = Some(applied);
        })
    }

    fn mark_processed(&self, raw_item_id: &RawItemId, failed: bool) -> Result<(), StoreError> {
        self.mutate_raw_item(raw_item_id, |item| {
            item.status = if failed {
                RawItemStatus::Failed
            } else {
                RawItemStatus::Normalized
            };
        })
    }
}

impl HardstopStore {
    /// Loads, mutates, and rewrites one raw item row transactionally.
    fn mutate_raw_item(
        &self,
        raw_item_id: &RawItemId,
        mutate: impl FnOnce(&mut RawItem),
    ) -> Result<(), StoreError> {
        let mut guard = self.lock().map_err(StoreError::from)?;
        let tx = guard.transaction().map_err(|err| StoreError::Store(err.to_string()))?;
        let payload: Option<String> = tx
            .query_row(
                "SELECT payload_json FROM raw_items WHERE raw_item_id = ?1",
                params![raw_item_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let Some(payload) = payload else {
            return Err(StoreError::Invalid(format!("raw item not found: {raw_item_id}")));
        };
        let mut item: RawItem = from_payload(&payload).map_err(StoreError::from)?;
        mutate(&mut item);
        let rewritten = to_payload(&item).map_err(StoreError::from)?;
        tx.execute(
            "UPDATE raw_items SET status = ?1, payload_json = ?2 WHERE raw_item_id = ?3",
            params![item.status.as_str(), rewritten, raw_item_id.as_str()],
        )
        .map_err(|err| StoreError::Store(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

impl EventStore for HardstopStore {
    fn insert(&self, event: &Event, recorded_at: UtcTimestamp) -> Result<(), StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload = to_payload(event).map_err(StoreError::from)?;
        let primary_rule =
            event.suppression.as_ref().map(|stamp| stamp.primary_rule_id.as_str().to_string());
        guard
            .execute(
                "INSERT INTO events
                    (event_id, source_id, suppressed, primary_rule_id,
                     recorded_at_utc, payload_json, tier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.event_id.as_str(),
                    event.source_id.as_str(),
                    i64::from(event.is_suppressed()),
                    primary_rule,
                    recorded_at.render(),
                    payload,
                    event.tier.as_str(),
                ],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(())
    }

    fn get(&self, event_id: &EventId) -> Result<Option<Event>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT payload_json FROM events WHERE event_id = ?1",
                params![event_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        payload.map(|text| from_payload(&text).map_err(StoreError::from)).transpose()
    }

    fn list_suppressed_since(
        &self,
        cutoff: UtcTimestamp,
    ) -> Result<Vec<SuppressedEventView>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT event_id, source_id, primary_rule_id FROM events
                 WHERE suppressed = 1 AND recorded_at_utc >= ?1
                 ORDER BY event_id ASC",
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let rows = statement
            .query_map(params![cutoff.render()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut views = Vec::new();
        for row in rows {
            let (event_id, source_id, primary) =
                row.map_err(|err| StoreError::Store(err.to_string()))?;
            let Some(primary) = primary else {
                return Err(StoreError::Corrupt(format!(
                    "suppressed event {event_id} has no primary rule"
                )));
            };
            views.push(SuppressedEventView {
                event_id: EventId::new(event_id),
                source_id: SourceId::new(source_id),
                primary_rule_id: RuleId::new(primary),
            });
        }
        Ok(views)
    }
}

// ============================================================================
// SECTION: Alert Store
// ============================================================================

impl AlertStore for HardstopStore {
    fn find_in_window(
        &self,
        correlation_key: &str,
        window_start: UtcTimestamp,
    ) -> Result<Option<Alert>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT payload_json FROM alerts
                 WHERE correlation_key = ?1 AND last_seen_utc >= ?2
                 ORDER BY last_seen_utc DESC, alert_id ASC
                 LIMIT 1",
                params![correlation_key, window_start.render()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        payload.map(|text| from_payload(&text).map_err(StoreError::from)).transpose()
    }

    fn upsert(&self, alert: &Alert) -> Result<(), StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload = to_payload(alert).map_err(StoreError::from)?;
        guard
            .execute(
                "INSERT INTO alerts
                    (alert_id, correlation_key, first_seen_utc, last_seen_utc, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (alert_id) DO UPDATE SET
                    correlation_key = excluded.correlation_key,
                    first_seen_utc = excluded.first_seen_utc,
                    last_seen_utc = excluded.last_seen_utc,
                    payload_json = excluded.payload_json",
                params![
                    alert.alert_id.as_str(),
                    alert.correlation_key,
                    alert.first_seen_utc.render(),
                    alert.last_seen_utc.render(),
                    payload,
                ],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(())
    }

    fn get(&self, alert_id: &AlertId) -> Result<Option<Alert>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload: Option<String> = guard
            .query_row(
                "SELECT payload_json FROM alerts WHERE alert_id = ?1",
                params![alert_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        payload.map(|text| from_payload(&text).map_err(StoreError::from)).transpose()
    }

    fn list_window(&self, cutoff: UtcTimestamp) -> Result<Vec<Alert>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT payload_json FROM alerts
                 WHERE last_seen_utc >= ?1 OR first_seen_utc >= ?1
                 ORDER BY alert_id ASC",
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let rows = statement
            .query_map(params![cutoff.render()], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut alerts = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::Store(err.to_string()))?;
            alerts.push(from_payload(&payload).map_err(StoreError::from)?);
        }
        Ok(alerts)
    }
}

// ============================================================================
// SECTION: Source Run Store
// ============================================================================

impl SourceRunStore for HardstopStore {
    fn append(&self, run: &SourceRun) -> Result<(), StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload = to_payload(run).map_err(StoreError::from)?;
        guard
            .execute(
                "INSERT INTO source_runs
                    (run_group_id, phase, source_id, status, run_at_utc, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run.run_group_id.as_str(),
                    run.phase.as_str(),
                    run.source_id.as_str(),
                    run.status.as_str(),
                    run.run_at_utc.render(),
                    payload,
                ],
            )
            .map_err(|err| {
                if err.to_string().contains("UNIQUE") {
                    StoreError::Invalid(format!(
                        "source run exists for ({}, {}, {})",
                        run.phase.as_str(),
                        run.source_id,
                        run.run_group_id
                    ))
                } else {
                    StoreError::Store(err.to_string())
                }
            })?;
        Ok(())
    }

    fn recent(
        &self,
        source_id: &SourceId,
        phase: RunPhase,
        limit: usize,
    ) -> Result<Vec<SourceRun>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT payload_json FROM source_runs
                 WHERE source_id = ?1 AND phase = ?2
                 ORDER BY run_at_utc DESC, rowid DESC
                 LIMIT ?3",
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(params![source_id.as_str(), phase.as_str(), limit], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut runs = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::Store(err.to_string()))?;
            runs.push(from_payload(&payload).map_err(StoreError::from)?);
        }
        Ok(runs)
    }

    fn last_success_at(&self, source_id: &SourceId) -> Result<Option<UtcTimestamp>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let rendered: Option<String> = guard
            .query_row(
                "SELECT MAX(run_at_utc) FROM source_runs
                 WHERE source_id = ?1 AND status = 'SUCCESS'",
                params![source_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        rendered
            .map(|text| {
                UtcTimestamp::parse(&text).map_err(|err| StoreError::Corrupt(err.to_string()))
            })
            .transpose()
    }
}

// ============================================================================
// SECTION: Evidence and Run Record Stores
// ============================================================================

impl EvidenceStore for HardstopStore {
    fn append(&self, evidence: &IncidentEvidence) -> Result<(), StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload = to_payload(evidence).map_err(StoreError::from)?;
        guard
            .execute(
                "INSERT OR REPLACE INTO incident_evidence
                    (artifact_id, alert_id, artifact_hash, payload_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    evidence.artifact_id.as_str(),
                    evidence.alert_id.as_str(),
                    evidence.artifact_hash.value,
                    payload,
                ],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(())
    }

    fn list_for_alert(&self, alert_id: &AlertId) -> Result<Vec<IncidentEvidence>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT payload_json FROM incident_evidence
                 WHERE alert_id = ?1
                 ORDER BY artifact_id ASC",
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let rows = statement
            .query_map(params![alert_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut artifacts = Vec::new();
        for row in rows {
            let payload = row.map_err(|err| StoreError::Store(err.to_string()))?;
            artifacts.push(from_payload(&payload).map_err(StoreError::from)?);
        }
        Ok(artifacts)
    }
}

impl RunRecordStore for HardstopStore {
    fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let payload = to_payload(record).map_err(StoreError::from)?;
        guard
            .execute(
                "INSERT INTO run_records
                    (run_id, run_group_id, operator_id, started_at_utc, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.run_id.as_str(),
                    record.run_group_id.as_str(),
                    record.operator_id.as_str(),
                    record.started_at.render(),
                    payload,
                ],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(())
    }
}
