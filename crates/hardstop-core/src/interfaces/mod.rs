// crates/hardstop-core/src/interfaces/mod.rs
// ============================================================================
// Module: Hardstop Interfaces
// Description: Backend-agnostic repository, timer, and cancellation contracts.
// Purpose: Define the seams between the core pipeline and its collaborators.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the core integrates with storage and the host
//! without embedding backend detail. Implementations must be deterministic
//! where the contract says so: listing order is always explicit, and every
//! write either commits or rolls back within the calling operator's scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::alert::Alert;
use crate::core::event::Event;
use crate::core::evidence::IncidentEvidence;
use crate::core::identifiers::AlertId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RawItemId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::SourceId;
use crate::core::provenance::RunRecord;
use crate::core::signal::RawItem;
use crate::core::signal::SuppressionStage;
use crate::core::signal::SuppressionStamp;
use crate::core::telemetry::RunPhase;
use crate::core::telemetry::SourceRun;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid embedding raw payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema is incompatible (required column missing).
    #[error("store schema drift: {0}")]
    SchemaDrift(String),
    /// Store data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Concurrent writer conflict on a correlation key.
    #[error("correlation conflict: {0}")]
    Conflict(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Raw Item Store
// ============================================================================

/// Outcome of an idempotent raw-item save.
///
/// # Invariants
/// - `Duplicate` carries the identifier of the existing row; no write occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaveOutcome {
    /// A new row was persisted.
    Created {
        /// Identifier of the new row.
        raw_item_id: RawItemId,
    },
    /// The payload was already present; nothing was written.
    Duplicate {
        /// Identifier of the existing row.
        raw_item_id: RawItemId,
    },
}

impl SaveOutcome {
    /// Returns true when the save created a new row.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Idempotent persistence of fetched payloads.
pub trait RawItemStore {
    /// Saves a raw item, deduplicating by `(source_id, canonical_id)` first
    /// and by content hash second.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn save(&self, item: &RawItem) -> Result<SaveOutcome, StoreError>;

    /// Lists items awaiting ingest in `(fetched_at_utc, raw_item_id)` order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_for_ingest(
        &self,
        since: Option<UtcTimestamp>,
        include_suppressed: bool,
    ) -> Result<Vec<RawItem>, StoreError>;

    /// Stamps suppression metadata and the `Suppressed` status on a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row is missing or the write fails.
    fn mark_suppressed(
        &self,
        raw_item_id: &RawItemId,
        stamp: &SuppressionStamp,
        stage: SuppressionStage,
    ) -> Result<(), StoreError>;

    /// Transitions a row out of `New` to `Normalized` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row is missing or the write fails.
    fn mark_processed(&self, raw_item_id: &RawItemId, failed: bool) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Event Store
// ============================================================================

/// Read-model view of a suppressed event for brief aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedEventView {
    /// Suppressed event identifier.
    pub event_id: EventId,
    /// Producing source.
    pub source_id: SourceId,
    /// Primary matched rule.
    pub primary_rule_id: RuleId,
}

/// Exclusive owner of canonical events.
pub trait EventStore {
    /// Inserts an immutable event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the event already exists or the write fails.
    fn insert(&self, event: &Event, recorded_at: UtcTimestamp) -> Result<(), StoreError>;

    /// Loads an event by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, event_id: &EventId) -> Result<Option<Event>, StoreError>;

    /// Lists suppressed events recorded at or after the cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_suppressed_since(
        &self,
        cutoff: UtcTimestamp,
    ) -> Result<Vec<SuppressedEventView>, StoreError>;
}

// ============================================================================
// SECTION: Alert Store
// ============================================================================

/// Exclusive owner of alerts.
pub trait AlertStore {
    /// Finds the alert with the given correlation key whose `last_seen_utc`
    /// is at or after the window start.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn find_in_window(
        &self,
        correlation_key: &str,
        window_start: UtcTimestamp,
    ) -> Result<Option<Alert>, StoreError>;

    /// Inserts or replaces an alert by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Loads an alert by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get(&self, alert_id: &AlertId) -> Result<Option<Alert>, StoreError>;

    /// Lists alerts seen (first or last) at or after the cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_window(&self, cutoff: UtcTimestamp) -> Result<Vec<Alert>, StoreError>;
}

// ============================================================================
// SECTION: Telemetry and Provenance Stores
// ============================================================================

/// Append-only store for source-run telemetry rows.
pub trait SourceRunStore {
    /// Appends one row; rejects duplicates per `(phase, source, run_group)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails or the row exists.
    fn append(&self, run: &SourceRun) -> Result<(), StoreError>;

    /// Returns the most recent rows for a source and phase, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn recent(
        &self,
        source_id: &SourceId,
        phase: RunPhase,
        limit: usize,
    ) -> Result<Vec<SourceRun>, StoreError>;

    /// Returns the instant of the most recent successful row for a source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn last_success_at(&self, source_id: &SourceId) -> Result<Option<UtcTimestamp>, StoreError>;
}

/// Append-only store for incident evidence artifacts.
pub trait EvidenceStore {
    /// Appends an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append(&self, evidence: &IncidentEvidence) -> Result<(), StoreError>;

    /// Lists artifacts for an alert in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_for_alert(&self, alert_id: &AlertId) -> Result<Vec<IncidentEvidence>, StoreError>;
}

/// Append-only sink for finalized run records.
pub trait RunRecordStore {
    /// Appends a finalized record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append(&self, record: &RunRecord) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Host Timer
// ============================================================================

/// Elapsed-time source supplied by the host.
///
/// The core never reads the wall clock; live hosts supply a real timer and
/// pinned replays supply a zero timer so costs do not perturb hashes.
pub trait RunTimer {
    /// Returns elapsed seconds since the timer was started.
    fn elapsed_seconds(&self) -> f64;
}

/// Timer that always reports zero elapsed time (pinned replay).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroTimer;

impl RunTimer for ZeroTimer {
    fn elapsed_seconds(&self) -> f64 {
        0.0
    }
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Cooperative cancellation token consulted between operators and items.
///
/// # Invariants
/// - Once cancelled, the token never resets.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// Shared cancellation flag.
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
