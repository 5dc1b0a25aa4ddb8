// crates/hardstop-core/src/core/telemetry.rs
// ============================================================================
// Module: Hardstop Source Telemetry
// Description: Append-only per-source run rows for fetch and ingest phases.
// Purpose: Feed health scoring and run-status evaluation without external deps.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A [`SourceRun`] is one telemetry row per `(phase, source, run_group)`:
//! exactly one row exists after a phase completes, success or failure. Rows
//! are append-only and dependency-light so downstream deployments can export
//! them to any metrics stack without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RunGroupId;
use crate::core::identifiers::SourceId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum stored length of a source-run error message.
pub const MAX_SOURCE_RUN_ERROR_CHARS: usize = 1_000;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Pipeline phase a source run belongs to.
///
/// # Invariants
/// - Variants are stable for serialization and health windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Fetch phase (collaborator-side HTTP or file pull).
    Fetch,
    /// Ingest phase (core pipeline).
    Ingest,
}

impl RunPhase {
    /// Returns a stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "FETCH",
            Self::Ingest => "INGEST",
        }
    }
}

/// Outcome of a source run.
///
/// # Invariants
/// - Variants are stable for serialization and health scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceRunStatus {
    /// Phase completed for this source.
    Success,
    /// Phase failed for this source.
    Failure,
}

impl SourceRunStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Item counters accumulated over one source run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunCounters {
    /// Items fetched from the source.
    pub items_fetched: u64,
    /// Items newly persisted (not duplicates).
    pub items_new: u64,
    /// Items processed by the ingest pipeline.
    pub items_processed: u64,
    /// Items suppressed during ingest.
    pub items_suppressed: u64,
    /// Events created during ingest.
    pub items_events_created: u64,
    /// Alerts created or updated during ingest.
    pub items_alerts_touched: u64,
    /// Bytes downloaded during fetch.
    pub bytes_downloaded: u64,
}

// ============================================================================
// SECTION: Source Run
// ============================================================================

/// Telemetry row for one `(phase, source, run_group)`.
///
/// # Invariants
/// - Exactly one row per `(phase, source, run_group)`; append-only.
/// - `error` is truncated to [`MAX_SOURCE_RUN_ERROR_CHARS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRun {
    /// Run group the row belongs to.
    pub run_group_id: RunGroupId,
    /// Phase the row records.
    pub phase: RunPhase,
    /// Source the row records.
    pub source_id: SourceId,
    /// Outcome.
    pub status: SourceRunStatus,
    /// Transport status code when applicable (for example HTTP status).
    pub status_code: Option<u16>,
    /// Truncated error message on failure.
    pub error: Option<String>,
    /// Wall-clock duration reported by the host timer.
    pub duration_seconds: f64,
    /// Item counters.
    pub counters: SourceRunCounters,
    /// Ordered diagnostics blob.
    pub diagnostics: BTreeMap<String, String>,
    /// Instant the row was recorded.
    pub run_at_utc: UtcTimestamp,
}

impl SourceRun {
    /// Truncates an error message to the stored maximum.
    #[must_use]
    pub fn truncate_error(message: &str) -> String {
        message.chars().take(MAX_SOURCE_RUN_ERROR_CHARS).collect()
    }
}
