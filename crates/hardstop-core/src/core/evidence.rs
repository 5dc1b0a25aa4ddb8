// crates/hardstop-core/src/core/evidence.rs
// ============================================================================
// Module: Hardstop Incident Evidence
// Description: Hashed artifacts explaining alert creates and merges.
// Purpose: Make every correlation decision auditable and replayable.
// Dependencies: crate::core::{identifiers, hashing, time}, serde
// ============================================================================

//! ## Overview
//! Every alert create or update produces an [`IncidentEvidence`] artifact:
//! merge reason codes, overlapping entity sets, and ordered human-readable
//! summary lines. The artifact hash covers the canonical serialization of the
//! payload; live-mode artifacts hash a scrubbed view while pinned-mode
//! artifacts hash the full view including the determinism context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::AlertId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::identifiers::RunId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Determinism Envelope
// ============================================================================

/// Determinism mode an artifact was produced under.
///
/// # Invariants
/// - Variants are stable for serialization and replay verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterminismMode {
    /// Live wall-clock run; time fields are scrubbed before hashing.
    Live,
    /// Pinned replay run; all inputs are caller-supplied.
    Pinned,
}

impl DeterminismMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Pinned => "pinned",
        }
    }
}

impl fmt::Display for DeterminismMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pinned-run inputs recorded in artifacts produced under pinned mode.
///
/// # Invariants
/// - Present exactly when the producing run was pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismContext {
    /// Caller-supplied seed string.
    pub seed: String,
    /// Pinned UTC instant used instead of the wall clock.
    pub pinned_at: UtcTimestamp,
    /// Pinned run identifier.
    pub run_id: RunId,
}

// ============================================================================
// SECTION: Merge Reasons
// ============================================================================

/// Reason code explaining why an event merged into an alert.
///
/// # Invariants
/// - Variants are stable and ordered for deterministic serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeReason {
    /// Event shares the alert's correlation key (always present).
    SameCorrelationKey,
    /// Event adds to a non-empty facility overlap.
    SharedFacilities,
    /// Event adds to a non-empty lane overlap.
    SharedLanes,
    /// Event published within 24h of the alert's prior activity.
    TemporalOverlap,
}

impl MergeReason {
    /// Returns a stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SameCorrelationKey => "SAME_CORRELATION_KEY",
            Self::SharedFacilities => "SHARED_FACILITIES",
            Self::SharedLanes => "SHARED_LANES",
            Self::TemporalOverlap => "TEMPORAL_OVERLAP",
        }
    }
}

// ============================================================================
// SECTION: Overlap
// ============================================================================

/// Entity overlap between a merging event and the prior alert scope.
///
/// # Invariants
/// - Sets serialize as sorted sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOverlap {
    /// Overlapping facility identifiers (sorted).
    pub facilities: BTreeSet<FacilityId>,
    /// Overlapping lane identifiers (sorted).
    pub lanes: BTreeSet<LaneId>,
}

// ============================================================================
// SECTION: Incident Evidence
// ============================================================================

/// Hashed artifact explaining an alert create or merge.
///
/// # Invariants
/// - `merge_reasons` always contains [`MergeReason::SameCorrelationKey`].
/// - `determinism_context` is present exactly in pinned mode.
/// - `artifact_hash` covers the canonical payload (scrubbed view in live mode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentEvidence {
    /// Artifact identifier (`IE-…`).
    pub artifact_id: ArtifactId,
    /// Alert the artifact explains.
    pub alert_id: AlertId,
    /// Contributing events at build time (append order).
    pub root_event_ids: Vec<EventId>,
    /// Merge reason codes (sorted, deduplicated).
    pub merge_reasons: Vec<MergeReason>,
    /// Entity overlap with the prior scope.
    pub overlap: EntityOverlap,
    /// Ordered human-readable summary lines.
    pub merge_summary: Vec<String>,
    /// Determinism mode of the producing run.
    pub determinism_mode: DeterminismMode,
    /// Pinned-run inputs (pinned mode only).
    pub determinism_context: Option<DeterminismContext>,
    /// Instant the artifact was built (scrub sentinel in live-mode hashes).
    pub built_at: UtcTimestamp,
    /// Canonical hash of the artifact payload.
    pub artifact_hash: HashDigest,
}
