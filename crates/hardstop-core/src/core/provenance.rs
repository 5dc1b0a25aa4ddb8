// crates/hardstop-core/src/core/provenance.rs
// ============================================================================
// Module: Hardstop Provenance
// Description: RunRecords, artifact references, and execution modes.
// Purpose: Guarantee one finalized provenance record per operator invocation.
// Dependencies: crate::core::{hashing, identifiers, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`RunRecord`] is the append-only provenance unit emitted by every
//! operator invocation, success or failure. Records reference artifacts by
//! hash only (weak back-references, never ownership) and carry the resolved
//! config fingerprint so any two hosts can compare executions byte for byte.
//!
//! Strict mode forbids unpinned nondeterministic inputs; best-effort mode
//! permits them only when declared in the `best_effort` envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::OperatorId;
use crate::core::identifiers::RunGroupId;
use crate::core::identifiers::RunId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Execution Mode
// ============================================================================

/// Operator execution mode.
///
/// # Invariants
/// - Variants are stable for serialization and replay verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Fail fast on any unpinned nondeterministic input.
    Strict,
    /// Permit declared nondeterminism with recorded metadata.
    BestEffort,
}

impl RunMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Strict-mode determinism violation.
///
/// # Invariants
/// - Raised before RunRecord finalization and recorded as a record error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("determinism violation in strict mode: {0}")]
pub struct DeterminismViolation(pub String);

// ============================================================================
// SECTION: Artifact References
// ============================================================================

/// Artifact kinds referenced by RunRecords.
///
/// # Invariants
/// - Variants are stable for serialization and replay verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Raw item row.
    RawItem,
    /// Canonical event row.
    Event,
    /// Alert row.
    Alert,
    /// Incident evidence artifact.
    IncidentEvidence,
    /// Source run telemetry row.
    SourceRun,
    /// Brief read-model envelope.
    Brief,
    /// Resolved configuration snapshot.
    ConfigSnapshot,
}

/// Weak reference to an artifact by identifier, kind, and hash.
///
/// # Invariants
/// - References never imply ownership; artifacts are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact identifier.
    pub id: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Canonical hash of the artifact payload.
    pub hash: HashDigest,
}

// ============================================================================
// SECTION: Cost
// ============================================================================

/// Resource cost of one operator invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunCost {
    /// Wall-clock seconds reported by the host timer (0 under pinned replay).
    pub time_seconds: f64,
    /// Bytes read by the operator.
    pub bytes_in: u64,
    /// Bytes written by the operator.
    pub bytes_out: u64,
}

// ============================================================================
// SECTION: Best-Effort Envelope
// ============================================================================

/// Declared nondeterminism metadata for best-effort runs.
///
/// # Invariants
/// - Serializes as an empty object under strict mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestEffortMetadata {
    /// Declared seed when entropy was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    /// Additional declared nondeterministic sources, keyed by name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub declared: BTreeMap<String, String>,
}

impl BestEffortMetadata {
    /// Returns true when no nondeterminism was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seed.is_none() && self.declared.is_empty()
    }
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// Append-only provenance unit for one operator invocation.
///
/// # Invariants
/// - `started_at <= ended_at`.
/// - `best_effort` is empty under strict mode.
/// - Exactly one record exists per invocation, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: RunId,
    /// Operator identifier (`name@version`).
    pub operator_id: OperatorId,
    /// Invocation start instant.
    pub started_at: UtcTimestamp,
    /// Invocation end instant.
    pub ended_at: UtcTimestamp,
    /// Execution mode.
    pub mode: RunMode,
    /// Resolved configuration fingerprint.
    pub config_hash: HashDigest,
    /// Artifacts read, in read order.
    pub input_refs: Vec<ArtifactRef>,
    /// Artifacts written, in write order.
    pub output_refs: Vec<ArtifactRef>,
    /// Ordered warnings.
    pub warnings: Vec<String>,
    /// Ordered errors.
    pub errors: Vec<String>,
    /// Resource cost.
    pub cost: RunCost,
    /// Declared nondeterminism (empty in strict mode).
    pub best_effort: BestEffortMetadata,
    /// Run group stitching this record into a user-visible run.
    pub run_group_id: RunGroupId,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder guaranteeing RunRecord finalization on every execution path.
///
/// Begin pins the identity fields; reads, writes, warnings, and errors are
/// recorded in order; [`RunRecordBuilder::finalize`] stamps the end instant
/// and cost. Callers must finalize on both success and failure paths.
#[derive(Debug, Clone)]
pub struct RunRecordBuilder {
    /// Record under construction.
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Begins a record, pinning identity fields.
    #[must_use]
    pub fn begin(
        run_id: RunId,
        operator_id: OperatorId,
        started_at: UtcTimestamp,
        mode: RunMode,
        config_hash: HashDigest,
        run_group_id: RunGroupId,
    ) -> Self {
        Self {
            record: RunRecord {
                run_id,
                operator_id,
                started_at,
                ended_at: started_at,
                mode,
                config_hash,
                input_refs: Vec::new(),
                output_refs: Vec::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
                cost: RunCost::default(),
                best_effort: BestEffortMetadata::default(),
                run_group_id,
            },
        }
    }

    /// Records an artifact read.
    pub fn record_input(&mut self, artifact: ArtifactRef) {
        self.record.input_refs.push(artifact);
    }

    /// Records an artifact write.
    pub fn record_output(&mut self, artifact: ArtifactRef) {
        self.record.output_refs.push(artifact);
    }

    /// Adds measured byte counts to the cost envelope.
    pub fn add_bytes(&mut self, bytes_in: u64, bytes_out: u64) {
        self.record.cost.bytes_in = self.record.cost.bytes_in.saturating_add(bytes_in);
        self.record.cost.bytes_out = self.record.cost.bytes_out.saturating_add(bytes_out);
    }

    /// Records an ordered warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.record.warnings.push(message.into());
    }

    /// Records an ordered error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.record.errors.push(message.into());
    }

    /// Declares a nondeterministic seed.
    ///
    /// # Errors
    ///
    /// Returns [`DeterminismViolation`] under strict mode: unpinned entropy is
    /// forbidden there and must be surfaced before finalization.
    pub fn declare_seed(&mut self, seed: impl Into<String>) -> Result<(), DeterminismViolation> {
        let seed = seed.into();
        if matches!(self.record.mode, RunMode::Strict) {
            let violation = DeterminismViolation(format!("undeclared entropy source: seed {seed}"));
            self.record.errors.push(violation.to_string());
            return Err(violation);
        }
        self.record.best_effort.seed = Some(seed);
        Ok(())
    }

    /// Declares a named nondeterministic source.
    ///
    /// # Errors
    ///
    /// Returns [`DeterminismViolation`] under strict mode.
    pub fn declare_source(
        &mut self,
        name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Result<(), DeterminismViolation> {
        let name = name.into();
        if matches!(self.record.mode, RunMode::Strict) {
            let violation =
                DeterminismViolation(format!("undeclared nondeterministic source: {name}"));
            self.record.errors.push(violation.to_string());
            return Err(violation);
        }
        self.record.best_effort.declared.insert(name, detail.into());
        Ok(())
    }

    /// Returns true when any error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.record.errors.is_empty()
    }

    /// Finalizes the record with the end instant and elapsed time.
    ///
    /// The end instant is clamped to be no earlier than the start instant.
    #[must_use]
    pub fn finalize(mut self, ended_at: UtcTimestamp, time_seconds: f64) -> RunRecord {
        self.record.ended_at = ended_at.max(self.record.started_at);
        self.record.cost.time_seconds = time_seconds;
        self.record
    }
}
