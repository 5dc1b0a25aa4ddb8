// crates/hardstop-core/src/runtime/mod.rs
// ============================================================================
// Module: Hardstop Runtime
// Description: Pipeline operators and the shared operator context.
// Purpose: Execute the deterministic operator chain over stored artifacts.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime holds the operator chain: canonicalization, suppression,
//! linkage, scoring, correlation, evidence, health, status, and the brief
//! builder, plus the pipeline that sequences them. Operators share an
//! [`OperatorContext`] carrying the run group, execution mode, resolved
//! config fingerprint, and the caller-supplied `now`.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod brief;
pub mod canonicalize;
pub mod correlate;
pub mod evidence_build;
pub mod health;
pub mod link;
pub mod pipeline;
pub mod score;
pub mod status;
pub mod suppress;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::alert::Classification;
use crate::core::evidence::DeterminismContext;
use crate::core::evidence::DeterminismMode;
use crate::core::hashing::HashDigest;
use crate::core::hashing::short_token;
use crate::core::identifiers::OperatorId;
use crate::core::identifiers::RunGroupId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::SourceId;
use crate::core::provenance::RunMode;
use crate::core::signal::SourceTier;
use crate::core::signal::TrustTier;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Operator Identifiers
// ============================================================================

/// Canonicalization operator identifier.
pub const OP_CANONICALIZE: &str = "canonicalization.normalize@1.0.0";
/// Suppression operator identifier.
pub const OP_SUPPRESS: &str = "suppression.evaluate@1.0.0";
/// Network linker operator identifier.
pub const OP_LINK: &str = "network.link@1.0.0";
/// Impact scorer operator identifier.
pub const OP_SCORE: &str = "impact.score@1.0.0";
/// Alert correlator operator identifier.
pub const OP_CORRELATE: &str = "alert.correlate@1.0.0";
/// Incident evidence operator identifier.
pub const OP_EVIDENCE: &str = "evidence.build@1.0.0";
/// Fetch telemetry recorder operator identifier.
pub const OP_FETCH_RECORD: &str = "fetch.record@1.0.0";
/// Brief builder operator identifier.
pub const OP_BRIEF: &str = "brief.build@1.0.0";

// ============================================================================
// SECTION: Source Profile
// ============================================================================

/// Resolved per-source policy view handed to the pipeline.
///
/// # Invariants
/// - Produced by configuration resolution; per-source overrides already won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Source identifier.
    pub source_id: SourceId,
    /// Source adapter type (for example `rss`, `govt_alert`).
    pub source_type: String,
    /// Scope tier.
    pub tier: SourceTier,
    /// Trust tier in 1..=3.
    pub trust_tier: TrustTier,
    /// Minimum classification the source may produce.
    pub classification_floor: Classification,
    /// Per-source weighting bias in -2..=2.
    pub weighting_bias: i8,
    /// True when the source is enabled.
    pub enabled: bool,
}

// ============================================================================
// SECTION: Operator Context
// ============================================================================

/// Shared context for one pipeline execution.
///
/// # Invariants
/// - `now` is caller-supplied; the core never reads the wall clock.
/// - `determinism_context` is present exactly under pinned mode.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Run group stitching this execution together.
    pub run_group_id: RunGroupId,
    /// Execution mode (strict or best-effort).
    pub mode: RunMode,
    /// Determinism mode (live or pinned).
    pub determinism_mode: DeterminismMode,
    /// Pinned-run inputs (pinned mode only).
    pub determinism_context: Option<DeterminismContext>,
    /// Resolved configuration fingerprint.
    pub config_hash: HashDigest,
    /// Caller-supplied current instant.
    pub now: UtcTimestamp,
    /// True when suppression stamps are withheld (`--no-suppress`).
    pub no_suppress: bool,
}

impl OperatorContext {
    /// Derives a deterministic run identifier for an operator invocation.
    ///
    /// The identifier is a function of the run group, operator, and a caller
    /// sequence number, so pinned replays reproduce it exactly.
    #[must_use]
    pub fn derive_run_id(&self, operator: &str, sequence: u64) -> RunId {
        let seed = format!("{}|{operator}|{sequence}", self.run_group_id);
        RunId::new(format!("RUN-{}", short_token(&seed, 16)))
    }

    /// Returns the operator identifier wrapper for a constant.
    #[must_use]
    pub fn operator(&self, operator: &str) -> OperatorId {
        OperatorId::new(operator)
    }
}
