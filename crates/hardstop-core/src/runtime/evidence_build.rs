// crates/hardstop-core/src/runtime/evidence_build.rs
// ============================================================================
// Module: Incident Evidence Builder
// Description: Produces hashed artifacts explaining alert creates and merges.
// Purpose: Record merge reasons, overlap, and determinism context per decision.
// Dependencies: crate::core, crate::runtime::correlate, serde
// ============================================================================

//! ## Overview
//! Every correlation decision yields one [`IncidentEvidence`] artifact. The
//! reason codes always include `SAME_CORRELATION_KEY`; shared-facility and
//! shared-lane reasons require a non-empty overlap with the prior scope, and
//! `TEMPORAL_OVERLAP` requires the event to land within 24 hours of the
//! alert's prior activity. The artifact hash covers the canonical payload:
//! pinned mode hashes the full view, live mode hashes a view with the build
//! instant scrubbed to the epoch sentinel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::alert::CorrelationAction;
use crate::core::event::Event;
use crate::core::evidence::DeterminismContext;
use crate::core::evidence::DeterminismMode;
use crate::core::evidence::EntityOverlap;
use crate::core::evidence::IncidentEvidence;
use crate::core::evidence::MergeReason;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::hashing::short_token;
use crate::core::identifiers::AlertId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::EventId;
use crate::core::time::UtcTimestamp;
use crate::runtime::correlate::CorrelationOutcome;
use crate::runtime::link::Linkage;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Temporal-overlap window between an event and prior alert activity.
const TEMPORAL_OVERLAP_HOURS: i64 = 24;

/// Correlation window length surfaced in the merge summary.
const WINDOW_HOURS: i64 = 168;

// ============================================================================
// SECTION: Hash View
// ============================================================================

/// Canonical payload view the artifact hash covers.
///
/// # Invariants
/// - `built_at` is the epoch sentinel under live mode.
#[derive(Debug, Serialize)]
struct EvidenceHashView<'payload> {
    /// Alert the artifact explains.
    alert_id: &'payload AlertId,
    /// Contributing events at build time.
    root_event_ids: &'payload [EventId],
    /// Sorted merge reason codes.
    merge_reasons: &'payload [MergeReason],
    /// Entity overlap with the prior scope.
    overlap: &'payload EntityOverlap,
    /// Ordered summary lines.
    merge_summary: &'payload [String],
    /// Determinism mode of the producing run.
    determinism_mode: DeterminismMode,
    /// Pinned-run inputs (pinned mode only).
    determinism_context: Option<&'payload DeterminismContext>,
    /// Build instant (scrubbed under live mode).
    built_at: UtcTimestamp,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Builds the incident evidence artifact for one correlation decision.
///
/// # Errors
///
/// Returns [`HashError`] when the canonical payload cannot be hashed.
pub fn build(
    outcome: &CorrelationOutcome,
    event: &Event,
    linkage: &Linkage,
    mode: DeterminismMode,
    context: Option<&DeterminismContext>,
    now: UtcTimestamp,
) -> Result<IncidentEvidence, HashError> {
    let alert = &outcome.alert;
    let (merge_reasons, overlap) = reasons_and_overlap(outcome, event, linkage, now);
    let merge_summary = summary_lines(outcome, &overlap);

    let built_at = match mode {
        DeterminismMode::Pinned => context.map_or(now, |pinned| pinned.pinned_at),
        DeterminismMode::Live => now,
    };
    let hashed_built_at = match mode {
        DeterminismMode::Pinned => built_at,
        DeterminismMode::Live => UtcTimestamp::EPOCH,
    };

    let view = EvidenceHashView {
        alert_id: &alert.alert_id,
        root_event_ids: &alert.root_event_ids,
        merge_reasons: &merge_reasons,
        overlap: &overlap,
        merge_summary: &merge_summary,
        determinism_mode: mode,
        determinism_context: context,
        built_at: hashed_built_at,
    };
    let artifact_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &view)?;

    let artifact_basis = format!("{}|{}", alert.alert_id, alert.update_count);
    Ok(IncidentEvidence {
        artifact_id: ArtifactId::new(format!("IE-{}", short_token(&artifact_basis, 12))),
        alert_id: alert.alert_id.clone(),
        root_event_ids: alert.root_event_ids.clone(),
        merge_reasons,
        overlap,
        merge_summary,
        determinism_mode: mode,
        determinism_context: context.cloned(),
        built_at,
        artifact_hash,
    })
}

/// Derives the merge reasons and entity overlap for a decision.
fn reasons_and_overlap(
    outcome: &CorrelationOutcome,
    event: &Event,
    linkage: &Linkage,
    now: UtcTimestamp,
) -> (Vec<MergeReason>, EntityOverlap) {
    let mut reasons = vec![MergeReason::SameCorrelationKey];
    let mut overlap = EntityOverlap::default();

    if let Some(prior) = &outcome.prior {
        overlap.facilities = prior
            .scope
            .facilities
            .intersection(&linkage.facilities)
            .cloned()
            .collect::<BTreeSet<_>>();
        overlap.lanes =
            prior.scope.lanes.intersection(&linkage.lanes).cloned().collect::<BTreeSet<_>>();

        if !overlap.facilities.is_empty() {
            reasons.push(MergeReason::SharedFacilities);
        }
        if !overlap.lanes.is_empty() {
            reasons.push(MergeReason::SharedLanes);
        }
        let observed = event.observed_at(now);
        if observed.hours_between(prior.last_seen_utc) <= TEMPORAL_OVERLAP_HOURS {
            reasons.push(MergeReason::TemporalOverlap);
        }
    }

    reasons.sort();
    reasons.dedup();
    (reasons, overlap)
}

/// Builds the ordered human-readable summary lines.
fn summary_lines(outcome: &CorrelationOutcome, overlap: &EntityOverlap) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome.action {
        CorrelationAction::Created => {
            lines.push(format!("New alert created for key {}", outcome.alert.correlation_key));
        }
        CorrelationAction::Updated => {
            lines.push(format!("Existing alert seen within {WINDOW_HOURS}h"));
        }
    }
    if !overlap.facilities.is_empty() {
        lines.push(format!("Shared facilities: {}", join_ids(overlap.facilities.iter())));
    }
    if !overlap.lanes.is_empty() {
        lines.push(format!("Shared lanes: {}", join_ids(overlap.lanes.iter())));
    }
    if outcome.action == CorrelationAction::Updated {
        lines.push(format!("Update count now {}", outcome.alert.update_count));
    }
    lines
}

/// Joins sorted identifiers into a comma-separated list.
fn join_ids<T: ToString>(ids: impl Iterator<Item = T>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
