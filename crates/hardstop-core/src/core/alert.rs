// crates/hardstop-core/src/core/alert.rs
// ============================================================================
// Module: Hardstop Alerts
// Description: Materialized decisions produced by the alert correlator.
// Purpose: Model alerts, scope, classification, and the evidence payload.
// Dependencies: crate::core::{event, identifiers, signal, time}, serde
// ============================================================================

//! ## Overview
//! An [`Alert`] is a persisted decision built from one or more correlated
//! events. Alerts are created once and then only updated: `update_count`
//! equals the length of the append-only `root_event_ids` list,
//! `first_seen_utc` never moves, and `classification` never drops below the
//! producing source's classification floor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::MetadataValue;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AlertId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ShipmentId;
use crate::core::identifiers::SourceId;
use crate::core::signal::SourceTier;
use crate::core::signal::TrustTier;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Alert classification band (0 Interesting, 1 Relevant, 2 Impactful).
///
/// # Invariants
/// - Wire form is the integer 0, 1, or 2.
/// - Ordering follows the numeric band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Classification {
    /// Worth a look; no expected operational impact.
    Interesting,
    /// Relevant to the network; monitor.
    Relevant,
    /// Expected operational impact; act.
    Impactful,
}

impl Classification {
    /// Returns the numeric band (0..=2).
    #[must_use]
    pub const fn band(self) -> u8 {
        match self {
            Self::Interesting => 0,
            Self::Relevant => 1,
            Self::Impactful => 2,
        }
    }

    /// Derives the classification band from a final impact score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0 ..= 3 => Self::Interesting,
            4 ..= 6 => Self::Relevant,
            _ => Self::Impactful,
        }
    }
}

impl TryFrom<u8> for Classification {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Interesting),
            1 => Ok(Self::Relevant),
            2 => Ok(Self::Impactful),
            other => Err(format!("classification out of range: {other}")),
        }
    }
}

impl From<Classification> for u8 {
    fn from(value: Classification) -> Self {
        value.band()
    }
}

// ============================================================================
// SECTION: Status and Correlation Action
// ============================================================================

/// Operator-owned alert workflow status.
///
/// # Invariants
/// - The correlator never mutates this field; operators own transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Open (default on create).
    Open,
    /// Acknowledged by an operator.
    Acknowledged,
    /// Resolved by an operator.
    Resolved,
}

/// Correlation action the last pipeline pass took on the alert.
///
/// # Invariants
/// - Variants are stable for serialization and brief partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationAction {
    /// A new alert was created.
    Created,
    /// An existing alert was updated.
    Updated,
}

impl CorrelationAction {
    /// Returns a stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
        }
    }
}

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Entity scope of an alert.
///
/// # Invariants
/// - Facility and lane sets serialize as sorted sequences.
/// - `shipments_total_linked` always reflects the untruncated count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertScope {
    /// Facilities in scope (sorted).
    pub facilities: BTreeSet<FacilityId>,
    /// Lanes in scope (sorted).
    pub lanes: BTreeSet<LaneId>,
    /// Shipments in scope, in linker order, possibly truncated.
    pub shipments: Vec<ShipmentId>,
    /// Untruncated count of linked shipments.
    pub shipments_total_linked: u64,
    /// True when the shipment list was truncated at the linker cap.
    pub shipments_truncated: bool,
}

// ============================================================================
// SECTION: Evidence Payload
// ============================================================================

/// Facility contribution to the impact score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityContribution {
    /// Contributing facility.
    pub facility_id: FacilityId,
    /// Facility criticality at scoring time.
    pub criticality_score: u8,
    /// Score delta attributed to this facility.
    pub delta: i32,
}

/// Lane contribution to the impact score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneContribution {
    /// Contributing lane.
    pub lane_id: LaneId,
    /// Lane volume score at scoring time.
    pub volume_score: u8,
    /// Score delta attributed to this lane.
    pub delta: i32,
}

/// Network-side contributions to the impact score.
///
/// # Invariants
/// - All lists are deterministically sorted by their leading identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCriticality {
    /// Facility contributions (sorted by facility id).
    pub facility_contributions: Vec<FacilityContribution>,
    /// Lane contributions (sorted by lane id).
    pub lane_contributions: Vec<LaneContribution>,
    /// Priority shipments inside the proximity window (sorted).
    pub priority_shipments: Vec<ShipmentId>,
    /// Delta from priority shipments (capped).
    pub priority_delta: i32,
    /// Delta from nearest-ETA proximity.
    pub eta_proximity_delta: i32,
}

/// Post-clamp modifiers applied to the impact score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreModifiers {
    /// Asserted trust tier of the producing source.
    pub trust_tier: TrustTier,
    /// Delta contributed by the trust tier.
    pub trust_tier_delta: i32,
    /// Delta contributed by the per-source weighting bias.
    pub weighting_bias_delta: i32,
}

/// Suppression context carried into the rationale for audit-only events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionContext {
    /// Primary matched rule.
    pub primary_rule_id: RuleId,
    /// Reason code from the primary rule.
    pub reason_code: String,
}

/// Score trace recording base, final, and matched keywords.
///
/// # Invariants
/// - `matched_keywords` is sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTrace {
    /// Base score after the pre-modifier clamp.
    pub base_score: u8,
    /// Final score after modifiers and the re-clamp.
    pub final_score: u8,
    /// Matched event-type bonus keywords (sorted).
    pub matched_keywords: Vec<String>,
    /// Classification adjustment reasons in application order.
    pub classification_reasons: Vec<String>,
}

/// Impact-score rationale stored in the alert evidence payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRationale {
    /// Network-side contributions.
    pub network_criticality: NetworkCriticality,
    /// Post-clamp modifiers.
    pub modifiers: ScoreModifiers,
    /// Suppression context when the event was suppressed.
    pub suppression_context: Option<SuppressionContext>,
    /// Base/final trace with matched keywords.
    pub score_trace: ScoreTrace,
}

/// Evidence payload attached to an alert.
///
/// # Invariants
/// - Lists preserve pipeline emission order; the rationale's own lists are
///   sorted by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvidence {
    /// Ordered pipeline diagnostics.
    pub diagnostics: Vec<String>,
    /// Linker notes for the last contributing event.
    pub linking_notes: Vec<String>,
    /// Source metadata copied from the last contributing event.
    pub source_metadata: BTreeMap<String, MetadataValue>,
    /// Impact-score rationale for the last contributing event.
    pub impact_score_rationale: ImpactRationale,
}

// ============================================================================
// SECTION: Alert
// ============================================================================

/// Materialized decision produced from one or more correlated events.
///
/// # Invariants
/// - `update_count == root_event_ids.len()`.
/// - `first_seen_utc <= last_seen_utc`.
/// - `classification >= classification_floor` of the producing source.
/// - `impact_score` is in `0..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Derived alert identifier (`ALERT-…`).
    pub alert_id: AlertId,
    /// Risk type label derived from the correlation bucket.
    pub risk_type: String,
    /// Classification band.
    pub classification: Classification,
    /// Operator-owned workflow status.
    pub status: AlertStatus,
    /// One-line alert summary.
    pub summary: String,
    /// First contributing event.
    pub root_event_id: EventId,
    /// Entity scope.
    pub scope: AlertScope,
    /// Impact score in 0..=10.
    pub impact_score: u8,
    /// Correlation key grouping contributing events.
    pub correlation_key: String,
    /// Action taken by the last pipeline pass.
    pub correlation_action: CorrelationAction,
    /// Instant the alert was first seen.
    pub first_seen_utc: UtcTimestamp,
    /// Instant the alert was last updated.
    pub last_seen_utc: UtcTimestamp,
    /// Number of contributing events.
    pub update_count: u64,
    /// Append-only list of contributing events.
    pub root_event_ids: Vec<EventId>,
    /// Scope tier of the last updating source.
    pub tier: SourceTier,
    /// Last updating source.
    pub source_id: SourceId,
    /// Trust tier of the last updating source.
    pub trust_tier: TrustTier,
    /// Evidence payload.
    pub evidence: AlertEvidence,
    /// Hash of the latest incident evidence artifact.
    pub evidence_artifact_hash: Option<HashDigest>,
}
