// crates/hardstop-core/src/runtime/brief.rs
// ============================================================================
// Module: Brief Read-Model Builder
// Description: Assembles the deterministic brief envelope from repositories.
// Purpose: Produce a versioned, byte-stable read model for rendering.
// Dependencies: crate::core, crate::interfaces, serde
// ============================================================================

//! ## Overview
//! The brief is a versioned read-model envelope (`brief.v1`): counts, top
//! impactful alerts, updated and created partitions, tier counts, and the
//! suppression rollup. Alerts are ordered by the declared total order
//! (classification, impact score, update count, last seen, then alert id so
//! no tie is left to implementation choice). Rendering is an external
//! concern; the builder never re-sorts for presentation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::alert::Alert;
use crate::core::alert::Classification;
use crate::core::alert::CorrelationAction;
use crate::core::identifiers::AlertId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::SourceId;
use crate::core::signal::SourceTier;
use crate::core::signal::TrustTier;
use crate::core::time::UtcTimestamp;
use crate::interfaces::AlertStore;
use crate::interfaces::EventStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Read-model version emitted in every envelope.
pub const READ_MODEL_VERSION: &str = "brief.v1";

/// Entries kept in the suppression rollup's top lists.
const ROLLUP_TOP: usize = 5;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Brief window selection.
///
/// # Invariants
/// - Variants map 1:1 to 24, 72, and 168 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefWindow {
    /// Last 24 hours.
    Hours24,
    /// Last 72 hours.
    Hours72,
    /// Last 168 hours.
    Hours168,
}

impl BriefWindow {
    /// Returns the window length in hours.
    #[must_use]
    pub const fn hours(self) -> i64 {
        match self {
            Self::Hours24 => 24,
            Self::Hours72 => 72,
            Self::Hours168 => 168,
        }
    }
}

/// Brief builder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefLimits {
    /// Cap on the updated and created partitions.
    pub limit: usize,
    /// Cap on the top section (class-2 alerts by impact).
    pub top_cap: usize,
    /// True when class-0 alerts are included.
    pub include_interesting: bool,
}

impl Default for BriefLimits {
    fn default() -> Self {
        Self {
            limit: 10,
            top_cap: 2,
            include_interesting: true,
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Read-model row for one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDigest {
    /// Alert identifier.
    pub alert_id: AlertId,
    /// Risk type label.
    pub risk_type: String,
    /// Classification band.
    pub classification: Classification,
    /// Impact score in 0..=10.
    pub impact_score: u8,
    /// Number of contributing events.
    pub update_count: u64,
    /// First contributing event.
    pub root_event_id: EventId,
    /// Action taken by the last pipeline pass.
    pub correlation_action: CorrelationAction,
    /// Instant the alert was first seen.
    pub first_seen_utc: UtcTimestamp,
    /// Instant the alert was last updated.
    pub last_seen_utc: UtcTimestamp,
    /// One-line summary.
    pub summary: String,
    /// Scope tier of the last updating source.
    pub tier: SourceTier,
    /// Last updating source.
    pub source_id: SourceId,
    /// Trust tier of the last updating source.
    pub trust_tier: TrustTier,
}

impl AlertDigest {
    /// Projects an alert into its read-model row.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            alert_id: alert.alert_id.clone(),
            risk_type: alert.risk_type.clone(),
            classification: alert.classification,
            impact_score: alert.impact_score,
            update_count: alert.update_count,
            root_event_id: alert.root_event_id.clone(),
            correlation_action: alert.correlation_action,
            first_seen_utc: alert.first_seen_utc,
            last_seen_utc: alert.last_seen_utc,
            summary: alert.summary.clone(),
            tier: alert.tier,
            source_id: alert.source_id.clone(),
            trust_tier: alert.trust_tier,
        }
    }
}

/// Alert counts in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefCounts {
    /// Newly created alerts.
    pub new: u64,
    /// Updated alerts.
    pub updated: u64,
    /// Class-2 alerts.
    pub impactful: u64,
    /// Class-1 alerts.
    pub relevant: u64,
    /// Class-0 alerts.
    pub interesting: u64,
}

/// Alert counts by source scope tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Global-tier alerts.
    pub global: u64,
    /// Regional-tier alerts.
    pub regional: u64,
    /// Local-tier alerts.
    pub local: u64,
    /// Alerts with no resolvable tier.
    pub unknown: u64,
}

/// Suppression count for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCount {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Suppressed events attributed to the rule.
    pub count: u64,
}

/// Suppression count for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    /// Source identifier.
    pub source_id: SourceId,
    /// Suppressed events from the source.
    pub count: u64,
}

/// Suppression rollup for the window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressedSummary {
    /// Total suppressed events in the window.
    pub count: u64,
    /// Top rules by count (count desc, rule id asc), capped at five.
    pub by_rule: Vec<RuleCount>,
    /// Top sources by count (count desc, source id asc), capped at five.
    pub by_source: Vec<SourceCount>,
}

/// Versioned brief envelope.
///
/// # Invariants
/// - Partitions hold the declared total order; no tie is implementation-chosen.
/// - Building twice from the same stores at the same cutoff yields identical
///   bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefEnvelope {
    /// Read-model version (`brief.v1`).
    pub read_model_version: String,
    /// Window length in hours.
    pub window_hours: i64,
    /// Window cutoff instant.
    pub cutoff_utc: UtcTimestamp,
    /// Alert counts.
    pub counts: BriefCounts,
    /// Alert counts by tier.
    pub tier_counts: TierCounts,
    /// Top class-2 alerts by impact, capped.
    pub top: Vec<AlertDigest>,
    /// Updated alerts, capped by `limit`.
    pub updated: Vec<AlertDigest>,
    /// Created alerts, capped by `limit`.
    pub created: Vec<AlertDigest>,
    /// Suppression rollup.
    pub suppressed: SuppressedSummary,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Builds the brief envelope from the alert and event stores.
///
/// # Errors
///
/// Returns [`StoreError`] when a repository read fails.
pub fn build(
    alerts: &dyn AlertStore,
    events: &dyn EventStore,
    window: BriefWindow,
    now: UtcTimestamp,
    limits: &BriefLimits,
) -> Result<BriefEnvelope, StoreError> {
    let cutoff = now.minus_hours(window.hours());
    let mut rows = alerts.list_window(cutoff)?;
    if !limits.include_interesting {
        rows.retain(|alert| alert.classification != Classification::Interesting);
    }
    rows.sort_by(alert_order);

    let mut counts = BriefCounts::default();
    let mut tier_counts = TierCounts::default();
    for alert in &rows {
        match alert.correlation_action {
            CorrelationAction::Created => counts.new += 1,
            CorrelationAction::Updated => counts.updated += 1,
        }
        match alert.classification {
            Classification::Impactful => counts.impactful += 1,
            Classification::Relevant => counts.relevant += 1,
            Classification::Interesting => counts.interesting += 1,
        }
        match alert.tier {
            SourceTier::Global => tier_counts.global += 1,
            SourceTier::Regional => tier_counts.regional += 1,
            SourceTier::Local => tier_counts.local += 1,
        }
    }

    let top: Vec<AlertDigest> = rows
        .iter()
        .filter(|alert| alert.classification == Classification::Impactful)
        .take(limits.top_cap)
        .map(AlertDigest::from_alert)
        .collect();
    let updated: Vec<AlertDigest> = rows
        .iter()
        .filter(|alert| alert.correlation_action == CorrelationAction::Updated)
        .take(limits.limit)
        .map(AlertDigest::from_alert)
        .collect();
    let created: Vec<AlertDigest> = rows
        .iter()
        .filter(|alert| alert.correlation_action == CorrelationAction::Created)
        .take(limits.limit)
        .map(AlertDigest::from_alert)
        .collect();

    let suppressed = suppression_rollup(events, cutoff)?;

    Ok(BriefEnvelope {
        read_model_version: READ_MODEL_VERSION.to_string(),
        window_hours: window.hours(),
        cutoff_utc: cutoff,
        counts,
        tier_counts,
        top,
        updated,
        created,
        suppressed,
    })
}

/// Declared total order: classification desc, impact desc, update count desc,
/// last seen desc, alert id asc.
fn alert_order(left: &Alert, right: &Alert) -> Ordering {
    right
        .classification
        .cmp(&left.classification)
        .then_with(|| right.impact_score.cmp(&left.impact_score))
        .then_with(|| right.update_count.cmp(&left.update_count))
        .then_with(|| right.last_seen_utc.cmp(&left.last_seen_utc))
        .then_with(|| left.alert_id.cmp(&right.alert_id))
}

/// Aggregates the suppression rollup with deterministic top-N ordering.
fn suppression_rollup(
    events: &dyn EventStore,
    cutoff: UtcTimestamp,
) -> Result<SuppressedSummary, StoreError> {
    let views = events.list_suppressed_since(cutoff)?;
    let mut by_rule: BTreeMap<RuleId, u64> = BTreeMap::new();
    let mut by_source: BTreeMap<SourceId, u64> = BTreeMap::new();
    for view in &views {
        *by_rule.entry(view.primary_rule_id.clone()).or_default() += 1;
        *by_source.entry(view.source_id.clone()).or_default() += 1;
    }

    let mut rule_counts: Vec<RuleCount> = by_rule
        .into_iter()
        .map(|(rule_id, count)| RuleCount {
            rule_id,
            count,
        })
        .collect();
    rule_counts.sort_by(|left, right| {
        right.count.cmp(&left.count).then_with(|| left.rule_id.cmp(&right.rule_id))
    });
    rule_counts.truncate(ROLLUP_TOP);

    let mut source_counts: Vec<SourceCount> = by_source
        .into_iter()
        .map(|(source_id, count)| SourceCount {
            source_id,
            count,
        })
        .collect();
    source_counts.sort_by(|left, right| {
        right.count.cmp(&left.count).then_with(|| left.source_id.cmp(&right.source_id))
    });
    source_counts.truncate(ROLLUP_TOP);

    Ok(SuppressedSummary {
        count: views.len() as u64,
        by_rule: rule_counts,
        by_source: source_counts,
    })
}
