// crates/hardstop-core/src/runtime/correlate.rs
// ============================================================================
// Module: Alert Correlator
// Description: Sliding-window deduplication and alert create/update.
// Purpose: Fold correlated events into durable alerts deterministically.
// Dependencies: crate::core, crate::runtime::{link, score}, serde
// ============================================================================

//! ## Overview
//! The correlation key is `<BUCKET>|<FACILITY_ID>|<LANE_ID>`: the bucket
//! comes from a pinned event-type map, and the facility and lane are the
//! lexicographically smallest linked ids (or `*`). An event either creates a
//! new alert or updates the alert sharing its key within a 7-day window.
//! Updates are monotonic: `update_count` grows with `root_event_ids`,
//! `last_seen_utc` never moves backwards, and the impact score takes the max
//! of stored and new. Lookup plus upsert is serialized per key; a conflicting
//! writer is retried once before surfacing as an ingest failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::core::alert::Alert;
use crate::core::alert::AlertEvidence;
use crate::core::alert::AlertScope;
use crate::core::alert::AlertStatus;
use crate::core::alert::Classification;
use crate::core::alert::CorrelationAction;
use crate::core::event::Event;
use crate::core::event::EventType;
use crate::core::hashing::short_token;
use crate::core::identifiers::AlertId;
use crate::core::time::UtcTimestamp;
use crate::interfaces::AlertStore;
use crate::interfaces::StoreError;
use crate::runtime::SourceProfile;
use crate::runtime::link::Linkage;
use crate::runtime::score::ImpactOutcome;

// ============================================================================
// SECTION: Correlation Key
// ============================================================================

/// Wildcard component for keys with no linked facility or lane.
const KEY_WILDCARD: &str = "*";

/// Returns the pinned correlation bucket for an event type.
#[must_use]
pub const fn bucket(event_type: EventType) -> &'static str {
    match event_type {
        EventType::SafetyAndOperations => "SAFETY",
        EventType::Weather => "WEATHER",
        EventType::Recall => "RECALL",
        EventType::Infrastructure => "INFRA",
        EventType::Labor => "LABOR",
        EventType::Cyber => "CYBER",
        EventType::Regulatory => "REGULATORY",
        EventType::Other => "OTHER",
    }
}

/// Correlation key grouping events into one alert within the window.
///
/// # Invariants
/// - Form is `<BUCKET>|<FACILITY_ID>|<LANE_ID>` with `*` wildcards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Derives the key for an event and its linkage.
    #[must_use]
    pub fn derive(event_type: EventType, linkage: &Linkage) -> Self {
        let facility = linkage
            .facilities
            .iter()
            .next()
            .map_or(KEY_WILDCARD.to_string(), |id| id.as_str().to_string());
        let lane = linkage
            .lanes
            .iter()
            .next()
            .map_or(KEY_WILDCARD.to_string(), |id| id.as_str().to_string());
        Self(format!("{}|{facility}|{lane}", bucket(event_type)))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Config and Locks
// ============================================================================

/// Correlator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Sliding window in days (default 7).
    pub window_days: i64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
        }
    }
}

/// Short-lived per-key lock registry serializing lookup plus upsert.
///
/// # Invariants
/// - Locks are scoped to one correlation key, never global.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    /// Lock handles keyed by correlation key text.
    locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl KeyLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock handle for a key, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the registry mutex is poisoned.
    pub fn handle(&self, key: &CorrelationKey) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Conflict(format!("lock registry poisoned for {key}")))?;
        Ok(Arc::clone(locks.entry(key.as_str().to_string()).or_default()))
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of applying one event to the alert store.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationOutcome {
    /// Alert after the create or update.
    pub alert: Alert,
    /// Action taken.
    pub action: CorrelationAction,
    /// Prior alert state for evidence building (updates only).
    pub prior: Option<Alert>,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Applies one scored event to the alert store.
///
/// Suppressed events must not reach this operator; the pipeline routes them
/// to the audit trail instead.
///
/// # Errors
///
/// Returns [`StoreError`] when the window lookup or upsert fails after the
/// single conflict retry.
#[allow(clippy::too_many_arguments, reason = "operator wiring mirrors the pipeline call site")]
pub fn apply(
    event: &Event,
    linkage: &Linkage,
    impact: &ImpactOutcome,
    profile: &SourceProfile,
    store: &dyn AlertStore,
    locks: &KeyLockRegistry,
    observed_at: UtcTimestamp,
    config: &CorrelatorConfig,
) -> Result<CorrelationOutcome, StoreError> {
    let key = CorrelationKey::derive(event.event_type, linkage);
    let handle = locks.handle(&key)?;

    match apply_locked(event, linkage, impact, profile, store, &handle, &key, observed_at, config) {
        Err(StoreError::Conflict(first)) => {
            // One retry per the correlation-conflict policy; the second
            // failure surfaces as an ingest failure for this source.
            apply_locked(event, linkage, impact, profile, store, &handle, &key, observed_at, config)
                .map_err(|err| match err {
                    StoreError::Conflict(second) => {
                        StoreError::Conflict(format!("{first}; retry failed: {second}"))
                    }
                    other => other,
                })
        }
        other => other,
    }
}

/// Performs the serialized lookup plus upsert under the key lock.
#[allow(clippy::too_many_arguments, reason = "operator wiring mirrors the pipeline call site")]
fn apply_locked(
    event: &Event,
    linkage: &Linkage,
    impact: &ImpactOutcome,
    profile: &SourceProfile,
    store: &dyn AlertStore,
    handle: &Arc<Mutex<()>>,
    key: &CorrelationKey,
    observed_at: UtcTimestamp,
    config: &CorrelatorConfig,
) -> Result<CorrelationOutcome, StoreError> {
    let _guard = handle
        .lock()
        .map_err(|_| StoreError::Conflict(format!("key lock poisoned for {key}")))?;

    let window_start = observed_at.minus_days(config.window_days);
    let existing = store.find_in_window(key.as_str(), window_start)?;

    let outcome = existing.map_or_else(
        || create_alert(event, linkage, impact, key, observed_at),
        |prior| update_alert(&prior, event, linkage, impact, profile, observed_at),
    );
    store.upsert(&outcome.alert)?;
    Ok(outcome)
}

/// Builds a new alert for an uncorrelated event.
fn create_alert(
    event: &Event,
    linkage: &Linkage,
    impact: &ImpactOutcome,
    key: &CorrelationKey,
    observed_at: UtcTimestamp,
) -> CorrelationOutcome {
    let alert_id = derive_alert_id(key, event, observed_at);
    let alert = Alert {
        alert_id,
        risk_type: bucket(event.event_type).to_string(),
        classification: impact.classification,
        status: AlertStatus::Open,
        summary: event.title.clone(),
        root_event_id: event.event_id.clone(),
        scope: scope_from_linkage(linkage),
        impact_score: impact.score,
        correlation_key: key.as_str().to_string(),
        correlation_action: CorrelationAction::Created,
        first_seen_utc: observed_at,
        last_seen_utc: observed_at,
        update_count: 1,
        root_event_ids: vec![event.event_id.clone()],
        tier: event.tier,
        source_id: event.source_id.clone(),
        trust_tier: event.trust_tier,
        evidence: AlertEvidence {
            diagnostics: Vec::new(),
            linking_notes: linkage.notes.clone(),
            source_metadata: event.source_metadata.clone(),
            impact_score_rationale: impact.rationale.clone(),
        },
        evidence_artifact_hash: None,
    };
    CorrelationOutcome {
        alert,
        action: CorrelationAction::Created,
        prior: None,
    }
}

/// Folds an event into an existing alert.
fn update_alert(
    prior: &Alert,
    event: &Event,
    linkage: &Linkage,
    impact: &ImpactOutcome,
    profile: &SourceProfile,
    observed_at: UtcTimestamp,
) -> CorrelationOutcome {
    let mut alert = prior.clone();

    alert.root_event_ids.push(event.event_id.clone());
    alert.update_count = alert.update_count.saturating_add(1);
    alert.last_seen_utc = alert.last_seen_utc.max(observed_at);
    alert.correlation_action = CorrelationAction::Updated;

    // Scope union: facility/lane sets merge; shipments are the re-queried
    // list so the truncation rules stay authoritative.
    let fresh = scope_from_linkage(linkage);
    alert.scope.facilities.extend(fresh.facilities);
    alert.scope.lanes.extend(fresh.lanes);
    alert.scope.shipments = fresh.shipments;
    alert.scope.shipments_total_linked = fresh.shipments_total_linked;
    alert.scope.shipments_truncated = fresh.shipments_truncated;

    alert.tier = event.tier;
    alert.source_id = event.source_id.clone();
    alert.trust_tier = event.trust_tier;

    alert.impact_score = alert.impact_score.max(impact.score);
    alert.classification =
        Classification::from_score(alert.impact_score).max(profile.classification_floor);

    alert.evidence.linking_notes = linkage.notes.clone();
    alert.evidence.source_metadata = event.source_metadata.clone();
    alert.evidence.impact_score_rationale = impact.rationale.clone();

    CorrelationOutcome {
        alert,
        action: CorrelationAction::Updated,
        prior: Some(prior.clone()),
    }
}

/// Derives the deterministic alert identifier.
///
/// `ALERT-<yyyymmdd of first_seen>-<short8 of key|root_event>`.
#[must_use]
pub fn derive_alert_id(
    key: &CorrelationKey,
    event: &Event,
    observed_at: UtcTimestamp,
) -> AlertId {
    let basis = format!("{}|{}", key.as_str(), event.event_id);
    AlertId::new(format!(
        "ALERT-{}-{}",
        observed_at.render_compact_date(),
        short_token(&basis, 8)
    ))
}

/// Converts a linkage into an alert scope.
fn scope_from_linkage(linkage: &Linkage) -> AlertScope {
    AlertScope {
        facilities: linkage.facilities.clone(),
        lanes: linkage.lanes.clone(),
        shipments: linkage.shipments.clone(),
        shipments_total_linked: linkage.shipments_total_linked,
        shipments_truncated: linkage.shipments_truncated,
    }
}
