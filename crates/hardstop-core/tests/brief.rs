// crates/hardstop-core/tests/brief.rs
// ============================================================================
// Module: Brief Read-Model Tests
// Description: Validates ordering, partitions, counts, and byte stability.
// ============================================================================
//! ## Overview
//! Covers the declared total order with alert-id tie-breaks, the updated and
//! created partitions, counts and tier counts, the suppression rollup, and
//! the build-twice byte-identity law.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use hardstop_core::Alert;
use hardstop_core::AlertEvidence;
use hardstop_core::AlertId;
use hardstop_core::AlertScope;
use hardstop_core::AlertStatus;
use hardstop_core::Classification;
use hardstop_core::CorrelationAction;
use hardstop_core::EventId;
use hardstop_core::ImpactRationale;
use hardstop_core::NetworkCriticality;
use hardstop_core::ScoreModifiers;
use hardstop_core::ScoreTrace;
use hardstop_core::SourceId;
use hardstop_core::SourceTier;
use hardstop_core::TrustTier;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing::canonical_json_bytes;
use hardstop_core::interfaces::AlertStore;
use hardstop_core::interfaces::EventStore;
use hardstop_core::runtime::brief::BriefLimits;
use hardstop_core::runtime::brief::BriefWindow;
use hardstop_core::runtime::brief::build;
use hardstop_core::SuppressionStage;
use hardstop_core::SuppressionStamp;
use hardstop_core::runtime::canonicalize::normalize;

use crate::common::MemoryStore;
use crate::common::profile;
use crate::common::raw_item;
use crate::common::ts;

/// Builds a minimal alert fixture.
fn alert(
    id: &str,
    classification: Classification,
    impact_score: u8,
    update_count: u64,
    action: CorrelationAction,
    seen: UtcTimestamp,
) -> Alert {
    Alert {
        alert_id: AlertId::new(id),
        risk_type: "SAFETY".to_string(),
        classification,
        status: AlertStatus::Open,
        summary: format!("alert {id}"),
        root_event_id: EventId::new(format!("EVT-{id}")),
        scope: AlertScope::default(),
        impact_score,
        correlation_key: format!("SAFETY|{id}|*"),
        correlation_action: action,
        first_seen_utc: seen,
        last_seen_utc: seen,
        update_count,
        root_event_ids: vec![EventId::new(format!("EVT-{id}"))],
        tier: SourceTier::Global,
        source_id: SourceId::new("nws_active_us"),
        trust_tier: TrustTier::High,
        evidence: AlertEvidence {
            diagnostics: Vec::new(),
            linking_notes: Vec::new(),
            source_metadata: std::collections::BTreeMap::new(),
            impact_score_rationale: ImpactRationale {
                network_criticality: NetworkCriticality::default(),
                modifiers: ScoreModifiers {
                    trust_tier: TrustTier::High,
                    trust_tier_delta: 1,
                    weighting_bias_delta: 0,
                },
                suppression_context: None,
                score_trace: ScoreTrace::default(),
            },
        },
        evidence_artifact_hash: None,
    }
}

/// Stores a suppressed event fixture for the rollup.
fn store_suppressed(store: &MemoryStore, canonical_id: &str, rule: &str, at: UtcTimestamp) {
    let item = raw_item("nws_active_us", canonical_id, "Test Message", "test body");
    let mut event = normalize(&item, &profile("nws_active_us")).event;
    event.suppression = Some(SuppressionStamp {
        primary_rule_id: hardstop_core::RuleId::new(rule),
        rule_ids: vec![hardstop_core::RuleId::new(rule)],
        reason_code: "test".to_string(),
        suppressed_at: at,
        stage: SuppressionStage::Normalize,
    });
    store.insert(&event, at).expect("insert suppressed event");
}

#[test]
fn alerts_follow_the_declared_total_order() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let seen = now.minus_hours(1);

    // Same classification and score: update_count breaks the tie, then id.
    store.upsert(&alert("B", Classification::Impactful, 8, 1, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("A", Classification::Impactful, 8, 1, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("C", Classification::Impactful, 8, 3, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("D", Classification::Relevant, 9, 9, CorrelationAction::Created, seen)).unwrap();

    let envelope =
        build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    let order: Vec<&str> =
        envelope.created.iter().map(|digest| digest.alert_id.as_str()).collect();
    // C (more updates) before A/B (id tie-break); D last despite higher score
    // because classification dominates.
    assert_eq!(order, vec!["C", "A", "B", "D"]);
}

#[test]
fn partitions_split_on_correlation_action() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let seen = now.minus_hours(2);

    store.upsert(&alert("N1", Classification::Relevant, 5, 1, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("U1", Classification::Relevant, 5, 2, CorrelationAction::Updated, seen)).unwrap();

    let envelope =
        build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    assert_eq!(envelope.counts.new, 1);
    assert_eq!(envelope.counts.updated, 1);
    assert_eq!(envelope.created.len(), 1);
    assert_eq!(envelope.updated.len(), 1);
    assert_eq!(envelope.created[0].alert_id.as_str(), "N1");
    assert_eq!(envelope.updated[0].alert_id.as_str(), "U1");
}

#[test]
fn top_is_capped_to_class_two_alerts() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let seen = now.minus_hours(1);

    for index in 0 .. 4 {
        store
            .upsert(&alert(
                &format!("T{index}"),
                Classification::Impactful,
                9,
                1,
                CorrelationAction::Created,
                seen,
            ))
            .unwrap();
    }
    store.upsert(&alert("R1", Classification::Relevant, 6, 1, CorrelationAction::Created, seen)).unwrap();

    let envelope =
        build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    assert_eq!(envelope.top.len(), 2, "top cap defaults to 2");
    assert!(envelope.top.iter().all(|digest| digest.classification == Classification::Impactful));
}

#[test]
fn window_cutoff_excludes_old_alerts() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");

    store
        .upsert(&alert("OLD", Classification::Relevant, 5, 1, CorrelationAction::Created, now.minus_days(4)))
        .unwrap();
    store
        .upsert(&alert("NEW", Classification::Relevant, 5, 1, CorrelationAction::Created, now.minus_hours(3)))
        .unwrap();

    let day = build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    assert_eq!(day.created.len(), 1);
    assert_eq!(day.created[0].alert_id.as_str(), "NEW");

    let week =
        build(&store, &store, BriefWindow::Hours168, now, &BriefLimits::default()).expect("brief");
    assert_eq!(week.created.len(), 2);
}

#[test]
fn interesting_alerts_can_be_excluded() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let seen = now.minus_hours(1);

    store.upsert(&alert("I1", Classification::Interesting, 2, 1, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("R1", Classification::Relevant, 5, 1, CorrelationAction::Created, seen)).unwrap();

    let limits = BriefLimits {
        include_interesting: false,
        ..BriefLimits::default()
    };
    let envelope = build(&store, &store, BriefWindow::Hours24, now, &limits).expect("brief");
    assert_eq!(envelope.created.len(), 1);
    assert_eq!(envelope.counts.interesting, 0);
}

#[test]
fn suppression_rollup_counts_by_rule_and_source() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let at = now.minus_hours(1);

    store_suppressed(&store, "S-1", "global_test_alerts", at);
    store_suppressed(&store, "S-2", "global_test_alerts", at);
    store_suppressed(&store, "S-3", "other_rule", at);

    let envelope =
        build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    assert_eq!(envelope.suppressed.count, 3);
    assert_eq!(envelope.suppressed.by_rule[0].rule_id.as_str(), "global_test_alerts");
    assert_eq!(envelope.suppressed.by_rule[0].count, 2);
    assert_eq!(envelope.suppressed.by_source[0].count, 3);
}

#[test]
fn building_twice_yields_identical_bytes() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let seen = now.minus_hours(1);
    store.upsert(&alert("A", Classification::Impactful, 8, 1, CorrelationAction::Created, seen)).unwrap();
    store.upsert(&alert("B", Classification::Relevant, 5, 2, CorrelationAction::Updated, seen)).unwrap();
    store_suppressed(&store, "S-1", "global_test_alerts", seen);

    let first =
        build(&store, &store, BriefWindow::Hours72, now, &BriefLimits::default()).expect("first");
    let second =
        build(&store, &store, BriefWindow::Hours72, now, &BriefLimits::default()).expect("second");

    let bytes_first = canonical_json_bytes(&first).expect("bytes first");
    let bytes_second = canonical_json_bytes(&second).expect("bytes second");
    assert_eq!(bytes_first, bytes_second);
}

#[test]
fn read_model_version_is_stamped() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let envelope =
        build(&store, &store, BriefWindow::Hours24, now, &BriefLimits::default()).expect("brief");
    assert_eq!(envelope.read_model_version, "brief.v1");
    assert_eq!(envelope.window_hours, 24);
}
