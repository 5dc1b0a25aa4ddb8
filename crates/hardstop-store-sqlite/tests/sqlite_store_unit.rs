// crates/hardstop-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Validates migrations, dedupe, ordering, and window queries.
// ============================================================================
//! ## Overview
//! Covers idempotent migrations, raw-item deduplication by canonical id and
//! content hash, ingest ordering, source-run uniqueness and windows, the
//! alert correlation-window query, and evidence round-trips.

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

use std::collections::BTreeMap;

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
use hardstop_core::RawItem;
use hardstop_core::RawItemId;
use hardstop_core::RawItemStatus;
use hardstop_core::RunGroupId;
use hardstop_core::RunPhase;
use hardstop_core::ScoreModifiers;
use hardstop_core::ScoreTrace;
use hardstop_core::SourceId;
use hardstop_core::SourceRun;
use hardstop_core::SourceRunCounters;
use hardstop_core::SourceRunStatus;
use hardstop_core::SourceTier;
use hardstop_core::TrustTier;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing::DEFAULT_HASH_ALGORITHM;
use hardstop_core::hashing::hash_bytes;
use hardstop_core::interfaces::AlertStore;
use hardstop_core::interfaces::RawItemStore;
use hardstop_core::interfaces::SourceRunStore;
use hardstop_store_sqlite::HardstopStore;

/// Timestamp fixture from an RFC 3339 literal.
fn ts(text: &str) -> UtcTimestamp {
    UtcTimestamp::parse(text).expect("fixture timestamp")
}

/// Raw item fixture.
fn raw(source: &str, canonical_id: &str, body: &str, fetched_at: UtcTimestamp) -> RawItem {
    RawItem {
        raw_item_id: RawItemId::new(format!("RI-{source}-{canonical_id}")),
        source_id: SourceId::new(source),
        canonical_id: canonical_id.to_string(),
        content_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, body.as_bytes()),
        title: body.to_string(),
        summary: String::new(),
        raw_text: body.to_string(),
        url: None,
        published_at_utc: None,
        fetched_at_utc: fetched_at,
        status: RawItemStatus::New,
        suppression: None,
        trust_tier: TrustTier::Standard,
        tier: SourceTier::Regional,
    }
}

/// Alert fixture.
fn alert(id: &str, key: &str, seen: UtcTimestamp) -> Alert {
    Alert {
        alert_id: AlertId::new(id),
        risk_type: "SAFETY".to_string(),
        classification: Classification::Relevant,
        status: AlertStatus::Open,
        summary: format!("alert {id}"),
        root_event_id: EventId::new(format!("EVT-{id}")),
        scope: AlertScope::default(),
        impact_score: 5,
        correlation_key: key.to_string(),
        correlation_action: CorrelationAction::Created,
        first_seen_utc: seen,
        last_seen_utc: seen,
        update_count: 1,
        root_event_ids: vec![EventId::new(format!("EVT-{id}"))],
        tier: SourceTier::Global,
        source_id: SourceId::new("src_a"),
        trust_tier: TrustTier::High,
        evidence: AlertEvidence {
            diagnostics: Vec::new(),
            linking_notes: Vec::new(),
            source_metadata: BTreeMap::new(),
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

/// Source run fixture.
fn source_run(group: &str, phase: RunPhase, status: SourceRunStatus, at: UtcTimestamp) -> SourceRun {
    SourceRun {
        run_group_id: RunGroupId::new(group),
        phase,
        source_id: SourceId::new("src_a"),
        status,
        status_code: None,
        error: None,
        duration_seconds: 0.25,
        counters: SourceRunCounters::default(),
        diagnostics: BTreeMap::new(),
        run_at_utc: at,
    }
}

#[test]
fn migrations_are_idempotent_across_reopens() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("hardstop.db");

    let first = HardstopStore::open(&path).expect("first open");
    drop(first);
    let second = HardstopStore::open(&path).expect("second open applies nothing new");
    assert!(second.schema_findings().expect("findings").is_empty());
}

#[test]
fn save_dedupes_by_canonical_id_then_content_hash() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T16:30:00Z");

    let item = raw("src_a", "C-1", "body one", now);
    assert!(store.save(&item).expect("first save").is_created());

    // Same (source, canonical_id): duplicate without a write.
    let same_canonical = raw("src_a", "C-1", "different body", now);
    let outcome = store.save(&same_canonical).expect("second save");
    assert!(!outcome.is_created());

    // Different canonical id, same content hash: still a duplicate.
    let same_content = raw("src_a", "C-2", "body one", now);
    assert!(!store.save(&same_content).expect("third save").is_created());

    // Genuinely new payloads persist.
    assert!(store.save(&raw("src_a", "C-3", "body three", now)).expect("fourth save").is_created());
    assert_eq!(store.list_for_ingest(None, false).expect("list").len(), 2);
}

#[test]
fn list_for_ingest_orders_by_fetch_time_then_id() {
    let store = HardstopStore::open_in_memory().expect("open");
    let early = ts("2025-12-29T10:00:00Z");
    let late = ts("2025-12-29T12:00:00Z");

    store.save(&raw("src_a", "B", "body b", late)).expect("save b");
    store.save(&raw("src_a", "A", "body a", early)).expect("save a");
    store.save(&raw("src_a", "C", "body c", early)).expect("save c");

    let items = store.list_for_ingest(None, false).expect("list");
    let ids: Vec<&str> = items.iter().map(|item| item.raw_item_id.as_str()).collect();
    assert_eq!(ids, vec!["RI-src_a-A", "RI-src_a-C", "RI-src_a-B"]);
}

#[test]
fn processed_items_leave_the_ingest_queue() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T10:00:00Z");
    let item = raw("src_a", "P-1", "body", now);
    store.save(&item).expect("save");

    store.mark_processed(&item.raw_item_id, false).expect("mark");
    assert!(store.list_for_ingest(None, false).expect("list").is_empty());
}

#[test]
fn alert_window_query_honors_key_and_cutoff() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T17:00:00Z");

    store.upsert(&alert("A-OLD", "SAFETY|P|L", now.minus_days(10))).expect("old");
    store.upsert(&alert("A-NEW", "SAFETY|P|L", now.minus_hours(5))).expect("new");
    store.upsert(&alert("A-OTHER", "WEATHER|P|L", now.minus_hours(1))).expect("other key");

    let found = store
        .find_in_window("SAFETY|P|L", now.minus_days(7))
        .expect("query")
        .expect("present");
    assert_eq!(found.alert_id.as_str(), "A-NEW");

    let missing = store.find_in_window("SAFETY|P|L", now.plus_hours(1)).expect("query");
    assert!(missing.is_none());
}

#[test]
fn alert_upsert_replaces_by_id() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T17:00:00Z");
    let mut row = alert("A-1", "SAFETY|P|L", now);
    store.upsert(&row).expect("insert");

    row.update_count = 2;
    row.last_seen_utc = now.plus_hours(1);
    store.upsert(&row).expect("replace");

    let loaded = store.get(&AlertId::new("A-1")).expect("get").expect("present");
    assert_eq!(loaded.update_count, 2);
    assert_eq!(loaded.last_seen_utc, now.plus_hours(1));
}

#[test]
fn source_runs_are_unique_per_phase_source_group() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T17:00:00Z");
    let row = source_run("g1", RunPhase::Fetch, SourceRunStatus::Success, now);

    store.append(&row).expect("first append");
    assert!(store.append(&row).is_err(), "duplicate row must be rejected");

    let ingest_row = source_run("g1", RunPhase::Ingest, SourceRunStatus::Success, now);
    store.append(&ingest_row).expect("different phase is a different row");
}

#[test]
fn recent_runs_return_newest_first_with_limit() {
    let store = HardstopStore::open_in_memory().expect("open");
    let base = ts("2025-12-29T00:00:00Z");
    for index in 0 .. 12 {
        store
            .append(&source_run(
                &format!("g{index}"),
                RunPhase::Fetch,
                SourceRunStatus::Success,
                base.plus_hours(index),
            ))
            .expect("append");
    }

    let recent = store.recent(&SourceId::new("src_a"), RunPhase::Fetch, 10).expect("recent");
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].run_at_utc, base.plus_hours(11), "newest first");
}

#[test]
fn last_success_ignores_failures() {
    let store = HardstopStore::open_in_memory().expect("open");
    let now = ts("2025-12-29T12:00:00Z");
    store
        .append(&source_run("g1", RunPhase::Fetch, SourceRunStatus::Success, now.minus_hours(5)))
        .expect("success");
    store
        .append(&source_run("g2", RunPhase::Fetch, SourceRunStatus::Failure, now))
        .expect("failure");

    let last = store.last_success_at(&SourceId::new("src_a")).expect("query").expect("present");
    assert_eq!(last, now.minus_hours(5));
}
