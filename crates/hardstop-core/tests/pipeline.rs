// crates/hardstop-core/tests/pipeline.rs
// ============================================================================
// Module: Ingest Pipeline Tests
// Description: End-to-end operator chain scenarios over in-memory stores.
// ============================================================================
//! ## Overview
//! Drives the full chain: pinned spill alert creation, duplicate re-ingest,
//! correlated update, suppressed audit-only events, fetch-report recording,
//! cancellation, and RunRecord completeness.

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

use std::collections::BTreeMap;

use hardstop_core::CancellationToken;
use hardstop_core::CorrelationAction;
use hardstop_core::DeterminismContext;
use hardstop_core::DeterminismMode;
use hardstop_core::HashAlgorithm;
use hardstop_core::HashDigest;
use hardstop_core::MergeReason;
use hardstop_core::RawItemStatus;
use hardstop_core::RuleId;
use hardstop_core::RunGroupId;
use hardstop_core::RunId;
use hardstop_core::RunMode;
use hardstop_core::RunPhase;
use hardstop_core::SourceRunStatus;
use hardstop_core::UtcTimestamp;
use hardstop_core::interfaces::RawItemStore;
use hardstop_core::interfaces::ZeroTimer;
use hardstop_core::runtime::OperatorContext;
use hardstop_core::runtime::correlate::CorrelatorConfig;
use hardstop_core::runtime::link::LinkerConfig;
use hardstop_core::runtime::pipeline::FetchReport;
use hardstop_core::runtime::pipeline::IngestPipeline;
use hardstop_core::runtime::pipeline::PipelineError;
use hardstop_core::runtime::pipeline::PipelineStores;
use hardstop_core::runtime::score::ScoreConfig;
use hardstop_core::runtime::suppress::RuleField;
use hardstop_core::runtime::suppress::RuleKind;
use hardstop_core::runtime::suppress::SuppressionEngine;
use hardstop_core::runtime::suppress::SuppressionRule;

use crate::common::MemoryStore;
use crate::common::avon_network;
use crate::common::profile;
use crate::common::raw_item;
use crate::common::ts;

/// Pinned operator context fixture.
fn pinned_ctx(now: UtcTimestamp) -> OperatorContext {
    OperatorContext {
        run_group_id: RunGroupId::new("RG-TEST-1"),
        mode: RunMode::Strict,
        determinism_mode: DeterminismMode::Pinned,
        determinism_context: Some(DeterminismContext {
            seed: "demo-pinned-seed.v1".to_string(),
            pinned_at: now,
            run_id: RunId::new("RUN-pinned"),
        }),
        config_hash: HashDigest::new(HashAlgorithm::Sha256, &[0x42; 32]),
        now,
        no_suppress: false,
    }
}

/// Pipeline fixture with no suppression rules.
fn plain_pipeline() -> IngestPipeline {
    let engine = SuppressionEngine::compile(true, &[], &BTreeMap::new()).expect("compile");
    IngestPipeline::new(
        engine,
        LinkerConfig::default(),
        ScoreConfig::default(),
        CorrelatorConfig::default(),
    )
}

/// Pipeline fixture with the global test-alert keyword rule.
fn suppressing_pipeline() -> IngestPipeline {
    let rule = SuppressionRule {
        id: RuleId::new("global_test_alerts"),
        kind: RuleKind::Keyword,
        field: RuleField::Any,
        pattern: "test".to_string(),
        case_sensitive: false,
        reason_code: "test_alert".to_string(),
    };
    let engine = SuppressionEngine::compile(true, &[rule], &BTreeMap::new()).expect("compile");
    IngestPipeline::new(
        engine,
        LinkerConfig::default(),
        ScoreConfig::default(),
        CorrelatorConfig::default(),
    )
}

/// Wires the in-memory store into a pipeline store set.
fn stores(store: &MemoryStore) -> PipelineStores<'_> {
    PipelineStores {
        raw_items: store,
        events: store,
        alerts: store,
        source_runs: store,
        evidence: store,
        run_records: store,
    }
}

#[test]
fn pinned_spill_run_creates_the_expected_alert() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let ctx = pinned_ctx(now);
    let snapshot = avon_network(now);
    let pipeline = plain_pipeline();

    let item = raw_item(
        "nws_active_us",
        "NWS-2025-12-29-001",
        "Hydrochloric acid spill at Avon, Indiana",
        "Emergency crews responded to a hydrochloric acid spill.",
    );
    store.save(&item).expect("save");

    let report = pipeline
        .run_ingest(&ctx, &stores(&store), &snapshot, &[profile("nws_active_us")], &ZeroTimer, &CancellationToken::new())
        .expect("ingest");

    assert_eq!(report.events_created, 1);
    assert_eq!(report.alerts_touched, 1);
    let alerts = store.all_alerts();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.correlation_key, "SAFETY|PLANT-01|LANE-001");
    assert_eq!(alert.correlation_action, CorrelationAction::Created);
    assert!(alert.alert_id.as_str().starts_with("ALERT-"));
    assert!(alert.evidence_artifact_hash.is_some());
    assert_eq!(alert.scope.shipments_total_linked, 8);
    assert!(alert.scope.shipments_truncated);

    let evidence = store.evidence.lock().unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].determinism_mode, DeterminismMode::Pinned);
    assert_eq!(
        evidence[0].determinism_context.as_ref().map(|context| context.seed.clone()),
        Some("demo-pinned-seed.v1".to_string())
    );
}

#[test]
fn replaying_a_pinned_run_reproduces_the_artifact_hash() {
    let now = ts("2025-12-29T17:00:00Z");
    let item = raw_item(
        "nws_active_us",
        "NWS-2025-12-29-001",
        "Hydrochloric acid spill at Avon, Indiana",
        "Emergency crews responded.",
    );

    let mut hashes = Vec::new();
    for _ in 0 .. 2 {
        let store = MemoryStore::new();
        store.save(&item).expect("save");
        let pipeline = plain_pipeline();
        pipeline
            .run_ingest(
                &pinned_ctx(now),
                &stores(&store),
                &avon_network(now),
                &[profile("nws_active_us")],
                &ZeroTimer,
                &CancellationToken::new(),
            )
            .expect("ingest");
        let evidence = store.evidence.lock().unwrap();
        hashes.push(evidence[0].artifact_hash.clone());
    }
    assert_eq!(hashes[0], hashes[1], "pinned replays must hash identically");
}

#[test]
fn duplicate_raw_item_is_not_reprocessed() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let snapshot = avon_network(now);
    let pipeline = plain_pipeline();
    let item = raw_item(
        "nws_active_us",
        "NWS-2025-12-29-001",
        "Hydrochloric acid spill at Avon, Indiana",
        "Emergency crews responded.",
    );

    assert!(store.save(&item).expect("first save").is_created());
    pipeline
        .run_ingest(
            &pinned_ctx(now),
            &stores(&store),
            &snapshot,
            &[profile("nws_active_us")],
            &ZeroTimer,
            &CancellationToken::new(),
        )
        .expect("first ingest");

    // Replay: the save dedupes and the second ingest sees nothing new.
    assert!(!store.save(&item).expect("second save").is_created());
    let mut ctx = pinned_ctx(now);
    ctx.run_group_id = RunGroupId::new("RG-TEST-2");
    let report = pipeline
        .run_ingest(&ctx, &stores(&store), &snapshot, &[profile("nws_active_us")], &ZeroTimer, &CancellationToken::new())
        .expect("second ingest");

    assert_eq!(report.events_created, 0);
    assert_eq!(report.sources[0].counters.items_processed, 0);
    assert_eq!(report.sources[0].status, SourceRunStatus::Success);
    assert_eq!(store.all_alerts().len(), 1);
    assert_eq!(store.events.lock().unwrap().len(), 1);
}

#[test]
fn correlated_followup_updates_the_alert() {
    let store = MemoryStore::new();
    let first_seen = ts("2025-12-29T17:00:00Z");
    let snapshot = avon_network(first_seen);
    let pipeline = plain_pipeline();

    let mut first = raw_item(
        "nws_active_us",
        "NWS-2025-12-29-001",
        "Hydrochloric acid spill at Avon, Indiana",
        "Emergency crews responded.",
    );
    first.published_at_utc = Some(first_seen);
    store.save(&first).expect("save first");
    pipeline
        .run_ingest(
            &pinned_ctx(first_seen),
            &stores(&store),
            &snapshot,
            &[profile("nws_active_us")],
            &ZeroTimer,
            &CancellationToken::new(),
        )
        .expect("first ingest");

    let later = first_seen.plus_hours(6);
    let mut second = raw_item(
        "nws_active_us",
        "NWS-2025-12-29-002",
        "Cleanup continues after spill at Avon, Indiana",
        "Crews remain on scene of the spill.",
    );
    second.published_at_utc = Some(later);
    second.fetched_at_utc = later;
    store.save(&second).expect("save second");

    let mut ctx = pinned_ctx(later);
    ctx.run_group_id = RunGroupId::new("RG-TEST-2");
    pipeline
        .run_ingest(&ctx, &stores(&store), &snapshot, &[profile("nws_active_us")], &ZeroTimer, &CancellationToken::new())
        .expect("second ingest");

    let alerts = store.all_alerts();
    assert_eq!(alerts.len(), 1, "follow-up folds into the existing alert");
    let alert = &alerts[0];
    assert_eq!(alert.correlation_action, CorrelationAction::Updated);
    assert_eq!(alert.update_count, 2);
    assert_eq!(alert.root_event_ids.len(), 2);
    assert_eq!(alert.first_seen_utc, first_seen);
    assert_eq!(alert.last_seen_utc, later);

    let evidence = store.evidence.lock().unwrap();
    let latest = evidence.last().expect("second artifact");
    assert!(latest.merge_reasons.contains(&MergeReason::SameCorrelationKey));
    assert!(latest.merge_reasons.contains(&MergeReason::SharedFacilities));
    assert!(latest.merge_reasons.contains(&MergeReason::TemporalOverlap));
}

#[test]
fn suppressed_items_become_audit_only_events() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let pipeline = suppressing_pipeline();

    let item = raw_item("nws_active_us", "T-1", "Test Message", "This is only a test.");
    store.save(&item).expect("save");
    let report = pipeline
        .run_ingest(
            &pinned_ctx(now),
            &stores(&store),
            &avon_network(now),
            &[profile("nws_active_us")],
            &ZeroTimer,
            &CancellationToken::new(),
        )
        .expect("ingest");

    assert_eq!(report.items_suppressed, 1);
    assert!(store.all_alerts().is_empty(), "suppressed events never create alerts");

    let events = store.events.lock().unwrap();
    assert_eq!(events.len(), 1, "the audit-trail event row still exists");
    let stamp = events[0].0.suppression.as_ref().expect("stamp");
    assert_eq!(stamp.primary_rule_id, RuleId::new("global_test_alerts"));

    let raw_rows = store.raw_items.lock().unwrap();
    assert_eq!(raw_rows[0].status, RawItemStatus::Suppressed);
}

#[test]
fn no_suppress_evaluates_without_stamping() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let pipeline = suppressing_pipeline();

    let item = raw_item("nws_active_us", "T-2", "Test Message", "This is only a test.");
    store.save(&item).expect("save");
    let mut ctx = pinned_ctx(now);
    ctx.no_suppress = true;
    let report = pipeline
        .run_ingest(
            &ctx,
            &stores(&store),
            &avon_network(now),
            &[profile("nws_active_us")],
            &ZeroTimer,
            &CancellationToken::new(),
        )
        .expect("ingest");

    assert_eq!(report.items_suppressed, 0);
    assert_eq!(store.all_alerts().len(), 1, "the event proceeds to correlation");
    let events = store.events.lock().unwrap();
    assert!(events[0].0.suppression.is_none());
}

#[test]
fn fetch_reports_become_source_run_rows() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let pipeline = plain_pipeline();

    let reports: Vec<FetchReport> = (1 ..= 6)
        .map(|index| FetchReport {
            source_id: hardstop_core::SourceId::new(format!("src_{index}")),
            status: SourceRunStatus::Failure,
            status_code: Some(500),
            error: Some("server error".to_string()),
            items_fetched: 0,
            items_new: 0,
            bytes_downloaded: 0,
            duration_seconds: 0.0,
        })
        .collect();
    pipeline
        .record_fetch_reports(&pinned_ctx(now), &stores(&store), &reports, &ZeroTimer)
        .expect("record");

    let rows = store.source_runs.lock().unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|row| row.phase == RunPhase::Fetch));
    assert!(rows.iter().all(|row| row.status == SourceRunStatus::Failure));
    assert!(rows.iter().all(|row| row.status_code == Some(500)));
}

#[test]
fn cancellation_halts_with_a_failure_row() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let pipeline = plain_pipeline();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let item = raw_item("nws_active_us", "C-1", "Spill at Avon, Indiana", "spill");
    store.save(&item).expect("save");
    let err = pipeline
        .run_ingest(
            &pinned_ctx(now),
            &stores(&store),
            &avon_network(now),
            &[profile("nws_active_us")],
            &ZeroTimer,
            &cancel,
        )
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    let rows = store.source_runs.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SourceRunStatus::Failure);
    assert_eq!(rows[0].error.as_deref(), Some("cancelled"));
}

#[test]
fn every_ingested_item_emits_a_canonicalize_run_record() {
    let store = MemoryStore::new();
    let now = ts("2025-12-29T17:00:00Z");
    let pipeline = plain_pipeline();

    for index in 0 .. 3 {
        let item = raw_item(
            "nws_active_us",
            &format!("R-{index}"),
            "Spill at Avon, Indiana",
            &format!("spill body {index}"),
        );
        store.save(&item).expect("save");
    }
    pipeline
        .run_ingest(
            &pinned_ctx(now),
            &stores(&store),
            &avon_network(now),
            &[profile("nws_active_us")],
            &ZeroTimer,
            &CancellationToken::new(),
        )
        .expect("ingest");

    let records = store.records();
    let canonicalize_records = records
        .iter()
        .filter(|record| record.operator_id.as_str() == "canonicalization.normalize@1.0.0")
        .count();
    assert_eq!(canonicalize_records, 3, "one canonicalize record per item");
    assert!(
        records
            .iter()
            .all(|record| record.started_at <= record.ended_at),
        "records are finalized"
    );
    assert!(
        records
            .iter()
            .all(|record| record.run_group_id.as_str() == "RG-TEST-1"),
        "records share the run group"
    );
    assert!(
        records.iter().all(|record| record.best_effort.is_empty()),
        "strict mode declares no entropy"
    );
}
