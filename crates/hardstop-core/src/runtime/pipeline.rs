// crates/hardstop-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Ingest Pipeline
// Description: Sequences the operator chain over stored raw items.
// Purpose: Drive canonicalize, suppress, link, score, correlate, and evidence
//          with per-source confinement and guaranteed provenance.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The pipeline is a single-threaded cooperative chain: sources are walked
//! in ascending id order, items within a source in store order. The
//! cancellation token is consulted between operators and between items; on
//! cancellation the in-flight operator finalizes its RunRecord with a
//! `cancelled` error and the pipeline halts. Item and source errors are
//! confined (a failing source yields a FAILURE SourceRun and the walk
//! continues); the first unrecoverable error halts after finalization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::SourceId;
use crate::core::network::NetworkSnapshot;
use crate::core::provenance::ArtifactKind;
use crate::core::provenance::ArtifactRef;
use crate::core::provenance::RunRecordBuilder;
use crate::core::signal::RawItem;
use crate::core::signal::SuppressionStage;
use crate::core::signal::SuppressionStamp;
use crate::core::telemetry::RunPhase;
use crate::core::telemetry::SourceRun;
use crate::core::telemetry::SourceRunCounters;
use crate::core::telemetry::SourceRunStatus;
use crate::interfaces::AlertStore;
use crate::interfaces::CancellationToken;
use crate::interfaces::EventStore;
use crate::interfaces::EvidenceStore;
use crate::interfaces::RawItemStore;
use crate::interfaces::RunRecordStore;
use crate::interfaces::RunTimer;
use crate::interfaces::SourceRunStore;
use crate::interfaces::StoreError;
use crate::runtime::OP_CANONICALIZE;
use crate::runtime::OP_CORRELATE;
use crate::runtime::OP_EVIDENCE;
use crate::runtime::OP_FETCH_RECORD;
use crate::runtime::OP_LINK;
use crate::runtime::OP_SCORE;
use crate::runtime::OP_SUPPRESS;
use crate::runtime::OperatorContext;
use crate::runtime::SourceProfile;
use crate::runtime::canonicalize;
use crate::runtime::correlate;
use crate::runtime::correlate::CorrelatorConfig;
use crate::runtime::correlate::KeyLockRegistry;
use crate::runtime::evidence_build;
use crate::runtime::link;
use crate::runtime::link::LinkerConfig;
use crate::runtime::score;
use crate::runtime::score::ScoreConfig;
use crate::runtime::status::IngestOutcome;
use crate::runtime::suppress::SuppressionEngine;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline errors that halt the walk.
///
/// # Invariants
/// - Raised only after the in-flight RunRecord is finalized and appended.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Cancellation was requested.
    #[error("pipeline cancelled")]
    Cancelled,
    /// A repository operation failed unrecoverably.
    #[error("pipeline store failure: {0}")]
    Store(#[from] StoreError),
    /// Canonical hashing failed for an artifact reference.
    #[error("pipeline hash failure: {0}")]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Stores and Reports
// ============================================================================

/// Repository handles the pipeline writes through.
pub struct PipelineStores<'stores> {
    /// Raw item repository.
    pub raw_items: &'stores dyn RawItemStore,
    /// Event repository.
    pub events: &'stores dyn EventStore,
    /// Alert repository.
    pub alerts: &'stores dyn AlertStore,
    /// Source run repository.
    pub source_runs: &'stores dyn SourceRunStore,
    /// Incident evidence repository.
    pub evidence: &'stores dyn EvidenceStore,
    /// Run record sink.
    pub run_records: &'stores dyn RunRecordStore,
}

/// Fetch outcome reported by the ingestion collaborator for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Source under report.
    pub source_id: SourceId,
    /// Fetch status.
    pub status: SourceRunStatus,
    /// Transport status code when applicable.
    pub status_code: Option<u16>,
    /// Error message on failure (truncated on store).
    pub error: Option<String>,
    /// Items fetched.
    pub items_fetched: u64,
    /// Items newly persisted.
    pub items_new: u64,
    /// Bytes downloaded.
    pub bytes_downloaded: u64,
    /// Fetch duration in seconds.
    pub duration_seconds: f64,
}

/// Per-source ingest summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIngestSummary {
    /// Source under summary.
    pub source_id: SourceId,
    /// Ingest status.
    pub status: SourceRunStatus,
    /// Final counters recorded on the SourceRun row.
    pub counters: SourceRunCounters,
}

/// Ingest execution report for the run-status evaluator and hosts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Per-source summaries in walk order.
    pub sources: Vec<SourceIngestSummary>,
    /// Events created across all sources.
    pub events_created: u64,
    /// Alerts created or updated across all sources.
    pub alerts_touched: u64,
    /// Items suppressed across all sources.
    pub items_suppressed: u64,
    /// True when ingest halted before completing any source.
    pub aborted_before_any: bool,
}

impl IngestReport {
    /// Projects per-source ingest outcomes for the status evaluator.
    #[must_use]
    pub fn outcomes(&self) -> Vec<IngestOutcome> {
        self.sources
            .iter()
            .map(|summary| IngestOutcome {
                source_id: summary.source_id.clone(),
                status: summary.status,
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Configured ingest pipeline.
///
/// # Invariants
/// - Operator configs are part of the resolved snapshot behind `config_hash`.
pub struct IngestPipeline {
    /// Compiled suppression engine.
    pub engine: SuppressionEngine,
    /// Linker configuration.
    pub linker_config: LinkerConfig,
    /// Scorer configuration.
    pub score_config: ScoreConfig,
    /// Correlator configuration.
    pub correlator_config: CorrelatorConfig,
    /// Per-key lock registry serializing correlation upserts.
    pub locks: KeyLockRegistry,
}

impl IngestPipeline {
    /// Builds a pipeline from a compiled engine and operator configs.
    #[must_use]
    pub fn new(
        engine: SuppressionEngine,
        linker_config: LinkerConfig,
        score_config: ScoreConfig,
        correlator_config: CorrelatorConfig,
    ) -> Self {
        Self {
            engine,
            linker_config,
            score_config,
            correlator_config,
            locks: KeyLockRegistry::new(),
        }
    }

    /// Records collaborator fetch reports as FETCH SourceRun rows.
    ///
    /// Emits one RunRecord for the whole recording pass, referencing every
    /// row it wrote.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a row or the record cannot be written.
    pub fn record_fetch_reports(
        &self,
        ctx: &OperatorContext,
        stores: &PipelineStores<'_>,
        reports: &[FetchReport],
        timer: &dyn RunTimer,
    ) -> Result<(), PipelineError> {
        let mut builder = RunRecordBuilder::begin(
            ctx.derive_run_id(OP_FETCH_RECORD, 0),
            ctx.operator(OP_FETCH_RECORD),
            ctx.now,
            ctx.mode,
            ctx.config_hash.clone(),
            ctx.run_group_id.clone(),
        );

        let mut failure: Option<StoreError> = None;
        for report in reports {
            let row = SourceRun {
                run_group_id: ctx.run_group_id.clone(),
                phase: RunPhase::Fetch,
                source_id: report.source_id.clone(),
                status: report.status,
                status_code: report.status_code,
                error: report.error.as_deref().map(SourceRun::truncate_error),
                duration_seconds: report.duration_seconds,
                counters: SourceRunCounters {
                    items_fetched: report.items_fetched,
                    items_new: report.items_new,
                    bytes_downloaded: report.bytes_downloaded,
                    ..SourceRunCounters::default()
                },
                diagnostics: BTreeMap::new(),
                run_at_utc: ctx.now,
            };
            match stores.source_runs.append(&row) {
                Ok(()) => {
                    let hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &row)?;
                    builder.record_output(ArtifactRef {
                        id: format!("{}:{}", row.phase.as_str(), row.source_id),
                        kind: ArtifactKind::SourceRun,
                        hash,
                    });
                }
                Err(err) => {
                    builder.error(err.to_string());
                    failure = Some(err);
                    break;
                }
            }
        }

        let record = builder.finalize(ctx.now, timer.elapsed_seconds());
        stores.run_records.append(&record)?;
        failure.map_or(Ok(()), |err| Err(PipelineError::Store(err)))
    }

    /// Runs ingest over every enabled source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] when the token fires, or a store
    /// error when a write outside per-source confinement fails.
    pub fn run_ingest(
        &self,
        ctx: &OperatorContext,
        stores: &PipelineStores<'_>,
        snapshot: &NetworkSnapshot,
        profiles: &[SourceProfile],
        timer: &dyn RunTimer,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, PipelineError> {
        let mut report = IngestReport {
            aborted_before_any: true,
            ..IngestReport::default()
        };

        let items = stores.raw_items.list_for_ingest(None, false)?;
        let mut by_source: BTreeMap<&SourceId, Vec<&RawItem>> = BTreeMap::new();
        for item in &items {
            by_source.entry(&item.source_id).or_default().push(item);
        }

        let mut enabled: Vec<&SourceProfile> =
            profiles.iter().filter(|profile| profile.enabled).collect();
        enabled.sort_by(|left, right| left.source_id.cmp(&right.source_id));

        for (index, profile) in enabled.iter().enumerate() {
            if cancel.is_cancelled() {
                self.append_cancelled_row(ctx, stores, &profile.source_id, timer)?;
                return Err(PipelineError::Cancelled);
            }
            let sequence = u64::try_from(index).unwrap_or(u64::MAX);
            let source_items = by_source.get(&profile.source_id).map_or(&[][..], Vec::as_slice);
            let summary = self
                .ingest_source(ctx, stores, snapshot, *profile, source_items, sequence, timer, cancel)?;
            report.events_created += summary.counters.items_events_created;
            report.alerts_touched += summary.counters.items_alerts_touched;
            report.items_suppressed += summary.counters.items_suppressed;
            report.sources.push(summary);
            report.aborted_before_any = false;
        }
        if enabled.is_empty() {
            report.aborted_before_any = false;
        }
        Ok(report)
    }

    /// Ingests all pending items for one source with error confinement.
    #[allow(clippy::too_many_arguments, reason = "operator wiring mirrors the run loop")]
    fn ingest_source(
        &self,
        ctx: &OperatorContext,
        stores: &PipelineStores<'_>,
        snapshot: &NetworkSnapshot,
        profile: &SourceProfile,
        items: &[&RawItem],
        sequence: u64,
        timer: &dyn RunTimer,
        cancel: &CancellationToken,
    ) -> Result<SourceIngestSummary, PipelineError> {
        let mut counters = SourceRunCounters::default();
        let mut status = SourceRunStatus::Success;
        let mut diagnostics = BTreeMap::new();
        let mut records = StageRecords::begin(ctx, sequence);

        for (item_index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                records.error_all("cancelled");
                records.finalize_into(stores, ctx, timer)?;
                self.append_cancelled_row(ctx, stores, &profile.source_id, timer)?;
                return Err(PipelineError::Cancelled);
            }

            counters.items_processed += 1;
            let item_sequence = sequence * 10_000 + u64::try_from(item_index).unwrap_or(u64::MAX);
            match self.ingest_item(
                ctx,
                stores,
                snapshot,
                profile,
                *item,
                item_sequence,
                timer,
                &mut records,
            ) {
                Ok(outcome) => {
                    counters.items_events_created += 1;
                    if outcome.suppressed {
                        counters.items_suppressed += 1;
                    }
                    if outcome.alert_touched {
                        counters.items_alerts_touched += 1;
                    }
                }
                Err(err) => {
                    status = SourceRunStatus::Failure;
                    diagnostics
                        .insert(format!("item:{}", item.raw_item_id), err.to_string());
                    records.correlate.error(err.to_string());
                }
            }
        }

        let elapsed = timer.elapsed_seconds();
        records.finalize_into(stores, ctx, timer)?;

        let row = SourceRun {
            run_group_id: ctx.run_group_id.clone(),
            phase: RunPhase::Ingest,
            source_id: profile.source_id.clone(),
            status,
            status_code: None,
            error: diagnostics.values().next().map(|message| SourceRun::truncate_error(message)),
            duration_seconds: elapsed,
            counters,
            diagnostics,
            run_at_utc: ctx.now,
        };
        stores.source_runs.append(&row)?;

        Ok(SourceIngestSummary {
            source_id: profile.source_id.clone(),
            status,
            counters,
        })
    }

    /// Ingests one raw item through the operator chain.
    #[allow(clippy::too_many_arguments, reason = "operator wiring mirrors the run loop")]
    fn ingest_item(
        &self,
        ctx: &OperatorContext,
        stores: &PipelineStores<'_>,
        snapshot: &NetworkSnapshot,
        profile: &SourceProfile,
        item: &RawItem,
        item_sequence: u64,
        timer: &dyn RunTimer,
        records: &mut StageRecords,
    ) -> Result<ItemOutcome, PipelineError> {
        // Canonicalize: one RunRecord per item, by contract.
        let mut canon_builder = RunRecordBuilder::begin(
            ctx.derive_run_id(OP_CANONICALIZE, item_sequence),
            ctx.operator(OP_CANONICALIZE),
            ctx.now,
            ctx.mode,
            ctx.config_hash.clone(),
            ctx.run_group_id.clone(),
        );
        canon_builder.record_input(ArtifactRef {
            id: item.raw_item_id.as_str().to_string(),
            kind: ArtifactKind::RawItem,
            hash: item.content_hash.clone(),
        });

        let normalized = canonicalize::normalize(item, profile);
        for warning in &normalized.warnings {
            canon_builder.warn(warning.clone());
        }
        let mut event = normalized.event;

        let verdict = self.engine.evaluate(&event, &item.summary);
        let stamped = verdict.suppressed() && self.engine.enabled() && !ctx.no_suppress;
        if let Some(primary) = &verdict.primary_rule_id {
            records.suppress.warn(format!(
                "item {} matched {} rule(s); primary {primary}",
                item.raw_item_id,
                verdict.matched_rule_ids.len()
            ));
        }
        if stamped
            && let (Some(primary), Some(reason_code)) =
                (verdict.primary_rule_id.clone(), verdict.reason_code.clone())
        {
            let stamp = SuppressionStamp {
                primary_rule_id: primary,
                rule_ids: verdict.matched_rule_ids.clone(),
                reason_code,
                suppressed_at: ctx.now,
                stage: SuppressionStage::Normalize,
            };
            stores.raw_items.mark_suppressed(
                &item.raw_item_id,
                &stamp,
                SuppressionStage::Normalize,
            )?;
            event.suppression = Some(stamp);
        } else if verdict.suppressed() {
            records.suppress.warn(format!(
                "item {} matched but no stamp was applied",
                item.raw_item_id
            ));
        }

        stores.events.insert(&event, ctx.now)?;
        if !stamped {
            stores.raw_items.mark_processed(&item.raw_item_id, false)?;
        }

        let event_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &event)?;
        canon_builder.record_output(ArtifactRef {
            id: event.event_id.as_str().to_string(),
            kind: ArtifactKind::Event,
            hash: event_hash.clone(),
        });
        stores.run_records.append(&canon_builder.finalize(ctx.now, timer.elapsed_seconds()))?;

        // Suppressed events are audit-only: no linkage, no alert.
        if stamped {
            return Ok(ItemOutcome {
                suppressed: true,
                alert_touched: false,
            });
        }

        let linkage = link::link(&event, snapshot, ctx.now, &self.linker_config);
        for warning in &linkage.warnings {
            records.link.warn(warning.clone());
        }
        let impact =
            score::score(&event, &linkage, snapshot, profile, ctx.now, &self.score_config);
        for warning in &impact.warnings {
            records.score.warn(warning.clone());
        }

        let observed_at = event.observed_at(item.fetched_at_utc);
        records.correlate.record_input(ArtifactRef {
            id: event.event_id.as_str().to_string(),
            kind: ArtifactKind::Event,
            hash: event_hash,
        });
        let outcome = correlate::apply(
            &event,
            &linkage,
            &impact,
            profile,
            stores.alerts,
            &self.locks,
            observed_at,
            &self.correlator_config,
        )?;

        let evidence = evidence_build::build(
            &outcome,
            &event,
            &linkage,
            ctx.determinism_mode,
            ctx.determinism_context.as_ref(),
            ctx.now,
        )?;
        stores.evidence.append(&evidence)?;

        let mut alert = outcome.alert.clone();
        alert.evidence_artifact_hash = Some(evidence.artifact_hash.clone());
        stores.alerts.upsert(&alert)?;

        let alert_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &alert)?;
        records.correlate.record_output(ArtifactRef {
            id: alert.alert_id.as_str().to_string(),
            kind: ArtifactKind::Alert,
            hash: alert_hash,
        });
        records.evidence.record_output(ArtifactRef {
            id: evidence.artifact_id.as_str().to_string(),
            kind: ArtifactKind::IncidentEvidence,
            hash: evidence.artifact_hash.clone(),
        });

        Ok(ItemOutcome {
            suppressed: false,
            alert_touched: true,
        })
    }

    /// Appends the FAILURE row recording a cancellation for a source.
    fn append_cancelled_row(
        &self,
        ctx: &OperatorContext,
        stores: &PipelineStores<'_>,
        source_id: &SourceId,
        timer: &dyn RunTimer,
    ) -> Result<(), PipelineError> {
        let row = SourceRun {
            run_group_id: ctx.run_group_id.clone(),
            phase: RunPhase::Ingest,
            source_id: source_id.clone(),
            status: SourceRunStatus::Failure,
            status_code: None,
            error: Some("cancelled".to_string()),
            duration_seconds: timer.elapsed_seconds(),
            counters: SourceRunCounters::default(),
            diagnostics: BTreeMap::new(),
            run_at_utc: ctx.now,
        };
        stores.source_runs.append(&row)?;
        Ok(())
    }
}

/// Per-item ingest outcome.
#[derive(Debug, Clone, Copy)]
struct ItemOutcome {
    /// True when the item was suppressed (audit-only).
    suppressed: bool,
    /// True when an alert was created or updated.
    alert_touched: bool,
}

// ============================================================================
// SECTION: Stage Records
// ============================================================================

/// Per-source RunRecord builders for the batch-scoped operator stages.
///
/// Canonicalization records per item; the remaining stages record once per
/// source batch. All five finalize together, on success, failure, and
/// cancellation alike.
struct StageRecords {
    /// Suppression evaluation record.
    suppress: RunRecordBuilder,
    /// Network linkage record.
    link: RunRecordBuilder,
    /// Impact scoring record.
    score: RunRecordBuilder,
    /// Alert correlation record.
    correlate: RunRecordBuilder,
    /// Incident evidence record.
    evidence: RunRecordBuilder,
}

impl StageRecords {
    /// Begins all five stage records for one source batch.
    fn begin(ctx: &OperatorContext, sequence: u64) -> Self {
        let begin = |operator: &str| {
            RunRecordBuilder::begin(
                ctx.derive_run_id(operator, sequence),
                ctx.operator(operator),
                ctx.now,
                ctx.mode,
                ctx.config_hash.clone(),
                ctx.run_group_id.clone(),
            )
        };
        Self {
            suppress: begin(OP_SUPPRESS),
            link: begin(OP_LINK),
            score: begin(OP_SCORE),
            correlate: begin(OP_CORRELATE),
            evidence: begin(OP_EVIDENCE),
        }
    }

    /// Records the same error on every stage record.
    fn error_all(&mut self, message: &str) {
        self.suppress.error(message);
        self.link.error(message);
        self.score.error(message);
        self.correlate.error(message);
        self.evidence.error(message);
    }

    /// Finalizes and appends all five records.
    fn finalize_into(
        self,
        stores: &PipelineStores<'_>,
        ctx: &OperatorContext,
        timer: &dyn RunTimer,
    ) -> Result<(), StoreError> {
        let elapsed = timer.elapsed_seconds();
        for builder in [self.suppress, self.link, self.score, self.correlate, self.evidence] {
            stores.run_records.append(&builder.finalize(ctx.now, elapsed))?;
        }
        Ok(())
    }
}
