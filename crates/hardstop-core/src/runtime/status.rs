// crates/hardstop-core/src/runtime/status.rs
// ============================================================================
// Module: Run Status Evaluator
// Description: Combines run findings into an exit code and ordered messages.
// Purpose: Produce the deterministic user-visible outcome of a run.
// Dependencies: crate::core, crate::runtime::health, serde
// ============================================================================

//! ## Overview
//! The evaluator folds fetch outcomes, ingest outcomes, configuration and
//! schema findings, staleness, and budget states into an exit code (0
//! healthy, 1 warning, 2 broken). Rules are evaluated top to bottom and the
//! first matching rule fixes the exit code; messages from every matching
//! rule are kept, ordered by rule precedence then source id. Strict mode
//! promotes warnings to broken.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;
use crate::core::identifiers::SourceId;
use crate::core::telemetry::SourceRunStatus;
use crate::runtime::health::BudgetState;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Severity of a configuration finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    /// Run cannot proceed.
    Fatal,
    /// Run proceeds but is degraded.
    Warning,
}

/// Configuration-load finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFinding {
    /// Finding severity.
    pub severity: FindingSeverity,
    /// Human-readable message.
    pub message: String,
}

/// Schema-drift finding from store startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFinding {
    /// Missing or drifted column.
    pub column: String,
    /// True when the column is required.
    pub required: bool,
}

/// Fetch outcome for one enabled source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Source under report.
    pub source_id: SourceId,
    /// Fetch status.
    pub status: SourceRunStatus,
    /// Items fetched (zero is a clean empty fetch on success).
    pub items_fetched: u64,
}

/// Ingest outcome for one enabled source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Source under report.
    pub source_id: SourceId,
    /// Ingest status.
    pub status: SourceRunStatus,
}

/// Inputs to one status evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusInputs {
    /// Enabled sources at resolution time.
    pub enabled_sources: Vec<SourceId>,
    /// Fetch outcomes per enabled source.
    pub fetch_outcomes: Vec<FetchOutcome>,
    /// Ingest outcomes per enabled source.
    pub ingest_outcomes: Vec<IngestOutcome>,
    /// Configuration findings.
    pub config_findings: Vec<ConfigFinding>,
    /// Schema-drift findings.
    pub schema_findings: Vec<SchemaFinding>,
    /// Sources stale beyond the health threshold.
    pub stale_sources: Vec<SourceId>,
    /// Budget state per source.
    pub budget_states: BTreeMap<SourceId, BudgetState>,
    /// True when ingest raised before processing any source.
    pub ingest_aborted_before_any: bool,
    /// Duplicate suppression rule ids flagged by a lenient registry load.
    pub duplicate_suppression_rule_ids: Vec<RuleId>,
    /// True under `--strict`: warnings promote to broken.
    pub strict: bool,
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Exit status of a run.
///
/// # Invariants
/// - `code()` maps 1:1 to process exit codes 0, 1, 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Everything ran clean.
    Healthy,
    /// Run completed with degradations.
    Warning,
    /// Run is broken.
    Broken,
}

impl ExitStatus {
    /// Returns the process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Warning => 1,
            Self::Broken => 2,
        }
    }
}

/// Status report: exit status plus deterministically ordered messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Exit status after strict promotion.
    pub exit: ExitStatus,
    /// Messages ordered by rule precedence then source id.
    pub messages: Vec<String>,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Evaluates run status. The first matching rule fixes the exit code; all
/// matching rules contribute messages in precedence order.
#[must_use]
pub fn evaluate(inputs: &StatusInputs) -> StatusReport {
    let mut messages = Vec::new();
    let mut exit = ExitStatus::Healthy;

    // Broken rules, in precedence order.
    for finding in &inputs.config_findings {
        if finding.severity == FindingSeverity::Fatal {
            raise(&mut exit, ExitStatus::Broken);
            messages.push(format!("configuration error: {}", finding.message));
        }
    }
    for finding in &inputs.schema_findings {
        if finding.required {
            raise(&mut exit, ExitStatus::Broken);
            messages.push(format!("schema drift: required column {} missing", finding.column));
        }
    }
    if inputs.enabled_sources.is_empty() {
        raise(&mut exit, ExitStatus::Broken);
        messages.push("no enabled sources".to_string());
    }
    let failed_fetches: Vec<&FetchOutcome> = inputs
        .fetch_outcomes
        .iter()
        .filter(|outcome| outcome.status == SourceRunStatus::Failure)
        .collect();
    let all_failed = !inputs.enabled_sources.is_empty()
        && !inputs.fetch_outcomes.is_empty()
        && failed_fetches.len() == inputs.fetch_outcomes.len();
    if all_failed {
        raise(&mut exit, ExitStatus::Broken);
        messages.push(format!("{} source(s) failed to fetch", failed_fetches.len()));
    }
    if inputs.ingest_aborted_before_any {
        raise(&mut exit, ExitStatus::Broken);
        messages.push("ingest aborted before processing any source".to_string());
    }
    let mut blocked: Vec<&SourceId> = inputs
        .budget_states
        .iter()
        .filter(|(_, state)| **state == BudgetState::Blocked)
        .map(|(source_id, _)| source_id)
        .collect();
    blocked.sort();
    for source_id in &blocked {
        raise(&mut exit, ExitStatus::Broken);
        messages.push(format!("source {source_id} is BLOCKED"));
    }

    // Warning rules, in precedence order.
    if !all_failed && !failed_fetches.is_empty() {
        raise(&mut exit, ExitStatus::Warning);
        let mut failed_ids: Vec<&SourceId> =
            failed_fetches.iter().map(|outcome| &outcome.source_id).collect();
        failed_ids.sort();
        for source_id in failed_ids {
            messages.push(format!("source {source_id} failed to fetch"));
        }
    }
    let mut stale = inputs.stale_sources.clone();
    stale.sort();
    for source_id in &stale {
        raise(&mut exit, ExitStatus::Warning);
        messages.push(format!("source {source_id} is stale beyond threshold"));
    }
    let mut watched: Vec<&SourceId> = inputs
        .budget_states
        .iter()
        .filter(|(_, state)| **state == BudgetState::Watch)
        .map(|(source_id, _)| source_id)
        .collect();
    watched.sort();
    for source_id in &watched {
        raise(&mut exit, ExitStatus::Warning);
        messages.push(format!("source {source_id} is on WATCH"));
    }
    for rule_id in &inputs.duplicate_suppression_rule_ids {
        raise(&mut exit, ExitStatus::Warning);
        messages.push(format!("duplicate suppression rule id {rule_id} (loaded, flagged)"));
    }
    let mut failed_ingests: Vec<&SourceId> = inputs
        .ingest_outcomes
        .iter()
        .filter(|outcome| outcome.status == SourceRunStatus::Failure)
        .map(|outcome| &outcome.source_id)
        .collect();
    failed_ingests.sort();
    for source_id in failed_ingests {
        raise(&mut exit, ExitStatus::Warning);
        messages.push(format!("source {source_id} failed during ingest"));
    }

    if inputs.strict && exit == ExitStatus::Warning {
        exit = ExitStatus::Broken;
        messages.push("strict mode: warnings promoted to broken".to_string());
    }

    StatusReport {
        exit,
        messages,
    }
}

/// Raises the exit status, never lowering it.
fn raise(exit: &mut ExitStatus, candidate: ExitStatus) {
    if candidate > *exit {
        *exit = candidate;
    }
}
