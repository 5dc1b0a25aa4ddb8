// crates/hardstop-core/src/runtime/health.rs
// ============================================================================
// Module: Source Health Scorer
// Description: Rolling-window health score and budget state per source.
// Purpose: Turn SourceRun telemetry into a deterministic 0-100 score.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Health is computed on demand from the most recent SourceRun rows (last 10
//! fetch plus last 10 ingest by default). The score starts at 100 and loses
//! points for recent failures, staleness, suppression ratio, and failure
//! streaks; bands map to `HEALTHY`, `WATCH`, or `BLOCKED`. A source with no
//! history scores 30 and starts `BLOCKED` until its first success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::SourceId;
use crate::core::telemetry::SourceRun;
use crate::core::telemetry::SourceRunStatus;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Health scorer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Rows considered per phase (default 10).
    pub window_runs: usize,
    /// Hours without a success before a source is stale (default 24).
    pub stale_threshold_hours: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_runs: 10,
            stale_threshold_hours: 24,
        }
    }
}

// ============================================================================
// SECTION: Budget State
// ============================================================================

/// Health band a source currently occupies.
///
/// # Invariants
/// - Bands map 1:1 to score ranges: >=80, >=50, below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetState {
    /// Score at or above 80.
    Healthy,
    /// Score in 50..=79.
    Watch,
    /// Score below 50, or no history.
    Blocked,
}

impl BudgetState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Watch => "WATCH",
            Self::Blocked => "BLOCKED",
        }
    }

    /// Derives the band for a score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::Healthy
        } else if score >= 50 {
            Self::Watch
        } else {
            Self::Blocked
        }
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Health Report
// ============================================================================

/// Health report for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHealth {
    /// Source under evaluation.
    pub source_id: SourceId,
    /// Score in 0..=100.
    pub score: u8,
    /// Successful rows over total rows in the window, as a percentage.
    pub success_rate_percent: u8,
    /// Hours since the last success, when any success exists.
    pub stale_hours: Option<i64>,
    /// Current consecutive-failure streak (newest rows first).
    pub consecutive_failures: u32,
    /// Suppressed items over processed items in the window, as a percentage.
    pub suppression_ratio_percent: u8,
    /// Derived budget state.
    pub state: BudgetState,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Scores one source from its recent fetch and ingest rows.
///
/// `fetch_runs` and `ingest_runs` must be newest-first, already limited to
/// the configured window. Deterministic given identical rows and `now`.
#[must_use]
pub fn score_source(
    source_id: &SourceId,
    fetch_runs: &[SourceRun],
    ingest_runs: &[SourceRun],
    last_success_at: Option<UtcTimestamp>,
    now: UtcTimestamp,
    config: &HealthConfig,
) -> SourceHealth {
    let total = fetch_runs.len() + ingest_runs.len();
    if total == 0 {
        return SourceHealth {
            source_id: source_id.clone(),
            score: 30,
            success_rate_percent: 0,
            stale_hours: None,
            consecutive_failures: 0,
            suppression_ratio_percent: 0,
            state: BudgetState::Blocked,
        };
    }

    let successes = fetch_runs
        .iter()
        .chain(ingest_runs.iter())
        .filter(|run| run.status == SourceRunStatus::Success)
        .count();
    let failures = total - successes;

    let stale_hours = last_success_at.map(|last| now.hours_since(last).max(0));
    let consecutive_failures = failure_streak(fetch_runs);
    let suppression_ratio_percent = suppression_ratio(ingest_runs);

    let mut score: i32 = 100;
    score -= i32::try_from(failures).unwrap_or(i32::MAX).saturating_mul(15).min(45);
    if stale_hours.is_none_or(|hours| hours > config.stale_threshold_hours) {
        score -= 20;
    }
    score -= i32::from(suppression_ratio_percent / 25) * 10;
    score = score
        .saturating_sub(i32::try_from(consecutive_failures / 3).unwrap_or(i32::MAX).saturating_mul(25));

    #[allow(clippy::cast_possible_truncation, reason = "value is clamped into 0..=100 first")]
    let score = score.clamp(0, 100) as u8;

    #[allow(clippy::cast_possible_truncation, reason = "percentage is clamped into 0..=100")]
    let success_rate_percent = ((successes * 100) / total).min(100) as u8;

    SourceHealth {
        source_id: source_id.clone(),
        score,
        success_rate_percent,
        stale_hours,
        consecutive_failures,
        suppression_ratio_percent,
        state: BudgetState::from_score(score),
    }
}

/// Counts the consecutive-failure streak from the newest row back.
fn failure_streak(runs_newest_first: &[SourceRun]) -> u32 {
    let mut streak = 0;
    for run in runs_newest_first {
        if run.status == SourceRunStatus::Failure {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Computes the suppression ratio percentage over the ingest window.
fn suppression_ratio(ingest_runs: &[SourceRun]) -> u8 {
    let suppressed: u64 = ingest_runs.iter().map(|run| run.counters.items_suppressed).sum();
    let processed: u64 = ingest_runs.iter().map(|run| run.counters.items_processed).sum();
    let ratio = (suppressed * 100) / processed.max(1);
    #[allow(clippy::cast_possible_truncation, reason = "percentage is clamped into 0..=100")]
    let ratio = ratio.min(100) as u8;
    ratio
}
