// crates/hardstop-core/src/core/signal.rs
// ============================================================================
// Module: Hardstop Raw Signals
// Description: Fetched payloads, source tiers, and suppression stamps.
// Purpose: Model the ingested record before and during normalization.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A [`RawItem`] is the payload as fetched: created once by the fetch
//! collaborator, mutated exactly once by canonicalization (status transition
//! plus an optional suppression stamp), never deleted. Deduplication keys on
//! `(source_id, canonical_id)` first and the content hash second.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::RawItemId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::SourceId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Tiers
// ============================================================================

/// Geographic/scope classification of a source.
///
/// # Invariants
/// - Variants are stable for serialization and brief tier counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Global-scope source.
    Global,
    /// Regional-scope source.
    Regional,
    /// Local-scope source.
    Local,
}

impl SourceTier {
    /// Returns a stable label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Regional => "regional",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reliability grade of a source (1 lowest, 3 highest).
///
/// # Invariants
/// - Wire form is the integer 1, 2, or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrustTier {
    /// Lowest reliability grade.
    Low,
    /// Standard reliability grade.
    Standard,
    /// Highest reliability grade.
    High,
}

impl TrustTier {
    /// Returns the numeric grade (1..=3).
    #[must_use]
    pub const fn grade(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Standard => 2,
            Self::High => 3,
        }
    }

    /// Returns the impact-score delta for this tier (+1 / 0 / -1).
    #[must_use]
    pub const fn score_delta(self) -> i32 {
        match self {
            Self::Low => -1,
            Self::Standard => 0,
            Self::High => 1,
        }
    }
}

impl TryFrom<u8> for TrustTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Standard),
            3 => Ok(Self::High),
            other => Err(format!("trust tier out of range: {other}")),
        }
    }
}

impl From<TrustTier> for u8 {
    fn from(value: TrustTier) -> Self {
        value.grade()
    }
}

// ============================================================================
// SECTION: Suppression Stamp
// ============================================================================

/// Pipeline stage at which a record was suppressed.
///
/// # Invariants
/// - Variants are stable for serialization and audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionStage {
    /// Suppressed during fetch-side filtering.
    Fetch,
    /// Suppressed during normalization/ingest.
    Normalize,
}

/// Suppression metadata stamped on raw items and events.
///
/// # Invariants
/// - `primary_rule_id` is the first rule in `rule_ids` (declared order).
/// - `rule_ids` preserves global-then-per-source evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionStamp {
    /// First matched rule; owner of the reason code.
    pub primary_rule_id: RuleId,
    /// All matched rules in evaluation order.
    pub rule_ids: Vec<RuleId>,
    /// Reason code copied from the primary rule.
    pub reason_code: String,
    /// Instant the stamp was applied.
    pub suppressed_at: UtcTimestamp,
    /// Stage at which suppression occurred.
    pub stage: SuppressionStage,
}

// ============================================================================
// SECTION: Raw Item
// ============================================================================

/// Raw item lifecycle status.
///
/// # Invariants
/// - A row cannot exit `New` except to `Normalized`, `Suppressed`, or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawItemStatus {
    /// Fetched but not yet normalized.
    New,
    /// Normalized into an event.
    Normalized,
    /// Normalization failed.
    Failed,
    /// Normalized and suppressed (audit-only event).
    Suppressed,
}

impl RawItemStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Normalized => "normalized",
            Self::Failed => "failed",
            Self::Suppressed => "suppressed",
        }
    }
}

/// Ingested payload before normalization.
///
/// # Invariants
/// - `canonical_id` is unique per `source_id`; `content_hash` unique globally.
/// - Created by fetch, mutated exactly once by canonicalization, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Opaque raw item identifier.
    pub raw_item_id: RawItemId,
    /// Producing source.
    pub source_id: SourceId,
    /// Source-supplied stable identifier.
    pub canonical_id: String,
    /// Hash of the normalized payload bytes.
    pub content_hash: HashDigest,
    /// Item title as fetched.
    pub title: String,
    /// Item summary as fetched.
    pub summary: String,
    /// Full raw text as fetched.
    pub raw_text: String,
    /// Item URL when the source supplies one.
    pub url: Option<String>,
    /// Publication instant when the source supplies one.
    pub published_at_utc: Option<UtcTimestamp>,
    /// Fetch instant assigned by the collaborator.
    pub fetched_at_utc: UtcTimestamp,
    /// Lifecycle status.
    pub status: RawItemStatus,
    /// Suppression stamp when suppressed.
    pub suppression: Option<SuppressionStamp>,
    /// Trust tier of the producing source at fetch time.
    pub trust_tier: TrustTier,
    /// Scope tier of the producing source at fetch time.
    pub tier: SourceTier,
}
