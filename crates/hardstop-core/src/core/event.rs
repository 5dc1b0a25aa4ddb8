// crates/hardstop-core/src/core/event.rs
// ============================================================================
// Module: Hardstop Events
// Description: Canonical event representation produced by normalization.
// Purpose: Model the immutable signal that feeds linkage, scoring, and correlation.
// Dependencies: crate::core::{identifiers, signal, time}, serde
// ============================================================================

//! ## Overview
//! An [`Event`] is the canonical form of a signal: one event per raw item,
//! immutable after creation. Source-shaped metadata rides along as an opaque
//! sorted map of scalars-or-lists so schemaless payloads never reach the
//! hasher uncanonicalized; anywhere semantics matter the field is lifted into
//! a typed column.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EventId;
use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::identifiers::ShipmentId;
use crate::core::identifiers::SourceId;
use crate::core::signal::SourceTier;
use crate::core::signal::SuppressionStamp;
use crate::core::signal::TrustTier;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// Canonical event type inferred by keyword matching.
///
/// # Invariants
/// - Variants are stable for serialization and correlation bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Safety and operations incidents (spills, explosions, closures).
    SafetyAndOperations,
    /// Weather events.
    Weather,
    /// Product recalls.
    Recall,
    /// Infrastructure outages and failures.
    Infrastructure,
    /// Labor actions.
    Labor,
    /// Cyber incidents.
    Cyber,
    /// Regulatory actions.
    Regulatory,
    /// No keyword rule matched.
    Other,
}

impl EventType {
    /// Returns a stable label for the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SafetyAndOperations => "safety_and_operations",
            Self::Weather => "weather",
            Self::Recall => "recall",
            Self::Infrastructure => "infrastructure",
            Self::Labor => "labor",
            Self::Cyber => "cyber",
            Self::Regulatory => "regulatory",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Source Metadata
// ============================================================================

/// Scalar-or-list value in the opaque source metadata map.
///
/// # Invariants
/// - Values canonicalize deterministically; no nested maps are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean scalar.
    Flag(bool),
    /// Integer scalar.
    Number(i64),
    /// Text scalar.
    Text(String),
    /// List of text values in declared order.
    List(Vec<String>),
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// Canonical representation of a signal. Immutable after creation.
///
/// # Invariants
/// - `event_id` is fully determined by the producing raw item.
/// - Linked entity lists are sorted ascending for canonical serialization.
/// - `severity_guess` is in `1..=5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Derived event identifier (`EVT-…`).
    pub event_id: EventId,
    /// Source adapter type (for example `rss`, `govt_alert`).
    pub source_type: String,
    /// Producing source.
    pub source_id: SourceId,
    /// Normalized title.
    pub title: String,
    /// Full raw text carried from the raw item.
    pub raw_text: String,
    /// Inferred event type.
    pub event_type: EventType,
    /// Severity guess in 1..=5 from the event-type default table.
    pub severity_guess: u8,
    /// Extracted city (title case) when present.
    pub city: Option<String>,
    /// Extracted state as a two-letter code when present.
    pub state: Option<String>,
    /// Extracted or source-supplied country when present.
    pub country: Option<String>,
    /// Linked facility identifiers (sorted ascending).
    pub facilities: Vec<FacilityId>,
    /// Linked lane identifiers (sorted ascending).
    pub lanes: Vec<LaneId>,
    /// Linked shipment identifiers (linker order).
    pub shipments: Vec<ShipmentId>,
    /// Suppression stamp when suppressed.
    pub suppression: Option<SuppressionStamp>,
    /// Trust tier of the producing source.
    pub trust_tier: TrustTier,
    /// Scope tier of the producing source.
    pub tier: SourceTier,
    /// Publication instant when known.
    pub published_at_utc: Option<UtcTimestamp>,
    /// Item URL when the source supplies one.
    pub url: Option<String>,
    /// Opaque source-shaped metadata (sorted map of scalars-or-lists).
    pub source_metadata: BTreeMap<String, MetadataValue>,
}

impl Event {
    /// Returns the instant the event was observed: publication time when
    /// known, otherwise the supplied fallback (normally the fetch instant).
    #[must_use]
    pub fn observed_at(&self, fallback: UtcTimestamp) -> UtcTimestamp {
        self.published_at_utc.unwrap_or(fallback)
    }

    /// Returns true when the event carries a suppression stamp.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        self.suppression.is_some()
    }
}
