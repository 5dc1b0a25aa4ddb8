// crates/hardstop-core/src/lib.rs
// ============================================================================
// Module: Hardstop Core
// Description: Deterministic operator pipeline and provenance kernel.
// Purpose: Provide the data model, operators, and replay machinery for Hardstop.
// Dependencies: regex, serde, serde_jcs, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Hardstop Core implements the deterministic decision pipeline: signal
//! canonicalization, suppression, network linkage, impact scoring, alert
//! correlation, incident evidence, source health, run status, and the brief
//! read model. Every operator is replayable: given identical inputs and a
//! resolved configuration snapshot it produces byte-identical artifacts.
//!
//! The core performs no I/O and never reads the wall clock. Hosts supply
//! `now`, storage, and fetched payloads; the core supplies provenance.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::alert::Alert;
pub use crate::core::alert::AlertEvidence;
pub use crate::core::alert::AlertScope;
pub use crate::core::alert::AlertStatus;
pub use crate::core::alert::Classification;
pub use crate::core::alert::CorrelationAction;
pub use crate::core::alert::FacilityContribution;
pub use crate::core::alert::ImpactRationale;
pub use crate::core::alert::LaneContribution;
pub use crate::core::alert::NetworkCriticality;
pub use crate::core::alert::ScoreModifiers;
pub use crate::core::alert::ScoreTrace;
pub use crate::core::alert::SuppressionContext;
pub use crate::core::event::Event;
pub use crate::core::event::EventType;
pub use crate::core::event::MetadataValue;
pub use crate::core::evidence::DeterminismContext;
pub use crate::core::evidence::DeterminismMode;
pub use crate::core::evidence::IncidentEvidence;
pub use crate::core::evidence::MergeReason;
pub use crate::core::hashing;
pub use crate::core::hashing::HashAlgorithm;
pub use crate::core::hashing::HashDigest;
pub use crate::core::identifiers::AlertId;
pub use crate::core::identifiers::ArtifactId;
pub use crate::core::identifiers::EventId;
pub use crate::core::identifiers::FacilityId;
pub use crate::core::identifiers::LaneId;
pub use crate::core::identifiers::OperatorId;
pub use crate::core::identifiers::RawItemId;
pub use crate::core::identifiers::RuleId;
pub use crate::core::identifiers::RunGroupId;
pub use crate::core::identifiers::RunId;
pub use crate::core::identifiers::ShipmentId;
pub use crate::core::identifiers::SourceId;
pub use crate::core::network::Facility;
pub use crate::core::network::Lane;
pub use crate::core::network::NetworkSnapshot;
pub use crate::core::network::Shipment;
pub use crate::core::network::ShipmentStatus;
pub use crate::core::provenance::ArtifactKind;
pub use crate::core::provenance::ArtifactRef;
pub use crate::core::provenance::BestEffortMetadata;
pub use crate::core::provenance::RunCost;
pub use crate::core::provenance::RunMode;
pub use crate::core::provenance::RunRecord;
pub use crate::core::provenance::RunRecordBuilder;
pub use crate::core::signal::RawItem;
pub use crate::core::signal::RawItemStatus;
pub use crate::core::signal::SourceTier;
pub use crate::core::signal::SuppressionStage;
pub use crate::core::signal::SuppressionStamp;
pub use crate::core::signal::TrustTier;
pub use crate::core::telemetry::RunPhase;
pub use crate::core::telemetry::SourceRun;
pub use crate::core::telemetry::SourceRunCounters;
pub use crate::core::telemetry::SourceRunStatus;
pub use crate::core::time::TimeParseError;
pub use crate::core::time::UtcTimestamp;
pub use crate::interfaces::AlertStore;
pub use crate::interfaces::CancellationToken;
pub use crate::interfaces::EventStore;
pub use crate::interfaces::EvidenceStore;
pub use crate::interfaces::RawItemStore;
pub use crate::interfaces::RunRecordStore;
pub use crate::interfaces::RunTimer;
pub use crate::interfaces::SaveOutcome;
pub use crate::interfaces::SourceRunStore;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::SuppressedEventView;
