// crates/hardstop-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fixtures and in-memory stores for hardstop-core tests.
// Purpose: Provide reusable builders for pipeline and operator tests.
// Dependencies: hardstop-core
// ============================================================================

//! ## Overview
//! In-memory repository implementations plus fixture builders shared by the
//! operator and pipeline integration tests.

#![allow(
    dead_code,
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Helpers are shared across test binaries with differing usage."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use hardstop_core::Alert;
use hardstop_core::AlertId;
use hardstop_core::Classification;
use hardstop_core::Event;
use hardstop_core::EventId;
use hardstop_core::Facility;
use hardstop_core::FacilityId;
use hardstop_core::IncidentEvidence;
use hardstop_core::Lane;
use hardstop_core::LaneId;
use hardstop_core::NetworkSnapshot;
use hardstop_core::RawItem;
use hardstop_core::RawItemId;
use hardstop_core::RawItemStatus;
use hardstop_core::RunPhase;
use hardstop_core::RunRecord;
use hardstop_core::SaveOutcome;
use hardstop_core::Shipment;
use hardstop_core::ShipmentId;
use hardstop_core::ShipmentStatus;
use hardstop_core::SourceId;
use hardstop_core::SourceRun;
use hardstop_core::SourceTier;
use hardstop_core::StoreError;
use hardstop_core::SuppressedEventView;
use hardstop_core::SuppressionStage;
use hardstop_core::SuppressionStamp;
use hardstop_core::TrustTier;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing::DEFAULT_HASH_ALGORITHM;
use hardstop_core::hashing::hash_bytes;
use hardstop_core::interfaces::AlertStore;
use hardstop_core::interfaces::EventStore;
use hardstop_core::interfaces::EvidenceStore;
use hardstop_core::interfaces::RawItemStore;
use hardstop_core::interfaces::RunRecordStore;
use hardstop_core::interfaces::SourceRunStore;
use hardstop_core::runtime::SourceProfile;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory implementation of every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    /// Raw item rows.
    pub raw_items: Mutex<Vec<RawItem>>,
    /// Event rows with their recorded instants.
    pub events: Mutex<Vec<(Event, UtcTimestamp)>>,
    /// Alert rows keyed by id.
    pub alerts: Mutex<BTreeMap<AlertId, Alert>>,
    /// Source run rows.
    pub source_runs: Mutex<Vec<SourceRun>>,
    /// Incident evidence artifacts.
    pub evidence: Mutex<Vec<IncidentEvidence>>,
    /// Finalized run records.
    pub run_records: Mutex<Vec<RunRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all stored run records.
    pub fn records(&self) -> Vec<RunRecord> {
        self.run_records.lock().unwrap().clone()
    }

    /// Returns all stored alerts sorted by id.
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().values().cloned().collect()
    }
}

impl RawItemStore for MemoryStore {
    fn save(&self, item: &RawItem) -> Result<SaveOutcome, StoreError> {
        let mut rows = self.raw_items.lock().unwrap();
        if let Some(existing) = rows.iter().find(|row| {
            row.source_id == item.source_id && row.canonical_id == item.canonical_id
        }) {
            return Ok(SaveOutcome::Duplicate {
                raw_item_id: existing.raw_item_id.clone(),
            });
        }
        if let Some(existing) =
            rows.iter().find(|row| row.content_hash == item.content_hash)
        {
            return Ok(SaveOutcome::Duplicate {
                raw_item_id: existing.raw_item_id.clone(),
            });
        }
        rows.push(item.clone());
        Ok(SaveOutcome::Created {
            raw_item_id: item.raw_item_id.clone(),
        })
    }

    fn list_for_ingest(
        &self,
        since: Option<UtcTimestamp>,
        include_suppressed: bool,
    ) -> Result<Vec<RawItem>, StoreError> {
        let rows = self.raw_items.lock().unwrap();
        let mut selected: Vec<RawItem> = rows
            .iter()
            .filter(|row| {
                row.status == RawItemStatus::New
                    || (include_suppressed && row.status == RawItemStatus::Suppressed)
            })
            .filter(|row| since.is_none_or(|floor| row.fetched_at_utc >= floor))
            .cloned()
            .collect();
        selected.sort_by(|left, right| {
            left.fetched_at_utc
                .cmp(&right.fetched_at_utc)
                .then_with(|| left.raw_item_id.cmp(&right.raw_item_id))
        });
        Ok(selected)
    }

    fn mark_suppressed(
        &self,
        raw_item_id: &RawItemId,
        stamp: &SuppressionStamp,
        stage: SuppressionStage,
    ) -> Result<(), StoreError> {
        let mut rows = self.raw_items.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.raw_item_id == *raw_item_id)
            .ok_or_else(|| StoreError::Invalid(format!("missing raw item {raw_item_id}")))?;
        row.status = RawItemStatus::Suppressed;
        let mut applied = stamp.clone();
        applied.stage = stage;
        row.suppression = Some(applied);
        Ok(())
    }

    fn mark_processed(&self, raw_item_id: &RawItemId, failed: bool) -> Result<(), StoreError> {
        let mut rows = self.raw_items.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.raw_item_id == *raw_item_id)
            .ok_or_else(|| StoreError::Invalid(format!("missing raw item {raw_item_id}")))?;
        row.status = if failed {
            RawItemStatus::Failed
        } else {
            RawItemStatus::Normalized
        };
        Ok(())
    }
}

impl EventStore for MemoryStore {
    fn insert(&self, event: &Event, recorded_at: UtcTimestamp) -> Result<(), StoreError> {
        let mut rows = self.events.lock().unwrap();
        if rows.iter().any(|(existing, _)| existing.event_id == event.event_id) {
            return Err(StoreError::Invalid(format!("event exists: {}", event.event_id)));
        }
        rows.push((event.clone(), recorded_at));
        Ok(())
    }

    fn get(&self, event_id: &EventId) -> Result<Option<Event>, StoreError> {
        let rows = self.events.lock().unwrap();
        Ok(rows.iter().find(|(event, _)| event.event_id == *event_id).map(|(event, _)| event.clone()))
    }

    fn list_suppressed_since(
        &self,
        cutoff: UtcTimestamp,
    ) -> Result<Vec<SuppressedEventView>, StoreError> {
        let rows = self.events.lock().unwrap();
        let mut views: Vec<SuppressedEventView> = rows
            .iter()
            .filter(|(event, recorded)| event.is_suppressed() && *recorded >= cutoff)
            .map(|(event, _)| SuppressedEventView {
                event_id: event.event_id.clone(),
                source_id: event.source_id.clone(),
                primary_rule_id: event
                    .suppression
                    .as_ref()
                    .map(|stamp| stamp.primary_rule_id.clone())
                    .unwrap(),
            })
            .collect();
        views.sort_by(|left, right| left.event_id.cmp(&right.event_id));
        Ok(views)
    }
}

impl AlertStore for MemoryStore {
    fn find_in_window(
        &self,
        correlation_key: &str,
        window_start: UtcTimestamp,
    ) -> Result<Option<Alert>, StoreError> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts
            .values()
            .filter(|alert| {
                alert.correlation_key == correlation_key && alert.last_seen_utc >= window_start
            })
            .max_by(|left, right| {
                left.last_seen_utc
                    .cmp(&right.last_seen_utc)
                    .then_with(|| right.alert_id.cmp(&left.alert_id))
            })
            .cloned())
    }

    fn upsert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.lock().unwrap();
        alerts.insert(alert.alert_id.clone(), alert.clone());
        Ok(())
    }

    fn get(&self, alert_id: &AlertId) -> Result<Option<Alert>, StoreError> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.get(alert_id).cloned())
    }

    fn list_window(&self, cutoff: UtcTimestamp) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts
            .values()
            .filter(|alert| alert.last_seen_utc >= cutoff || alert.first_seen_utc >= cutoff)
            .cloned()
            .collect())
    }
}

impl SourceRunStore for MemoryStore {
    fn append(&self, run: &SourceRun) -> Result<(), StoreError> {
        let mut rows = self.source_runs.lock().unwrap();
        if rows.iter().any(|existing| {
            existing.run_group_id == run.run_group_id
                && existing.phase == run.phase
                && existing.source_id == run.source_id
        }) {
            return Err(StoreError::Invalid(format!(
                "source run exists for ({}, {}, {})",
                run.phase.as_str(),
                run.source_id,
                run.run_group_id
            )));
        }
        rows.push(run.clone());
        Ok(())
    }

    fn recent(
        &self,
        source_id: &SourceId,
        phase: RunPhase,
        limit: usize,
    ) -> Result<Vec<SourceRun>, StoreError> {
        let rows = self.source_runs.lock().unwrap();
        let mut selected: Vec<SourceRun> = rows
            .iter()
            .filter(|run| run.source_id == *source_id && run.phase == phase)
            .cloned()
            .collect();
        selected.reverse();
        selected.truncate(limit);
        Ok(selected)
    }

    fn last_success_at(&self, source_id: &SourceId) -> Result<Option<UtcTimestamp>, StoreError> {
        let rows = self.source_runs.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|run| {
                run.source_id == *source_id
                    && run.status == hardstop_core::SourceRunStatus::Success
            })
            .map(|run| run.run_at_utc)
            .max())
    }
}

impl EvidenceStore for MemoryStore {
    fn append(&self, evidence: &IncidentEvidence) -> Result<(), StoreError> {
        self.evidence.lock().unwrap().push(evidence.clone());
        Ok(())
    }

    fn list_for_alert(&self, alert_id: &AlertId) -> Result<Vec<IncidentEvidence>, StoreError> {
        let rows = self.evidence.lock().unwrap();
        Ok(rows.iter().filter(|artifact| artifact.alert_id == *alert_id).cloned().collect())
    }
}

impl RunRecordStore for MemoryStore {
    fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        self.run_records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Timestamp fixture from an RFC 3339 literal.
pub fn ts(text: &str) -> UtcTimestamp {
    UtcTimestamp::parse(text).expect("fixture timestamp")
}

/// Raw item fixture for a source.
pub fn raw_item(source: &str, canonical_id: &str, title: &str, raw_text: &str) -> RawItem {
    let content = format!("{title}|{raw_text}");
    RawItem {
        raw_item_id: RawItemId::new(format!("RI-{canonical_id}")),
        source_id: SourceId::new(source),
        canonical_id: canonical_id.to_string(),
        content_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, content.as_bytes()),
        title: title.to_string(),
        summary: String::new(),
        raw_text: raw_text.to_string(),
        url: Some(format!("https://example.test/{canonical_id}")),
        published_at_utc: Some(ts("2025-12-29T16:00:00Z")),
        fetched_at_utc: ts("2025-12-29T16:30:00Z"),
        status: RawItemStatus::New,
        suppression: None,
        trust_tier: TrustTier::High,
        tier: SourceTier::Global,
    }
}

/// Source profile fixture.
pub fn profile(source: &str) -> SourceProfile {
    SourceProfile {
        source_id: SourceId::new(source),
        source_type: "govt_alert".to_string(),
        tier: SourceTier::Global,
        trust_tier: TrustTier::High,
        classification_floor: Classification::Interesting,
        weighting_bias: 0,
        enabled: true,
    }
}

/// Network fixture: one critical facility in Avon, IN with three lanes and
/// six priority shipments inside the 48h window.
pub fn avon_network(now: UtcTimestamp) -> NetworkSnapshot {
    let facility = Facility {
        facility_id: FacilityId::new("PLANT-01"),
        name: "Avon Plant".to_string(),
        city: "Avon".to_string(),
        state: "IN".to_string(),
        country: "US".to_string(),
        criticality_score: 9,
    };
    let lanes: Vec<Lane> = (1 ..= 3)
        .map(|index| Lane {
            lane_id: LaneId::new(format!("LANE-00{index}")),
            origin_facility_id: FacilityId::new("PLANT-01"),
            destination_facility_id: FacilityId::new("DC-09"),
            volume_score: 8,
        })
        .collect();
    let shipments: Vec<Shipment> = (1 ..= 8)
        .map(|index| Shipment {
            shipment_id: ShipmentId::new(format!("SHIP-{index:03}")),
            lane_id: LaneId::new(format!("LANE-00{}", (index % 3) + 1)),
            eta_date: Some(now.plus_hours(12 + i64::from(index))),
            status: ShipmentStatus::InTransit,
            priority_flag: index <= 6,
        })
        .collect();
    NetworkSnapshot::new(vec![facility], lanes, shipments)
}
