// crates/hardstop-core/src/core/network.rs
// ============================================================================
// Module: Hardstop Network Graph
// Description: Read-only facility/lane/shipment snapshot for linkage.
// Purpose: Provide deterministic lookups over the user-owned network graph.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The network snapshot is a read-only view of the user's facilities, lanes,
//! and shipments. Datasets may be partially loaded; the linker treats a
//! missing dataset as empty linkage with a warning, never an error. All maps
//! are ordered so iteration feeding linkage and hashing is deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::identifiers::ShipmentId;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Facility in the user's network graph.
///
/// # Invariants
/// - `criticality_score` is in `0..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    /// Facility identifier.
    pub facility_id: FacilityId,
    /// Human-readable facility name.
    pub name: String,
    /// Facility city.
    pub city: String,
    /// Facility state as a two-letter code.
    pub state: String,
    /// Facility country code.
    pub country: String,
    /// Operational criticality in 0..=10.
    pub criticality_score: u8,
}

/// Lane connecting two facilities.
///
/// # Invariants
/// - `volume_score` is in `0..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    /// Lane identifier.
    pub lane_id: LaneId,
    /// Origin facility.
    pub origin_facility_id: FacilityId,
    /// Destination facility.
    pub destination_facility_id: FacilityId,
    /// Relative shipment volume in 0..=10.
    pub volume_score: u8,
}

/// Shipment lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and linkage filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Not yet picked up.
    Pending,
    /// Moving on a lane.
    InTransit,
    /// Scheduled for a future pickup.
    Scheduled,
    /// Delivered (never linked).
    Delivered,
    /// Cancelled (never linked).
    Cancelled,
}

impl ShipmentStatus {
    /// Returns true when the status is eligible for linkage.
    #[must_use]
    pub const fn linkable(self) -> bool {
        matches!(self, Self::Pending | Self::InTransit | Self::Scheduled)
    }
}

/// Shipment moving on a lane.
///
/// # Invariants
/// - `eta_date` is end-of-day UTC when loaded from a date-only column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    /// Shipment identifier.
    pub shipment_id: ShipmentId,
    /// Lane the shipment travels on.
    pub lane_id: LaneId,
    /// Estimated arrival instant.
    pub eta_date: Option<UtcTimestamp>,
    /// Lifecycle status.
    pub status: ShipmentStatus,
    /// Priority flag set by the owner.
    pub priority_flag: bool,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Read-only network snapshot handed to the linker and scorer.
///
/// # Invariants
/// - Maps are keyed by their record identifiers; iteration order is sorted.
/// - `*_loaded` flags record whether the dataset was present at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Facilities keyed by identifier.
    pub facilities: BTreeMap<FacilityId, Facility>,
    /// Lanes keyed by identifier.
    pub lanes: BTreeMap<LaneId, Lane>,
    /// Shipments keyed by identifier.
    pub shipments: BTreeMap<ShipmentId, Shipment>,
    /// True when the facility dataset was present at load time.
    pub facilities_loaded: bool,
    /// True when the lane dataset was present at load time.
    pub lanes_loaded: bool,
    /// True when the shipment dataset was present at load time.
    pub shipments_loaded: bool,
}

impl NetworkSnapshot {
    /// Builds a snapshot from loaded datasets, marking all present.
    #[must_use]
    pub fn new(facilities: Vec<Facility>, lanes: Vec<Lane>, shipments: Vec<Shipment>) -> Self {
        Self {
            facilities: facilities
                .into_iter()
                .map(|facility| (facility.facility_id.clone(), facility))
                .collect(),
            lanes: lanes.into_iter().map(|lane| (lane.lane_id.clone(), lane)).collect(),
            shipments: shipments
                .into_iter()
                .map(|shipment| (shipment.shipment_id.clone(), shipment))
                .collect(),
            facilities_loaded: true,
            lanes_loaded: true,
            shipments_loaded: true,
        }
    }

    /// Returns lanes whose origin facility is in the given sorted set view.
    #[must_use]
    pub fn lanes_from<'snapshot>(
        &'snapshot self,
        origins: &[&FacilityId],
    ) -> Vec<&'snapshot Lane> {
        self.lanes
            .values()
            .filter(|lane| origins.iter().any(|origin| **origin == lane.origin_facility_id))
            .collect()
    }

    /// Returns an ETA instant interpreted from a date-only or timestamp field.
    #[must_use]
    pub fn shipment_eta(&self, shipment_id: &ShipmentId) -> Option<UtcTimestamp> {
        self.shipments.get(shipment_id).and_then(|shipment| shipment.eta_date)
    }
}
