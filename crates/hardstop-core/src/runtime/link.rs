// crates/hardstop-core/src/runtime/link.rs
// ============================================================================
// Module: Network Linker
// Description: Resolves events to facilities, lanes, and shipments.
// Purpose: Produce deterministic entity linkage from the network snapshot.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The linker resolves an event against the read-only network snapshot.
//! Facility matching tries the explicit ids on the event, then an exact
//! `(city, state)` match, then a city match within the same country, with
//! ties broken by ascending facility id. Lanes follow from matched origins;
//! shipments are filtered to a forward ETA window, ordered by priority, ETA,
//! then id, and truncated at the configured cap. Missing datasets yield
//! empty linkage with a warning, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::Event;
use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::identifiers::ShipmentId;
use crate::core::network::NetworkSnapshot;
use crate::core::network::Shipment;
use crate::core::time::UtcTimestamp;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Linker configuration.
///
/// # Invariants
/// - `max_shipments` bounds the stored list; the untruncated count survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkerConfig {
    /// Maximum shipments kept in the linkage (default 6).
    pub max_shipments: usize,
    /// Forward ETA window in days (default 14).
    pub eta_window_days: i64,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            max_shipments: 6,
            eta_window_days: 14,
        }
    }
}

// ============================================================================
// SECTION: Linkage
// ============================================================================

/// Deterministic entity linkage for one event.
///
/// # Invariants
/// - Facility and lane sets serialize as sorted sequences.
/// - `shipments` preserves `(priority desc, eta asc, shipment_id asc)` order.
/// - `shipments_total_linked` always reflects the untruncated count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linkage {
    /// Matched facilities (sorted).
    pub facilities: BTreeSet<FacilityId>,
    /// Lanes originating at matched facilities (sorted).
    pub lanes: BTreeSet<LaneId>,
    /// Linked shipments in linker order, possibly truncated.
    pub shipments: Vec<ShipmentId>,
    /// Untruncated count of linked shipments.
    pub shipments_total_linked: u64,
    /// True when the shipment list was truncated at the cap.
    pub shipments_truncated: bool,
    /// Ordered notes explaining how entities matched.
    pub notes: Vec<String>,
    /// Ordered warnings (missing datasets).
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Links an event to the network snapshot.
///
/// Partial data is tolerated: each missing dataset contributes a warning and
/// an empty linkage section.
#[must_use]
pub fn link(
    event: &Event,
    snapshot: &NetworkSnapshot,
    now: UtcTimestamp,
    config: &LinkerConfig,
) -> Linkage {
    let mut linkage = Linkage::default();

    if !snapshot.facilities_loaded {
        linkage.warnings.push("facility dataset missing; linkage degraded".to_string());
    }
    if !snapshot.lanes_loaded {
        linkage.warnings.push("lane dataset missing; linkage degraded".to_string());
    }
    if !snapshot.shipments_loaded {
        linkage.warnings.push("shipment dataset missing; linkage degraded".to_string());
    }

    link_facilities(event, snapshot, &mut linkage);
    link_lanes(snapshot, &mut linkage);
    link_shipments(snapshot, now, config, &mut linkage);

    linkage
}

/// Resolves facilities: explicit ids, then (city, state), then city+country.
fn link_facilities(event: &Event, snapshot: &NetworkSnapshot, linkage: &mut Linkage) {
    if !event.facilities.is_empty() {
        for facility_id in &event.facilities {
            if snapshot.facilities.contains_key(facility_id) {
                linkage.facilities.insert(facility_id.clone());
            }
        }
        if !linkage.facilities.is_empty() {
            linkage.notes.push(format!(
                "matched {} facility(ies) by explicit id",
                linkage.facilities.len()
            ));
            return;
        }
    }

    if let (Some(city), Some(state)) = (&event.city, &event.state) {
        // BTreeMap iteration is ascending by facility_id, the declared tie-break.
        for (facility_id, facility) in &snapshot.facilities {
            if facility.city.eq_ignore_ascii_case(city) && facility.state.eq_ignore_ascii_case(state)
            {
                linkage.facilities.insert(facility_id.clone());
            }
        }
        if !linkage.facilities.is_empty() {
            linkage.notes.push(format!("matched facility by city/state {city}, {state}"));
            return;
        }
    }

    if let Some(city) = &event.city {
        let country = event.country.as_deref().unwrap_or("US");
        for (facility_id, facility) in &snapshot.facilities {
            if facility.city.eq_ignore_ascii_case(city)
                && facility.country.eq_ignore_ascii_case(country)
            {
                linkage.facilities.insert(facility_id.clone());
            }
        }
        if !linkage.facilities.is_empty() {
            linkage.notes.push(format!("matched facility by city {city} within {country}"));
        }
    }
}

/// Resolves lanes whose origin facility is in the matched set.
fn link_lanes(snapshot: &NetworkSnapshot, linkage: &mut Linkage) {
    for (lane_id, lane) in &snapshot.lanes {
        if linkage.facilities.contains(&lane.origin_facility_id) {
            linkage.lanes.insert(lane_id.clone());
        }
    }
    if !linkage.lanes.is_empty() {
        linkage.notes.push(format!("{} lane(s) originate at matched facilities", linkage.lanes.len()));
    }
}

/// Resolves, orders, and truncates shipments on matched lanes.
fn link_shipments(
    snapshot: &NetworkSnapshot,
    now: UtcTimestamp,
    config: &LinkerConfig,
    linkage: &mut Linkage,
) {
    let window_end = now.plus_days(config.eta_window_days);
    let mut candidates: Vec<&Shipment> = snapshot
        .shipments
        .values()
        .filter(|shipment| linkage.lanes.contains(&shipment.lane_id))
        .filter(|shipment| shipment.status.linkable())
        .filter(|shipment| {
            shipment
                .eta_date
                .is_some_and(|eta| eta >= now && eta <= window_end)
        })
        .collect();

    candidates.sort_by(|left, right| {
        right
            .priority_flag
            .cmp(&left.priority_flag)
            .then_with(|| left.eta_date.cmp(&right.eta_date))
            .then_with(|| left.shipment_id.cmp(&right.shipment_id))
    });

    linkage.shipments_total_linked = candidates.len() as u64;
    if candidates.len() > config.max_shipments {
        linkage.shipments_truncated = true;
        candidates.truncate(config.max_shipments);
    }
    linkage.shipments = candidates.into_iter().map(|shipment| shipment.shipment_id.clone()).collect();
}
