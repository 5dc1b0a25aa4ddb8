// crates/hardstop-core/src/runtime/score.rs
// ============================================================================
// Module: Impact Scorer
// Description: Bounded integer impact score with a full rationale payload.
// Purpose: Score operational impact deterministically and explain every point.
// Dependencies: crate::core, crate::runtime::link, serde
// ============================================================================

//! ## Overview
//! The scorer sums base components (facility criticality, lane volume,
//! priority shipments, event-type keywords, ETA proximity), clamps to
//! [0, 10], applies the trust-tier delta and per-source bias, and re-clamps.
//! Classification follows the final score and is then raised to the source's
//! classification floor. Scoring never mutates inputs and never fails:
//! a degraded subscore contributes 0 and a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::alert::Classification;
use crate::core::alert::FacilityContribution;
use crate::core::alert::ImpactRationale;
use crate::core::alert::LaneContribution;
use crate::core::alert::NetworkCriticality;
use crate::core::alert::ScoreModifiers;
use crate::core::alert::ScoreTrace;
use crate::core::alert::SuppressionContext;
use crate::core::event::Event;
use crate::core::identifiers::FacilityId;
use crate::core::identifiers::LaneId;
use crate::core::network::NetworkSnapshot;
use crate::core::time::UtcTimestamp;
use crate::runtime::SourceProfile;
use crate::runtime::link::Linkage;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Event-text keywords that earn the event-type bonus.
const BONUS_KEYWORDS: &[&str] = &["SPILL", "EXPLOSION", "CLOSURE", "RECALL", "EVACUATION"];

/// Scorer configuration. Thresholds are parameterized for future tuning.
///
/// # Invariants
/// - All thresholds participate in the resolved config fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Facility criticality at or above which the facility bonus is +2.
    pub critical_facility_threshold: u8,
    /// Facility criticality at or above which the facility bonus is +1.
    pub major_facility_threshold: u8,
    /// Lane volume at or above which the lane bonus applies.
    pub high_volume_lane_threshold: u8,
    /// Proximity window in hours for ETA and priority-shipment bonuses.
    pub proximity_window_hours: i64,
    /// Cap on the priority-shipment bonus.
    pub priority_bonus_cap: i32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            critical_facility_threshold: 8,
            major_facility_threshold: 5,
            high_volume_lane_threshold: 7,
            proximity_window_hours: 48,
            priority_bonus_cap: 2,
        }
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Scoring outcome: bounded score, classification, and rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactOutcome {
    /// Final score in 0..=10.
    pub score: u8,
    /// Base score after the pre-modifier clamp.
    pub base_score: u8,
    /// Classification after the floor raise.
    pub classification: Classification,
    /// Full rationale payload.
    pub rationale: ImpactRationale,
    /// Ordered degradation warnings.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Operator
// ============================================================================

/// Computes the impact score for one event and its linkage.
///
/// Never mutates inputs and never fails; subscore failures degrade to 0 with
/// a warning.
#[must_use]
pub fn score(
    event: &Event,
    linkage: &Linkage,
    snapshot: &NetworkSnapshot,
    profile: &SourceProfile,
    now: UtcTimestamp,
    config: &ScoreConfig,
) -> ImpactOutcome {
    let mut warnings = Vec::new();
    let mut network = NetworkCriticality::default();

    let facility_delta = facility_subscore(linkage, snapshot, config, &mut network);
    let lane_delta = lane_subscore(linkage, snapshot, config, &mut network);
    let priority_delta = priority_subscore(linkage, snapshot, now, config, &mut network, &mut warnings);
    let matched_keywords = matched_keywords(event);
    let keyword_delta = i32::from(!matched_keywords.is_empty());
    let proximity_delta = proximity_subscore(linkage, snapshot, now, config, &mut network);

    let base_sum = facility_delta + lane_delta + priority_delta + keyword_delta + proximity_delta;
    let base_score = clamp_score(base_sum);

    let trust_delta = profile.trust_tier.score_delta();
    let bias_delta = i32::from(profile.weighting_bias.clamp(-2, 2));
    let final_score = clamp_score(i32::from(base_score) + trust_delta + bias_delta);

    let mut classification_reasons = Vec::new();
    let mut classification = Classification::from_score(final_score);
    if classification < profile.classification_floor {
        classification = profile.classification_floor;
        classification_reasons.push("Classification floor".to_string());
    }

    let suppression_context = event.suppression.as_ref().map(|stamp| SuppressionContext {
        primary_rule_id: stamp.primary_rule_id.clone(),
        reason_code: stamp.reason_code.clone(),
    });

    let rationale = ImpactRationale {
        network_criticality: network,
        modifiers: ScoreModifiers {
            trust_tier: profile.trust_tier,
            trust_tier_delta: trust_delta,
            weighting_bias_delta: bias_delta,
        },
        suppression_context,
        score_trace: ScoreTrace {
            base_score,
            final_score,
            matched_keywords,
            classification_reasons,
        },
    };

    ImpactOutcome {
        score: final_score,
        base_score,
        classification,
        rationale,
        warnings,
    }
}

/// Clamps a raw score sum into the 0..=10 band.
#[must_use]
pub fn clamp_score(raw: i32) -> u8 {
    #[allow(clippy::cast_possible_truncation, reason = "value is clamped into 0..=10 first")]
    let clamped = raw.clamp(0, 10) as u8;
    clamped
}

/// Facility criticality subscore: +2 at the critical threshold, else +1 at
/// the major threshold. The delta is attributed to the determining facility
/// (highest criticality, ties by ascending id).
fn facility_subscore(
    linkage: &Linkage,
    snapshot: &NetworkSnapshot,
    config: &ScoreConfig,
    network: &mut NetworkCriticality,
) -> i32 {
    let mut best: Option<(&FacilityId, u8)> = None;
    for facility_id in &linkage.facilities {
        let Some(facility) = snapshot.facilities.get(facility_id) else {
            continue;
        };
        let better = best.is_none_or(|(_, criticality)| facility.criticality_score > criticality);
        if better {
            best = Some((facility_id, facility.criticality_score));
        }
    }

    let delta = best.map_or(0, |(_, criticality)| {
        if criticality >= config.critical_facility_threshold {
            2
        } else if criticality >= config.major_facility_threshold {
            1
        } else {
            0
        }
    });

    for facility_id in &linkage.facilities {
        let Some(facility) = snapshot.facilities.get(facility_id) else {
            continue;
        };
        let attributed = best.is_some_and(|(winner, _)| winner == facility_id);
        network.facility_contributions.push(FacilityContribution {
            facility_id: facility_id.clone(),
            criticality_score: facility.criticality_score,
            delta: if attributed { delta } else { 0 },
        });
    }
    delta
}

/// Lane volume subscore: +1 when any linked lane meets the volume threshold.
/// Attributed to the highest-volume qualifying lane (ties by ascending id).
fn lane_subscore(
    linkage: &Linkage,
    snapshot: &NetworkSnapshot,
    config: &ScoreConfig,
    network: &mut NetworkCriticality,
) -> i32 {
    let mut best: Option<(&LaneId, u8)> = None;
    for lane_id in &linkage.lanes {
        let Some(lane) = snapshot.lanes.get(lane_id) else {
            continue;
        };
        if lane.volume_score >= config.high_volume_lane_threshold {
            let better = best.is_none_or(|(_, volume)| lane.volume_score > volume);
            if better {
                best = Some((lane_id, lane.volume_score));
            }
        }
    }
    let delta = i32::from(best.is_some());

    for lane_id in &linkage.lanes {
        let Some(lane) = snapshot.lanes.get(lane_id) else {
            continue;
        };
        let attributed = best.is_some_and(|(winner, _)| winner == lane_id);
        network.lane_contributions.push(LaneContribution {
            lane_id: lane_id.clone(),
            volume_score: lane.volume_score,
            delta: if attributed { delta } else { 0 },
        });
    }
    delta
}

/// Priority-shipment subscore: +1 per priority shipment with an ETA inside
/// the proximity window, capped.
fn priority_subscore(
    linkage: &Linkage,
    snapshot: &NetworkSnapshot,
    now: UtcTimestamp,
    config: &ScoreConfig,
    network: &mut NetworkCriticality,
    warnings: &mut Vec<String>,
) -> i32 {
    let window_end = now.plus_hours(config.proximity_window_hours);
    let mut qualifying = Vec::new();
    for shipment_id in &linkage.shipments {
        let Some(shipment) = snapshot.shipments.get(shipment_id) else {
            warnings.push(format!("shipment {shipment_id} missing from snapshot; subscore 0"));
            continue;
        };
        if !shipment.priority_flag {
            continue;
        }
        match shipment.eta_date {
            Some(eta) if eta >= now && eta <= window_end => qualifying.push(shipment_id.clone()),
            Some(_) => {}
            None => warnings.push(format!("shipment {shipment_id} has no ETA; subscore 0")),
        }
    }
    qualifying.sort();
    let delta = i32::try_from(qualifying.len()).unwrap_or(i32::MAX).min(config.priority_bonus_cap);
    network.priority_shipments = qualifying;
    network.priority_delta = delta;
    delta
}

/// ETA proximity subscore: +1 when the nearest linked ETA is inside the window.
fn proximity_subscore(
    linkage: &Linkage,
    snapshot: &NetworkSnapshot,
    now: UtcTimestamp,
    config: &ScoreConfig,
    network: &mut NetworkCriticality,
) -> i32 {
    let window_end = now.plus_hours(config.proximity_window_hours);
    let nearest = linkage
        .shipments
        .iter()
        .filter_map(|shipment_id| snapshot.shipment_eta(shipment_id))
        .filter(|eta| *eta >= now)
        .min();
    let delta = i32::from(nearest.is_some_and(|eta| eta <= window_end));
    network.eta_proximity_delta = delta;
    delta
}

/// Collects matched bonus keywords from the event text (sorted).
fn matched_keywords(event: &Event) -> Vec<String> {
    let haystack = format!("{} {}", event.title, event.raw_text).to_uppercase();
    let mut matched: Vec<String> = BONUS_KEYWORDS
        .iter()
        .filter(|keyword| haystack.contains(**keyword))
        .map(|keyword| (*keyword).to_string())
        .collect();
    matched.sort();
    matched
}
