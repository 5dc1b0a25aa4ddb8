// crates/hardstop-core/tests/scoring.rs
// ============================================================================
// Module: Impact Scorer Tests
// Description: Validates subscores, clamps, modifiers, and classification.
// ============================================================================
//! ## Overview
//! Covers the base component arithmetic, pre- and post-modifier clamps,
//! trust-tier and bias modifiers, the classification floor, the rationale
//! payload, and a property check on the score bounds.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use hardstop_core::Classification;
use hardstop_core::TrustTier;
use hardstop_core::runtime::canonicalize::normalize;
use hardstop_core::runtime::link::LinkerConfig;
use hardstop_core::runtime::link::link;
use hardstop_core::runtime::score::ScoreConfig;
use hardstop_core::runtime::score::clamp_score;
use hardstop_core::runtime::score::score;
use proptest::prelude::proptest;

use crate::common::avon_network;
use crate::common::profile;
use crate::common::raw_item;
use crate::common::ts;

/// Scores the Avon spill fixture with the given profile adjustments.
fn score_avon(
    trust_tier: TrustTier,
    weighting_bias: i8,
    classification_floor: Classification,
) -> hardstop_core::runtime::score::ImpactOutcome {
    let now = ts("2025-12-29T17:00:00Z");
    let snapshot = avon_network(now);
    let item = raw_item(
        "nws_active_us",
        "NWS-1",
        "Hydrochloric acid spill at Avon, Indiana",
        "Crews responded to the spill.",
    );
    let mut source_profile = profile("nws_active_us");
    source_profile.trust_tier = trust_tier;
    source_profile.weighting_bias = weighting_bias;
    source_profile.classification_floor = classification_floor;
    let event = normalize(&item, &source_profile).event;
    let linkage = link(&event, &snapshot, now, &LinkerConfig::default());
    score(&event, &linkage, &snapshot, &source_profile, now, &ScoreConfig::default())
}

#[test]
fn base_components_sum_and_clamp_before_modifiers() {
    // Facility 9 (+2), lane volume 8 (+1), priority cap (+2), SPILL (+1),
    // nearest ETA inside 48h (+1) = 7.
    let outcome = score_avon(TrustTier::Standard, 0, Classification::Interesting);
    assert_eq!(outcome.base_score, 7);
    assert_eq!(outcome.score, 7);
    assert_eq!(outcome.classification, Classification::Impactful);
}

#[test]
fn trust_tier_modifier_shifts_after_clamp() {
    let high = score_avon(TrustTier::High, 0, Classification::Interesting);
    let low = score_avon(TrustTier::Low, 0, Classification::Interesting);
    assert_eq!(high.score, 8);
    assert_eq!(low.score, 6);
    assert_eq!(high.rationale.modifiers.trust_tier_delta, 1);
    assert_eq!(low.rationale.modifiers.trust_tier_delta, -1);
}

#[test]
fn weighting_bias_applies_and_reclamps() {
    let boosted = score_avon(TrustTier::High, 2, Classification::Interesting);
    assert_eq!(boosted.score, 10, "7 + 1 + 2 clamps at 10");
    let damped = score_avon(TrustTier::Low, -2, Classification::Interesting);
    assert_eq!(damped.score, 4);
}

#[test]
fn classification_bands_follow_the_final_score() {
    assert_eq!(Classification::from_score(0), Classification::Interesting);
    assert_eq!(Classification::from_score(3), Classification::Interesting);
    assert_eq!(Classification::from_score(4), Classification::Relevant);
    assert_eq!(Classification::from_score(6), Classification::Relevant);
    assert_eq!(Classification::from_score(7), Classification::Impactful);
    assert_eq!(Classification::from_score(10), Classification::Impactful);
}

#[test]
fn classification_floor_raises_and_records_reason() {
    let outcome = score_avon(TrustTier::Low, -2, Classification::Impactful);
    assert_eq!(outcome.score, 4, "score stays at the computed value");
    assert_eq!(outcome.classification, Classification::Impactful, "floor raises the band");
    assert!(
        outcome
            .rationale
            .score_trace
            .classification_reasons
            .contains(&"Classification floor".to_string())
    );
}

#[test]
fn rationale_lists_are_sorted_and_complete() {
    let outcome = score_avon(TrustTier::High, 0, Classification::Interesting);
    let network = &outcome.rationale.network_criticality;

    assert_eq!(network.priority_delta, 2);
    assert_eq!(network.eta_proximity_delta, 1);
    let mut sorted = network.priority_shipments.clone();
    sorted.sort();
    assert_eq!(network.priority_shipments, sorted, "priority shipments must be sorted");
    assert_eq!(outcome.rationale.score_trace.matched_keywords, vec!["SPILL".to_string()]);
    assert_eq!(outcome.rationale.score_trace.base_score, 7);
    assert_eq!(outcome.rationale.score_trace.final_score, 8);
}

#[test]
fn empty_linkage_scores_only_text_components() {
    let now = ts("2025-12-29T17:00:00Z");
    let snapshot = hardstop_core::NetworkSnapshot::default();
    let item = raw_item("nws_active_us", "NWS-2", "Warehouse closure announced", "closure");
    let source_profile = profile("nws_active_us");
    let event = normalize(&item, &source_profile).event;
    let linkage = link(&event, &snapshot, now, &LinkerConfig::default());

    let outcome =
        score(&event, &linkage, &snapshot, &source_profile, now, &ScoreConfig::default());
    // CLOSURE keyword (+1), high trust (+1).
    assert_eq!(outcome.base_score, 1);
    assert_eq!(outcome.score, 2);
}

#[test]
fn scoring_never_mutates_the_event() {
    let now = ts("2025-12-29T17:00:00Z");
    let snapshot = avon_network(now);
    let item = raw_item("nws_active_us", "NWS-3", "Spill at Avon, Indiana", "spill");
    let source_profile = profile("nws_active_us");
    let event = normalize(&item, &source_profile).event;
    let linkage = link(&event, &snapshot, now, &LinkerConfig::default());

    let before = event.clone();
    let _ = score(&event, &linkage, &snapshot, &source_profile, now, &ScoreConfig::default());
    assert_eq!(event, before);
}

#[test]
fn clamp_score_bounds() {
    assert_eq!(clamp_score(-5), 0);
    assert_eq!(clamp_score(0), 0);
    assert_eq!(clamp_score(10), 10);
    assert_eq!(clamp_score(25), 10);
}

proptest! {
    #[test]
    fn score_stays_in_bounds_for_any_bias_and_tier(bias in -2i8..=2, tier in 1u8..=3) {
        let trust = TrustTier::try_from(tier).expect("tier in range");
        let outcome = score_avon(trust, bias, Classification::Interesting);
        assert!(outcome.score <= 10);
        assert!(outcome.base_score <= 10);
    }
}
