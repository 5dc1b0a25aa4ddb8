// crates/hardstop-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load and Validation Tests
// Description: Validates registry parsing, folding, ranges, and layering.
// ============================================================================
//! ## Overview
//! Covers YAML parsing of both registries, default folding with per-source
//! overrides winning, range validation, environment layering, and the
//! lenient duplicate-rule path.

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

use std::collections::BTreeMap;

use hardstop_config::ConfigError;
use hardstop_config::RuntimeSettings;
use hardstop_config::parse_sources;
use hardstop_config::parse_suppression;
use hardstop_config::resolve;
use hardstop_config::resolve::ENV_MAX_SHIPMENTS;
use hardstop_core::Classification;
use hardstop_core::SourceTier;
use hardstop_core::TrustTier;

/// A registry with tier defaults and one per-source override.
const SOURCES_YAML: &str = r"
defaults:
  trust_tier: 2
  classification_floor: 0
  weighting_bias: 0
tier_defaults:
  global:
    trust_tier: 3
tiers:
  global:
    - id: nws_active_us
      type: govt_alert
      url: https://alerts.example.test/active
      tags: [weather, safety]
  regional:
    - id: county_scanner
      type: rss
      url: https://scanner.example.test/feed
      trust_tier: 1
      classification_floor: 1
      weighting_bias: -1
  local:
    - id: town_board
      type: rss
      enabled: false
";

/// A suppression registry with one global keyword rule.
const SUPPRESSION_YAML: &str = r"
enabled: true
rules:
  - id: global_test_alerts
    kind: keyword
    field: any
    pattern: test
    reason_code: test_alert
";

#[test]
fn sources_registry_parses_and_folds_tier_defaults() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
            .expect("resolve");

    let nws = resolved
        .sources
        .iter()
        .find(|source| source.profile.source_id.as_str() == "nws_active_us")
        .expect("nws resolved");
    assert_eq!(nws.profile.tier, SourceTier::Global);
    assert_eq!(nws.profile.trust_tier, TrustTier::High, "tier default folds in");
    assert_eq!(nws.profile.classification_floor, Classification::Interesting);
    assert!(nws.profile.enabled);
}

#[test]
fn per_source_overrides_win_over_defaults() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
            .expect("resolve");

    let scanner = resolved
        .sources
        .iter()
        .find(|source| source.profile.source_id.as_str() == "county_scanner")
        .expect("scanner resolved");
    assert_eq!(scanner.profile.trust_tier, TrustTier::Low);
    assert_eq!(scanner.profile.classification_floor, Classification::Relevant);
    assert_eq!(scanner.profile.weighting_bias, -1);

    let town = resolved
        .sources
        .iter()
        .find(|source| source.profile.source_id.as_str() == "town_board")
        .expect("town resolved");
    assert!(!town.profile.enabled);
}

#[test]
fn resolved_sources_are_sorted_by_id() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
            .expect("resolve");
    let ids: Vec<&str> =
        resolved.sources.iter().map(|source| source.profile.source_id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[test]
fn duplicate_source_ids_fail_validation() {
    let yaml = r"
tiers:
  global:
    - id: dup
      type: rss
  local:
    - id: dup
      type: rss
";
    let document = parse_sources(yaml).expect("parse");
    let err = resolve(
        &document,
        &parse_suppression(SUPPRESSION_YAML).expect("parse suppression"),
        RuntimeSettings::default(),
        &BTreeMap::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn out_of_range_fields_fail_validation() {
    let yaml = r"
tiers:
  global:
    - id: src
      type: rss
      trust_tier: 7
";
    let document = parse_sources(yaml).expect("parse");
    let err = resolve(
        &document,
        &parse_suppression(SUPPRESSION_YAML).expect("parse suppression"),
        RuntimeSettings::default(),
        &BTreeMap::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = parse_sources("tiers: [not, a, mapping").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn environment_layer_overrides_runtime_settings() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let env = BTreeMap::from([(ENV_MAX_SHIPMENTS.to_string(), "9".to_string())]);
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &env).expect("resolve");
    assert_eq!(resolved.runtime.linker.max_shipments, 9);
}

#[test]
fn malformed_environment_override_fails_validation() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let env = BTreeMap::from([(ENV_MAX_SHIPMENTS.to_string(), "many".to_string())]);
    let err =
        resolve(&document, &suppression, RuntimeSettings::default(), &env).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn suppression_registry_parses_and_compiles() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
            .expect("resolve");
    let engine = resolved.engine().expect("engine compiles");
    assert!(engine.enabled());
}

#[test]
fn duplicate_suppression_ids_flag_leniently_but_fail_compile() {
    let yaml = r"
enabled: true
rules:
  - id: dup_rule
    kind: keyword
    field: any
    pattern: a
    reason_code: r1
  - id: dup_rule
    kind: keyword
    field: title
    pattern: b
    reason_code: r2
";
    let suppression = parse_suppression(yaml).expect("parse");
    let duplicates = suppression.duplicate_rule_ids();
    assert_eq!(duplicates.len(), 1, "lenient path flags the duplicate");

    let document = parse_sources(SOURCES_YAML).expect("parse sources");
    let resolved =
        resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
            .expect("resolve still succeeds");
    assert!(resolved.engine().is_err(), "engine compile fails closed");

    let (engine, flagged) = resolved.engine_lenient().expect("lenient compile");
    assert!(engine.enabled());
    assert_eq!(flagged.len(), 1, "lenient compile drops and flags the duplicate");
}

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

#[test]
fn identical_inputs_produce_identical_fingerprints() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let first = resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
        .expect("resolve first")
        .fingerprint()
        .expect("fingerprint first");
    let second = resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
        .expect("resolve second")
        .fingerprint()
        .expect("fingerprint second");
    assert_eq!(first, second);
}

#[test]
fn any_config_change_changes_the_fingerprint() {
    let document = parse_sources(SOURCES_YAML).expect("parse");
    let suppression = parse_suppression(SUPPRESSION_YAML).expect("parse suppression");
    let baseline = resolve(&document, &suppression, RuntimeSettings::default(), &BTreeMap::new())
        .expect("resolve")
        .fingerprint()
        .expect("fingerprint");

    let env = BTreeMap::from([(ENV_MAX_SHIPMENTS.to_string(), "9".to_string())]);
    let changed = resolve(&document, &suppression, RuntimeSettings::default(), &env)
        .expect("resolve changed")
        .fingerprint()
        .expect("fingerprint changed");
    assert_ne!(baseline, changed);
}
