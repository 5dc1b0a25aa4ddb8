// crates/hardstop-config/src/sources.rs
// ============================================================================
// Module: Sources Registry Model
// Description: YAML model for tiered source lists with folded defaults.
// Purpose: Parse and validate the sources registry before resolution.
// Dependencies: hardstop-core, serde
// ============================================================================

//! ## Overview
//! The sources registry declares ordered lists under
//! `tiers.{global,regional,local}` plus `defaults` and `tier_defaults`
//! sections. Folding is top-down: built-in defaults, registry defaults, tier
//! defaults, then per-source fields; per-source overrides win. Validation
//! checks id uniqueness and field ranges (`trust_tier` 1..=3,
//! `classification_floor` 0..=2, `weighting_bias` -2..=2).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use hardstop_core::runtime::suppress::SuppressionRule;
use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;

// ============================================================================
// SECTION: Document Model
// ============================================================================

/// Foldable per-source defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDefaults {
    /// Default trust tier in 1..=3.
    #[serde(default)]
    pub trust_tier: Option<u8>,
    /// Default classification floor in 0..=2.
    #[serde(default)]
    pub classification_floor: Option<u8>,
    /// Default weighting bias in -2..=2.
    #[serde(default)]
    pub weighting_bias: Option<i8>,
    /// Default enabled flag.
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl SourceDefaults {
    /// Folds another defaults layer over this one; the other layer wins.
    #[must_use]
    pub fn folded_with(self, other: Self) -> Self {
        Self {
            trust_tier: other.trust_tier.or(self.trust_tier),
            classification_floor: other.classification_floor.or(self.classification_floor),
            weighting_bias: other.weighting_bias.or(self.weighting_bias),
            enabled: other.enabled.or(self.enabled),
        }
    }
}

/// Per-tier default sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierDefaults {
    /// Defaults for global-tier sources.
    #[serde(default)]
    pub global: SourceDefaults,
    /// Defaults for regional-tier sources.
    #[serde(default)]
    pub regional: SourceDefaults,
    /// Defaults for local-tier sources.
    #[serde(default)]
    pub local: SourceDefaults,
}

/// One declared source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Unique source identifier.
    pub id: String,
    /// Adapter type (for example `rss`, `govt_alert`, `file`).
    #[serde(rename = "type")]
    pub source_type: String,
    /// Fetch URL when the adapter needs one.
    #[serde(default)]
    pub url: Option<String>,
    /// Enabled flag (folded when absent).
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Trust tier override in 1..=3.
    #[serde(default)]
    pub trust_tier: Option<u8>,
    /// Classification floor override in 0..=2.
    #[serde(default)]
    pub classification_floor: Option<u8>,
    /// Weighting bias override in -2..=2.
    #[serde(default)]
    pub weighting_bias: Option<i8>,
    /// Per-source suppression rules in declared order.
    #[serde(default)]
    pub suppress: Vec<SuppressionRule>,
}

/// Ordered source lists per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierLists {
    /// Global-tier sources in declared order.
    #[serde(default)]
    pub global: Vec<SourceSpec>,
    /// Regional-tier sources in declared order.
    #[serde(default)]
    pub regional: Vec<SourceSpec>,
    /// Local-tier sources in declared order.
    #[serde(default)]
    pub local: Vec<SourceSpec>,
}

/// Parsed sources registry document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesDocument {
    /// Registry-wide defaults.
    #[serde(default)]
    pub defaults: SourceDefaults,
    /// Per-tier defaults.
    #[serde(default)]
    pub tier_defaults: TierDefaults,
    /// Ordered source lists per tier.
    #[serde(default)]
    pub tiers: TierLists,
}

impl SourcesDocument {
    /// Validates id uniqueness and declared field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] on the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for spec in self.all_specs() {
            if !seen.insert(spec.id.clone()) {
                return Err(ConfigError::Validation(format!("duplicate source id: {}", spec.id)));
            }
            validate_ranges(spec)?;
        }
        Ok(())
    }

    /// Returns every declared source in tier order (global, regional, local).
    #[must_use]
    pub fn all_specs(&self) -> Vec<&SourceSpec> {
        self.tiers
            .global
            .iter()
            .chain(self.tiers.regional.iter())
            .chain(self.tiers.local.iter())
            .collect()
    }
}

/// Validates the numeric ranges on one source spec.
fn validate_ranges(spec: &SourceSpec) -> Result<(), ConfigError> {
    if let Some(trust_tier) = spec.trust_tier
        && !(1 ..= 3).contains(&trust_tier)
    {
        return Err(ConfigError::Validation(format!(
            "source {}: trust_tier out of range: {trust_tier}",
            spec.id
        )));
    }
    if let Some(floor) = spec.classification_floor
        && floor > 2
    {
        return Err(ConfigError::Validation(format!(
            "source {}: classification_floor out of range: {floor}",
            spec.id
        )));
    }
    if let Some(bias) = spec.weighting_bias
        && !(-2 ..= 2).contains(&bias)
    {
        return Err(ConfigError::Validation(format!(
            "source {}: weighting_bias out of range: {bias}",
            spec.id
        )));
    }
    Ok(())
}
