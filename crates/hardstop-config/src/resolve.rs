// crates/hardstop-config/src/resolve.rs
// ============================================================================
// Module: Config Resolution
// Description: Folds registries and environment layers into one snapshot.
// Purpose: Produce the hashed, resolved configuration every RunRecord embeds.
// Dependencies: hardstop-core, serde
// ============================================================================

//! ## Overview
//! Resolution folds the sources registry (built-in defaults, registry
//! defaults, tier defaults, per-source fields), the suppression registry,
//! and environment-layered runtime overrides into a [`ResolvedConfig`].
//! Sources are sorted by id so the snapshot serializes canonically; the
//! fingerprint is the SHA-256 of its canonical JSON and must be identical
//! across hosts for the same inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use hardstop_core::Classification;
use hardstop_core::HashDigest;
use hardstop_core::RuleId;
use hardstop_core::SourceId;
use hardstop_core::SourceTier;
use hardstop_core::TrustTier;
use hardstop_core::hashing::DEFAULT_HASH_ALGORITHM;
use hardstop_core::hashing::HashError;
use hardstop_core::hashing::hash_canonical_json;
use hardstop_core::runtime::SourceProfile;
use hardstop_core::runtime::brief::BriefLimits;
use hardstop_core::runtime::correlate::CorrelatorConfig;
use hardstop_core::runtime::health::HealthConfig;
use hardstop_core::runtime::link::LinkerConfig;
use hardstop_core::runtime::score::ScoreConfig;
use hardstop_core::runtime::suppress::SuppressionEngine;
use hardstop_core::runtime::suppress::SuppressionLoadError;
use hardstop_core::runtime::suppress::SuppressionRule;
use serde::Deserialize;
use serde::Serialize;

use crate::ConfigError;
use crate::sources::SourceDefaults;
use crate::sources::SourceSpec;
use crate::sources::SourcesDocument;
use crate::suppression::SuppressionDocument;

// ============================================================================
// SECTION: Environment Keys
// ============================================================================

/// Environment override for the database path.
pub const ENV_DB_PATH: &str = "HARDSTOP_DB_PATH";
/// Environment override for the run-records directory.
pub const ENV_RUN_RECORDS_DIR: &str = "HARDSTOP_RUN_RECORDS_DIR";
/// Environment override for the correlation window in days.
pub const ENV_CORRELATION_WINDOW_DAYS: &str = "HARDSTOP_CORRELATION_WINDOW_DAYS";
/// Environment override for the linker shipment cap.
pub const ENV_MAX_SHIPMENTS: &str = "HARDSTOP_MAX_SHIPMENTS";
/// Environment override for the health staleness threshold in hours.
pub const ENV_STALE_THRESHOLD_HOURS: &str = "HARDSTOP_STALE_THRESHOLD_HOURS";

// ============================================================================
// SECTION: Runtime Settings
// ============================================================================

/// Runtime settings folded from files and the environment layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Artifact store database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Directory RunRecord files are written under.
    #[serde(default = "default_run_records_dir")]
    pub run_records_dir: String,
    /// Correlator configuration.
    #[serde(default)]
    pub correlator: CorrelatorConfig,
    /// Linker configuration.
    #[serde(default)]
    pub linker: LinkerConfig,
    /// Scorer configuration.
    #[serde(default)]
    pub score: ScoreConfig,
    /// Health scorer configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// Brief builder limits.
    #[serde(default)]
    pub brief: BriefLimits,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_records_dir: default_run_records_dir(),
            correlator: CorrelatorConfig::default(),
            linker: LinkerConfig::default(),
            score: ScoreConfig::default(),
            health: HealthConfig::default(),
            brief: BriefLimits::default(),
        }
    }
}

/// Returns the default database path.
fn default_db_path() -> String {
    "hardstop.db".to_string()
}

/// Returns the default run-records directory.
fn default_run_records_dir() -> String {
    "run_records".to_string()
}

// ============================================================================
// SECTION: Resolved Model
// ============================================================================

/// One fully resolved source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Folded policy profile.
    pub profile: SourceProfile,
    /// Fetch URL when the adapter needs one.
    pub url: Option<String>,
    /// Free-form tags in declared order.
    pub tags: Vec<String>,
    /// Per-source suppression rules in declared order.
    pub suppress: Vec<SuppressionRule>,
}

/// Resolved configuration snapshot.
///
/// # Invariants
/// - `sources` is sorted by source id.
/// - Canonical serialization of this snapshot defines the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Runtime settings after environment layering.
    pub runtime: RuntimeSettings,
    /// Resolved sources sorted by id.
    pub sources: Vec<ResolvedSource>,
    /// True when suppression stamps are applied.
    pub suppression_enabled: bool,
    /// Global suppression rules in declared order.
    pub global_rules: Vec<SuppressionRule>,
}

impl ResolvedConfig {
    /// Computes the config fingerprint over the canonical snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn fingerprint(&self) -> Result<HashDigest, HashError> {
        hash_canonical_json(DEFAULT_HASH_ALGORITHM, self)
    }

    /// Returns the per-source policy profiles in snapshot order.
    #[must_use]
    pub fn profiles(&self) -> Vec<SourceProfile> {
        self.sources.iter().map(|source| source.profile.clone()).collect()
    }

    /// Returns enabled source ids in snapshot order.
    #[must_use]
    pub fn enabled_source_ids(&self) -> Vec<SourceId> {
        self.sources
            .iter()
            .filter(|source| source.profile.enabled)
            .map(|source| source.profile.source_id.clone())
            .collect()
    }

    /// Returns per-source rule lists keyed by source id.
    #[must_use]
    pub fn per_source_rules(&self) -> BTreeMap<SourceId, Vec<SuppressionRule>> {
        self.sources
            .iter()
            .filter(|source| !source.suppress.is_empty())
            .map(|source| (source.profile.source_id.clone(), source.suppress.clone()))
            .collect()
    }

    /// Compiles the suppression engine from the resolved rules.
    ///
    /// # Errors
    ///
    /// Returns [`SuppressionLoadError`] on a bad regex or duplicate id; this
    /// path fails closed at startup, never during evaluation.
    pub fn engine(&self) -> Result<SuppressionEngine, SuppressionLoadError> {
        SuppressionEngine::compile(
            self.suppression_enabled,
            &self.global_rules,
            &self.per_source_rules(),
        )
    }

    /// Compiles the engine leniently: duplicate rule ids are dropped (first
    /// declaration wins) and returned for the run-status evaluator to flag.
    ///
    /// # Errors
    ///
    /// Returns [`SuppressionLoadError`] on a bad regex; regexes never load
    /// leniently.
    pub fn engine_lenient(
        &self,
    ) -> Result<(SuppressionEngine, Vec<RuleId>), SuppressionLoadError> {
        let mut seen = std::collections::BTreeSet::new();
        let mut duplicates = Vec::new();

        let global: Vec<SuppressionRule> = self
            .global_rules
            .iter()
            .filter(|rule| {
                let fresh = seen.insert(rule.id.clone());
                if !fresh {
                    duplicates.push(rule.id.clone());
                }
                fresh
            })
            .cloned()
            .collect();
        let per_source: BTreeMap<SourceId, Vec<SuppressionRule>> = self
            .per_source_rules()
            .into_iter()
            .map(|(source_id, rules)| {
                let kept = rules
                    .into_iter()
                    .filter(|rule| {
                        let fresh = seen.insert(rule.id.clone());
                        if !fresh {
                            duplicates.push(rule.id.clone());
                        }
                        fresh
                    })
                    .collect();
                (source_id, kept)
            })
            .collect();

        let engine = SuppressionEngine::compile(self.suppression_enabled, &global, &per_source)?;
        Ok((engine, duplicates))
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Built-in base defaults under every registry layer.
const BASE_DEFAULTS: SourceDefaults = SourceDefaults {
    trust_tier: Some(2),
    classification_floor: Some(0),
    weighting_bias: Some(0),
    enabled: Some(true),
};

/// Resolves the registries and environment layer into one snapshot.
///
/// # Errors
///
/// Returns [`ConfigError`] on validation failures or malformed environment
/// overrides.
pub fn resolve(
    sources: &SourcesDocument,
    suppression: &SuppressionDocument,
    mut runtime: RuntimeSettings,
    env: &BTreeMap<String, String>,
) -> Result<ResolvedConfig, ConfigError> {
    sources.validate()?;
    apply_env_layer(&mut runtime, env)?;

    let mut resolved = Vec::new();
    for (tier, specs) in [
        (SourceTier::Global, &sources.tiers.global),
        (SourceTier::Regional, &sources.tiers.regional),
        (SourceTier::Local, &sources.tiers.local),
    ] {
        let tier_defaults = match tier {
            SourceTier::Global => sources.tier_defaults.global,
            SourceTier::Regional => sources.tier_defaults.regional,
            SourceTier::Local => sources.tier_defaults.local,
        };
        let folded_defaults =
            BASE_DEFAULTS.folded_with(sources.defaults).folded_with(tier_defaults);
        for spec in specs {
            resolved.push(resolve_source(spec, tier, folded_defaults)?);
        }
    }
    resolved.sort_by(|left, right| left.profile.source_id.cmp(&right.profile.source_id));

    Ok(ResolvedConfig {
        runtime,
        sources: resolved,
        suppression_enabled: suppression.enabled,
        global_rules: suppression.rules.clone(),
    })
}

/// Resolves one source spec against its folded defaults.
fn resolve_source(
    spec: &SourceSpec,
    tier: SourceTier,
    defaults: SourceDefaults,
) -> Result<ResolvedSource, ConfigError> {
    let trust_raw = spec.trust_tier.or(defaults.trust_tier).unwrap_or(2);
    let trust_tier = TrustTier::try_from(trust_raw)
        .map_err(|message| ConfigError::Validation(format!("source {}: {message}", spec.id)))?;
    let floor_raw = spec.classification_floor.or(defaults.classification_floor).unwrap_or(0);
    let classification_floor = Classification::try_from(floor_raw)
        .map_err(|message| ConfigError::Validation(format!("source {}: {message}", spec.id)))?;
    let weighting_bias = spec.weighting_bias.or(defaults.weighting_bias).unwrap_or(0);
    if !(-2 ..= 2).contains(&weighting_bias) {
        return Err(ConfigError::Validation(format!(
            "source {}: weighting_bias out of range: {weighting_bias}",
            spec.id
        )));
    }

    Ok(ResolvedSource {
        profile: SourceProfile {
            source_id: SourceId::new(spec.id.clone()),
            source_type: spec.source_type.clone(),
            tier,
            trust_tier,
            classification_floor,
            weighting_bias,
            enabled: spec.enabled.or(defaults.enabled).unwrap_or(true),
        },
        url: spec.url.clone(),
        tags: spec.tags.clone(),
        suppress: spec.suppress.clone(),
    })
}

/// Applies `HARDSTOP_*` environment overrides onto the runtime settings.
fn apply_env_layer(
    runtime: &mut RuntimeSettings,
    env: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    if let Some(path) = env.get(ENV_DB_PATH) {
        runtime.db_path = path.clone();
    }
    if let Some(dir) = env.get(ENV_RUN_RECORDS_DIR) {
        runtime.run_records_dir = dir.clone();
    }
    if let Some(days) = env.get(ENV_CORRELATION_WINDOW_DAYS) {
        runtime.correlator.window_days = parse_env_number(ENV_CORRELATION_WINDOW_DAYS, days)?;
    }
    if let Some(cap) = env.get(ENV_MAX_SHIPMENTS) {
        let parsed: i64 = parse_env_number(ENV_MAX_SHIPMENTS, cap)?;
        runtime.linker.max_shipments = usize::try_from(parsed).map_err(|_| {
            ConfigError::Validation(format!("{ENV_MAX_SHIPMENTS} out of range: {parsed}"))
        })?;
    }
    if let Some(hours) = env.get(ENV_STALE_THRESHOLD_HOURS) {
        runtime.health.stale_threshold_hours = parse_env_number(ENV_STALE_THRESHOLD_HOURS, hours)?;
    }
    Ok(())
}

/// Parses one numeric environment override.
fn parse_env_number(key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} is not a number: {value}")))
}
