// crates/hardstop-config/src/suppression.rs
// ============================================================================
// Module: Suppression Registry Model
// Description: YAML model for the global suppression rule list.
// Purpose: Parse the registry and split strict from lenient validation.
// Dependencies: hardstop-core, serde
// ============================================================================

//! ## Overview
//! The suppression registry is an enabled flag plus an ordered rule list
//! with unique ids. Two validation paths exist: the engine compile path
//! fails closed on a bad regex or duplicate id, while the lenient path loads
//! the registry and reports duplicates as findings for the run-status
//! evaluator (exit 1).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use hardstop_core::RuleId;
use hardstop_core::runtime::suppress::SuppressionRule;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Document Model
// ============================================================================

/// Parsed suppression registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuppressionDocument {
    /// True when suppression stamps are applied.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Global rules in declared order.
    #[serde(default)]
    pub rules: Vec<SuppressionRule>,
}

impl Default for SuppressionDocument {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

/// Returns the default enabled flag.
const fn default_enabled() -> bool {
    true
}

impl SuppressionDocument {
    /// Returns duplicate rule ids for the lenient load path.
    ///
    /// The registry still loads; duplicates surface as warnings through the
    /// run-status evaluator.
    #[must_use]
    pub fn duplicate_rule_ids(&self) -> Vec<RuleId> {
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.clone()) && !duplicates.contains(&rule.id) {
                duplicates.push(rule.id.clone());
            }
        }
        duplicates
    }
}
