// crates/hardstop-core/src/runtime/suppress.rs
// ============================================================================
// Module: Suppression Engine
// Description: Ordered global-then-per-source rule evaluation.
// Purpose: Filter noise deterministically and stamp matched rule provenance.
// Dependencies: crate::core, regex, serde, thiserror
// ============================================================================

//! ## Overview
//! Suppression rules form a stable, total sequence: global rules precede
//! per-source rules unconditionally, and declared order is preserved within
//! each list. Rules fail at load time (`InvalidSuppressionRule`) when a regex
//! does not compile or an id repeats; evaluation itself never fails. All
//! matched rule ids are collected; the first match is primary and owns the
//! reason code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::event::Event;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::SourceId;

// ============================================================================
// SECTION: Rule Model
// ============================================================================

/// Suppression rule match kind.
///
/// # Invariants
/// - Variants are stable for serialization and registry parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Case-configurable substring match.
    Keyword,
    /// Regular expression match.
    Regex,
    /// Exact field equality.
    Exact,
}

/// Field a suppression rule tests.
///
/// # Invariants
/// - `Any` tests title, summary, and raw text in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    /// Event title.
    Title,
    /// Event summary.
    Summary,
    /// Full raw text.
    RawText,
    /// Item URL.
    Url,
    /// Inferred event type label.
    EventType,
    /// Producing source identifier.
    SourceId,
    /// Source scope tier label.
    Tier,
    /// Title, summary, then raw text.
    Any,
}

/// Declared suppression rule.
///
/// # Invariants
/// - `id` is unique across global and per-source lists.
/// - `pattern` must compile when `kind` is [`RuleKind::Regex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionRule {
    /// Rule identifier.
    pub id: RuleId,
    /// Match kind.
    pub kind: RuleKind,
    /// Field under test.
    pub field: RuleField,
    /// Pattern, keyword, or exact value.
    pub pattern: String,
    /// True when matching is case sensitive.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Reason code attached when this rule is primary.
    pub reason_code: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Suppression configuration errors, raised at load time only.
///
/// # Invariants
/// - Evaluation never raises; all failures surface during compile.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuppressionLoadError {
    /// A regex rule failed to compile.
    #[error("invalid suppression rule {rule_id}: {message}")]
    InvalidRegex {
        /// Offending rule.
        rule_id: RuleId,
        /// Compiler message.
        message: String,
    },
    /// A rule id appears more than once.
    #[error("duplicate suppression rule id: {0}")]
    DuplicateRuleId(RuleId),
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Evaluation result for one event.
///
/// # Invariants
/// - `matched_rule_ids` preserves evaluation order.
/// - `primary_rule_id` is the first entry when any rule matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuppressionVerdict {
    /// All matched rules in evaluation order.
    pub matched_rule_ids: Vec<RuleId>,
    /// First matched rule.
    pub primary_rule_id: Option<RuleId>,
    /// Reason code from the primary rule.
    pub reason_code: Option<String>,
}

impl SuppressionVerdict {
    /// Returns true when at least one rule matched.
    #[must_use]
    pub fn suppressed(&self) -> bool {
        self.primary_rule_id.is_some()
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Compiled rule with its optional regex.
#[derive(Debug, Clone)]
struct CompiledRule {
    /// Declared rule.
    rule: SuppressionRule,
    /// Compiled regex for regex-kind rules.
    regex: Option<Regex>,
}

/// Compiled suppression engine over global and per-source rule lists.
///
/// # Invariants
/// - Rule order is global-then-per-source, declared order within each list.
#[derive(Debug, Clone, Default)]
pub struct SuppressionEngine {
    /// Global rules in declared order.
    global: Vec<CompiledRule>,
    /// Per-source rules in declared order.
    per_source: BTreeMap<SourceId, Vec<CompiledRule>>,
    /// True when suppression is enabled in the registry.
    enabled: bool,
}

impl SuppressionEngine {
    /// Compiles global and per-source rules, validating regexes and id
    /// uniqueness across both lists.
    ///
    /// # Errors
    ///
    /// Returns [`SuppressionLoadError`] on a bad regex or duplicate id.
    pub fn compile(
        enabled: bool,
        global: &[SuppressionRule],
        per_source: &BTreeMap<SourceId, Vec<SuppressionRule>>,
    ) -> Result<Self, SuppressionLoadError> {
        let mut seen = BTreeSet::new();
        let compiled_global = compile_list(global, &mut seen)?;
        let mut compiled_per_source = BTreeMap::new();
        for (source_id, rules) in per_source {
            compiled_per_source.insert(source_id.clone(), compile_list(rules, &mut seen)?);
        }
        Ok(Self {
            global: compiled_global,
            per_source: compiled_per_source,
            enabled,
        })
    }

    /// Returns true when suppression is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Evaluates all applicable rules against an event.
    ///
    /// Always runs to completion; disabling suppression is a caller concern
    /// (the verdict is still useful for diagnostics).
    #[must_use]
    pub fn evaluate(&self, event: &Event, summary: &str) -> SuppressionVerdict {
        let mut verdict = SuppressionVerdict::default();
        for compiled in self.rules_for(&event.source_id) {
            if rule_matches(compiled, event, summary) {
                if verdict.primary_rule_id.is_none() {
                    verdict.primary_rule_id = Some(compiled.rule.id.clone());
                    verdict.reason_code = Some(compiled.rule.reason_code.clone());
                }
                verdict.matched_rule_ids.push(compiled.rule.id.clone());
            }
        }
        verdict
    }

    /// Returns the ordered rule chain for a source: global then per-source.
    fn rules_for(&self, source_id: &SourceId) -> impl Iterator<Item = &CompiledRule> {
        self.global
            .iter()
            .chain(self.per_source.get(source_id).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Compiles one declared rule list, tracking id uniqueness.
fn compile_list(
    rules: &[SuppressionRule],
    seen: &mut BTreeSet<RuleId>,
) -> Result<Vec<CompiledRule>, SuppressionLoadError> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        if !seen.insert(rule.id.clone()) {
            return Err(SuppressionLoadError::DuplicateRuleId(rule.id.clone()));
        }
        let regex = match rule.kind {
            RuleKind::Regex => Some(
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(!rule.case_sensitive)
                    .build()
                    .map_err(|err| SuppressionLoadError::InvalidRegex {
                        rule_id: rule.id.clone(),
                        message: err.to_string(),
                    })?,
            ),
            RuleKind::Keyword | RuleKind::Exact => None,
        };
        compiled.push(CompiledRule {
            rule: rule.clone(),
            regex,
        });
    }
    Ok(compiled)
}

/// Tests one compiled rule against an event.
fn rule_matches(compiled: &CompiledRule, event: &Event, summary: &str) -> bool {
    let empty = String::new();
    let url = event.url.as_ref().unwrap_or(&empty);
    let event_type = event.event_type.as_str();
    let source_id = event.source_id.as_str();
    let tier = event.tier.as_str();
    match compiled.rule.field {
        RuleField::Title => value_matches(compiled, &event.title),
        RuleField::Summary => value_matches(compiled, summary),
        RuleField::RawText => value_matches(compiled, &event.raw_text),
        RuleField::Url => value_matches(compiled, url),
        RuleField::EventType => value_matches(compiled, event_type),
        RuleField::SourceId => value_matches(compiled, source_id),
        RuleField::Tier => value_matches(compiled, tier),
        RuleField::Any => {
            value_matches(compiled, &event.title)
                || value_matches(compiled, summary)
                || value_matches(compiled, &event.raw_text)
        }
    }
}

/// Tests one compiled rule against a single field value.
fn value_matches(compiled: &CompiledRule, value: &str) -> bool {
    match compiled.rule.kind {
        RuleKind::Keyword => {
            if compiled.rule.case_sensitive {
                value.contains(&compiled.rule.pattern)
            } else {
                value.to_lowercase().contains(&compiled.rule.pattern.to_lowercase())
            }
        }
        RuleKind::Exact => {
            if compiled.rule.case_sensitive {
                value == compiled.rule.pattern
            } else {
                value.eq_ignore_ascii_case(&compiled.rule.pattern)
            }
        }
        RuleKind::Regex => compiled.regex.as_ref().is_some_and(|regex| regex.is_match(value)),
    }
}
