// crates/hardstop-config/src/lib.rs
// ============================================================================
// Module: Hardstop Config
// Description: Sources and suppression registries, resolution, fingerprint.
// Purpose: Turn layered YAML registries into one hashed, resolved snapshot.
// Dependencies: hardstop-core, serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Configuration is merged top-down: built-in defaults, then the registry's
//! `defaults` section, then `tier_defaults`, then per-source fields, with
//! per-source overrides winning. Environment-layered overrides fold into the
//! runtime section before resolution. The resolved snapshot serializes
//! canonically; its SHA-256 is the config fingerprint embedded in every
//! RunRecord, identical across hosts for identical inputs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod resolve;
pub mod sources;
pub mod suppression;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use thiserror::Error;

pub use crate::resolve::ResolvedConfig;
pub use crate::resolve::ResolvedSource;
pub use crate::resolve::RuntimeSettings;
pub use crate::resolve::resolve;
pub use crate::sources::SourceDefaults;
pub use crate::sources::SourceSpec;
pub use crate::sources::SourcesDocument;
pub use crate::suppression::SuppressionDocument;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - `Parse` and fatal `Validation` errors map to exit code 2.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Registry file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Registry file is malformed YAML or violates the schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Registry content is invalid (range, uniqueness, reference errors).
    #[error("config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Loaders
// ============================================================================

/// Loads and parses the sources registry from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] on read failure and [`ConfigError::Parse`] on
/// malformed YAML.
pub fn load_sources(path: &Path) -> Result<SourcesDocument, ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    parse_sources(&text)
}

/// Parses the sources registry from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on malformed YAML.
pub fn parse_sources(text: &str) -> Result<SourcesDocument, ConfigError> {
    serde_yaml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Loads and parses the suppression registry from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] on read failure and [`ConfigError::Parse`] on
/// malformed YAML.
pub fn load_suppression(path: &Path) -> Result<SuppressionDocument, ConfigError> {
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    parse_suppression(&text)
}

/// Parses the suppression registry from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on malformed YAML.
pub fn parse_suppression(text: &str) -> Result<SuppressionDocument, ConfigError> {
    serde_yaml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
}
