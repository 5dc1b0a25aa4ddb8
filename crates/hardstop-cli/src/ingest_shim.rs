// crates/hardstop-cli/src/ingest_shim.rs
// ============================================================================
// Module: File Ingest Shim
// Description: Loads collaborator item files and network snapshots from disk.
// Purpose: Stand in for the HTTP fetch collaborator in local-first runs.
// Dependencies: hardstop-config, hardstop-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The fetch collaborator lives outside this repository; locally, raw items
//! arrive as a JSON file. The shim parses the file, stamps each item with
//! its source's resolved tiers, computes the content hash over the canonical
//! payload, saves idempotently, and reports one fetch row per source. A file
//! may also declare simulated fetch failures so runs can be rehearsed
//! end-to-end without a network.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use hardstop_config::ResolvedConfig;
use hardstop_core::NetworkSnapshot;
use hardstop_core::RawItem;
use hardstop_core::RawItemId;
use hardstop_core::RawItemStatus;
use hardstop_core::SourceId;
use hardstop_core::SourceRunStatus;
use hardstop_core::UtcTimestamp;
use hardstop_core::hashing::DEFAULT_HASH_ALGORITHM;
use hardstop_core::hashing::hash_canonical_json;
use hardstop_core::hashing::short_token;
use hardstop_core::interfaces::RawItemStore;
use hardstop_core::runtime::pipeline::FetchReport;
use hardstop_store_sqlite::HardstopStore;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::CliError;
use crate::CliResult;

// ============================================================================
// SECTION: File Model
// ============================================================================

/// One raw item as the collaborator delivers it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IncomingItem {
    /// Producing source identifier.
    source_id: String,
    /// Source-supplied stable identifier.
    canonical_id: String,
    /// Item title.
    title: String,
    /// Item summary.
    #[serde(default)]
    summary: String,
    /// Full raw text.
    #[serde(default)]
    raw_text: String,
    /// Item URL.
    #[serde(default)]
    url: Option<String>,
    /// Publication instant (RFC 3339 or date-only).
    #[serde(default)]
    published_at: Option<String>,
}

/// Simulated fetch failure for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FailureSpec {
    /// Failing source identifier.
    source_id: String,
    /// Transport status code.
    #[serde(default)]
    status_code: Option<u16>,
    /// Error message.
    #[serde(default)]
    error: Option<String>,
}

/// Items file: a bare array, or an object with items and failures.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemsFile {
    /// Bare array of items.
    Items(Vec<IncomingItem>),
    /// Structured form with simulated failures.
    Structured {
        /// Fetched items.
        #[serde(default)]
        items: Vec<IncomingItem>,
        /// Simulated fetch failures.
        #[serde(default)]
        failures: Vec<FailureSpec>,
    },
}

/// Canonical payload view the content hash covers.
#[derive(Debug, Serialize)]
struct ContentHashView<'item> {
    /// Item title.
    title: &'item str,
    /// Item summary.
    summary: &'item str,
    /// Full raw text.
    raw_text: &'item str,
    /// Item URL.
    url: Option<&'item str>,
}

// ============================================================================
// SECTION: Items Loader
// ============================================================================

/// Parses an items file, persists its items, and returns fetch reports.
///
/// # Errors
///
/// Returns [`CliError`] on unreadable or malformed files, or store failures.
pub fn save_items_file(
    path: &Path,
    config: &ResolvedConfig,
    store: &HardstopStore,
    now: UtcTimestamp,
) -> CliResult<Vec<FetchReport>> {
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::new(format!("{}: {err}", path.display())))?;
    let file: ItemsFile = serde_json::from_str(&text)
        .map_err(|err| CliError::new(format!("{}: {err}", path.display())))?;
    let (items, failures) = match file {
        ItemsFile::Items(items) => (items, Vec::new()),
        ItemsFile::Structured {
            items,
            failures,
        } => (items, failures),
    };

    let mut reports: Vec<FetchReport> = Vec::new();
    for item in items {
        let source_id = SourceId::new(item.source_id.clone());
        let Some(source) =
            config.sources.iter().find(|source| source.profile.source_id == source_id)
        else {
            warn!(source = %source_id, "items file references unknown source; skipped");
            continue;
        };

        let published_at_utc = item.published_at.as_deref().and_then(|text| {
            let parsed = UtcTimestamp::parse_lenient(text);
            if parsed.is_err() {
                warn!(source = %source_id, value = text, "unparseable publication instant");
            }
            parsed.ok()
        });

        let view = ContentHashView {
            title: &item.title,
            summary: &item.summary,
            raw_text: &item.raw_text,
            url: item.url.as_deref(),
        };
        let content_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &view)
            .map_err(|err| CliError::new(err.to_string()))?;
        let bytes = (item.title.len() + item.summary.len() + item.raw_text.len()) as u64;

        let raw = RawItem {
            raw_item_id: RawItemId::new(format!(
                "RI-{}",
                short_token(&format!("{source_id}|{}", item.canonical_id), 12)
            )),
            source_id: source_id.clone(),
            canonical_id: item.canonical_id,
            content_hash,
            title: item.title,
            summary: item.summary,
            raw_text: item.raw_text,
            url: item.url,
            published_at_utc,
            fetched_at_utc: now,
            status: RawItemStatus::New,
            suppression: None,
            trust_tier: source.profile.trust_tier,
            tier: source.profile.tier,
        };
        let outcome = store.save(&raw).map_err(|err| CliError::new(err.to_string()))?;

        let report = report_for(&mut reports, &source_id);
        report.items_fetched += 1;
        report.bytes_downloaded += bytes;
        if outcome.is_created() {
            report.items_new += 1;
        }
    }

    for failure in failures {
        let source_id = SourceId::new(failure.source_id);
        let report = report_for(&mut reports, &source_id);
        report.status = SourceRunStatus::Failure;
        report.status_code = failure.status_code;
        report.error = failure.error;
    }

    Ok(reports)
}

/// Finds or inserts the fetch report for a source.
fn report_for<'reports>(
    reports: &'reports mut Vec<FetchReport>,
    source_id: &SourceId,
) -> &'reports mut FetchReport {
    let index = reports
        .iter()
        .position(|report| report.source_id == *source_id)
        .unwrap_or_else(|| {
            reports.push(FetchReport {
                source_id: source_id.clone(),
                status: SourceRunStatus::Success,
                status_code: Some(200),
                error: None,
                items_fetched: 0,
                items_new: 0,
                bytes_downloaded: 0,
                duration_seconds: 0.0,
            });
            reports.len() - 1
        });
    &mut reports[index]
}

// ============================================================================
// SECTION: Network Loader
// ============================================================================

/// Loads the network snapshot from a JSON file.
///
/// # Errors
///
/// Returns [`CliError`] on unreadable or malformed files.
pub fn load_network_snapshot(path: &Path) -> CliResult<NetworkSnapshot> {
    let text = fs::read_to_string(path)
        .map_err(|err| CliError::new(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|err| CliError::new(format!("{}: {err}", path.display())))
}
