// crates/hardstop-cli/src/run_records.rs
// ============================================================================
// Module: Run Record Files
// Description: Writes one canonical JSON file per RunRecord beside the store.
// Purpose: Keep replayable provenance artifacts inspectable on disk.
// Dependencies: hardstop-core, hardstop-store-sqlite
// ============================================================================

//! ## Overview
//! RunRecords land in two places: the SQLite store (for queries) and one
//! canonical JSON file per record under the configured `run_records/`
//! directory (for inspection and CI snapshots). Filenames are the run id,
//! which is pinned under replay, so snapshot paths stay stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use hardstop_core::RunRecord;
use hardstop_core::StoreError;
use hardstop_core::hashing::canonical_json_bytes;
use hardstop_core::interfaces::RunRecordStore;
use hardstop_store_sqlite::HardstopStore;

use crate::CliError;
use crate::CliResult;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// RunRecord sink writing to the store and one file per record.
pub struct FileRunRecordSink {
    /// Directory receiving record files.
    directory: PathBuf,
    /// Durable store receiving the same records.
    store: HardstopStore,
}

impl FileRunRecordSink {
    /// Creates the sink, ensuring the directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] when the directory cannot be created.
    pub fn new(directory: &Path, store: HardstopStore) -> CliResult<Self> {
        fs::create_dir_all(directory)
            .map_err(|err| CliError::new(format!("{}: {err}", directory.display())))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            store,
        })
    }
}

impl RunRecordStore for FileRunRecordSink {
    fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        RunRecordStore::append(&self.store, record)?;
        let bytes =
            canonical_json_bytes(record).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let path = self.directory.join(format!("{}.json", record.run_id));
        fs::write(&path, bytes).map_err(|err| StoreError::Io(format!("{}: {err}", path.display())))
    }
}
