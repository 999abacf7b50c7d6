//! Durable ledger cache
//!
//! The whole ledger is written to a single file after every accepted scan:
//! JSON `{ "scanned": [...] }`, zstd compressed, replaced atomically through
//! a temp file + rename. A crash therefore loses at most the scan that was
//! being written.

use crate::error::CacheError;
use crate::ledger::ScannedRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// zstd level; the payload is small so favor speed
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Serialize)]
struct CachedLedgerRef<'a> {
    scanned: &'a [ScannedRecord],
}

#[derive(Deserialize)]
struct CachedLedger {
    #[serde(default)]
    scanned: Vec<ScannedRecord>,
}

#[derive(Debug, Clone)]
pub struct LedgerCache {
    path: PathBuf,
}

impl LedgerCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full ledger, replacing any previous copy
    pub fn save(&self, records: &[ScannedRecord]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = serde_json::to_vec(&CachedLedgerRef { scanned: records })
            .map_err(|e| CacheError::Decode(e.to_string()))?;
        let compressed = zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL)?;

        let temp_path = self.temp_path();
        if let Err(e) = write_replace(&temp_path, &self.path, &compressed) {
            // Best effort; the temp file may not exist
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::Io(e));
        }

        debug!(records = records.len(), bytes = compressed.len(), "Ledger cache written");
        Ok(())
    }

    /// Read the persisted ledger
    ///
    /// A missing file is an empty ledger, not an error.
    pub fn load(&self) -> Result<Vec<ScannedRecord>, CacheError> {
        let compressed = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let decompressed = zstd::decode_all(compressed.as_slice())
            .map_err(|e| CacheError::Decode(e.to_string()))?;
        let cached: CachedLedger = serde_json::from_slice(&decompressed)
            .map_err(|e| CacheError::Decode(e.to_string()))?;
        Ok(cached.scanned)
    }

    /// Remove the persisted ledger
    pub fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Write `bytes` to `temp_path`, flush it to disk and move it over `path`
fn write_replace(temp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(temp_path, path)
}
