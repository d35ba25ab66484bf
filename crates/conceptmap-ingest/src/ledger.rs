//! Which chapter files have already been extracted.
//!
//! The ledger is plain data: the caller loads it, hands it to the driver by
//! `&mut`, and saves it afterwards. A file is skipped when its content hash is
//! unchanged since it was last processed successfully.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use conceptmap_graph::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// SHA-256 of the file content, lowercase hex.
    pub hash: String,
    pub section_ids: Vec<String>,
    pub processed_at: DateTime<Utc>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessedLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

/// Ledger key for file content: SHA-256, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl ProcessedLedger {
    /// Load from `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading ledger {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing ledger {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        conceptmap_graph::write_json(path, self)
            .with_context(|| format!("writing ledger {}", path.display()))
    }

    pub fn get(&self, path: &Path) -> Option<&LedgerEntry> {
        self.entries.get(&key(path))
    }

    pub fn is_unchanged(&self, path: &Path, hash: &str) -> bool {
        self.get(path).is_some_and(|e| e.hash == hash)
    }

    pub fn record(&mut self, path: &Path, hash: String, section_ids: Vec<String>, output_dir: &Path) {
        self.entries.insert(
            key(path),
            LedgerEntry {
                hash,
                section_ids,
                processed_at: Utc::now(),
                output_dir: output_dir.to_path_buf(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
