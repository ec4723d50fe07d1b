//! Persistent element selector cache
//!
//! Maps `(page URL, element description)` to the selector that last resolved
//! it, so repeat runs skip heuristics and LLM calls. Stored as pretty JSON and
//! rewritten after every new entry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::types::{ResolutionSource, Selector, SelectorKind};

/// A cached selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub selector: String,
    #[serde(default = "default_kind")]
    pub selector_type: SelectorKind,
    pub url: String,
    pub element_description: String,
    /// Strategy that first resolved this element
    #[serde(default = "default_source")]
    pub source: ResolutionSource,
    /// Unix epoch for entries written without a timestamp
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

// Older cache files omit these; their selectors were XPath found by page inspection
fn default_kind() -> SelectorKind {
    SelectorKind::Xpath
}

fn default_source() -> ResolutionSource {
    ResolutionSource::Heuristic
}

impl CacheEntry {
    pub fn to_selector(&self) -> Selector {
        Selector {
            kind: self.selector_type,
            expression: self.selector.clone(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub cache_file: PathBuf,
    pub cache_size_bytes: u64,
}

/// Lowercased, trimmed, whitespace-collapsed phrase
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key for an element description on a page
pub fn cache_key(url: &str, description: &str) -> String {
    let combined = format!("{}::{}", url, normalize_description(description));
    hex::encode(Sha256::digest(combined.as_bytes()))
}

pub struct ElementCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

impl ElementCache {
    /// Load the cache from `path`.
    ///
    /// A missing file starts an empty cache. An unreadable or corrupt file is
    /// logged and also starts empty; it is overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(Some(entries)) => {
                info!("Loaded cache with {} entries", entries.len());
                entries
            }
            Ok(None) => {
                info!("No cache file found at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                error!("Error loading cache from {}: {:#}", path.display(), e);
                BTreeMap::new()
            }
        };

        ElementCache { path, entries }
    }

    fn read_entries(path: &Path) -> Result<Option<BTreeMap<String, CacheEntry>>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).context("Failed to read cache file")?;
        if content.trim().is_empty() {
            return Ok(Some(BTreeMap::new()));
        }
        let entries: BTreeMap<String, CacheEntry> =
            serde_json::from_str(&content).context("Cache file is not valid JSON")?;
        // Keys are recomputed so files written with another key scheme stay usable
        let entries = entries
            .into_values()
            .map(|entry| (cache_key(&entry.url, &entry.element_description), entry))
            .collect();
        Ok(Some(entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, url: &str, description: &str) -> Option<&CacheEntry> {
        let entry = self.entries.get(&cache_key(url, description));
        if entry.is_some() {
            debug!("Cache hit for: {}", description);
        } else {
            debug!("Cache miss for: {}", description);
        }
        entry
    }

    /// Store a resolved selector and persist the cache
    pub fn set(
        &mut self,
        url: &str,
        description: &str,
        selector: &Selector,
        source: ResolutionSource,
    ) {
        let entry = CacheEntry {
            selector: selector.expression.clone(),
            selector_type: selector.kind,
            url: url.to_string(),
            element_description: description.to_string(),
            source,
            created_at: Utc::now(),
        };
        self.entries.insert(cache_key(url, description), entry);
        info!("Cached selector for: {} -> {}", description, selector);
        self.persist();
    }

    /// Drop an entry, returning it if it existed
    pub fn remove(&mut self, url: &str, description: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(&cache_key(url, description));
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
        info!("Cache cleared");
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            cache_file: self.path.clone(),
            cache_size_bytes: std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }

    /// Write the cache to disk through a temp file in the same directory
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write cache file {}", self.path.display()))?;

        debug!("Saved cache with {} entries", self.entries.len());
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("Error saving cache: {:#}", e);
        }
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
