//! In-memory target catalog.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::models::*;

/// Catalog loading errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Mapping from target URL to target metadata.
///
/// Owned by the scheduler task; other tasks only see snapshots.
#[derive(Debug, Default)]
pub struct Catalog {
    targets: HashMap<String, Target>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load static targets from a JSON catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    /// Parse static targets from JSON catalog data.
    pub fn from_json(data: &[u8]) -> Result<Self, CatalogError> {
        let parsed: StaticCatalog = serde_json::from_slice(data)?;
        let mut catalog = Self::new();
        for entry in parsed.monitors {
            catalog.insert(Target::fixed(entry.target_url, entry.method));
        }
        Ok(catalog)
    }

    /// Insert or replace a target, returning the previous entry.
    pub fn insert(&mut self, target: Target) -> Option<Target> {
        self.targets.insert(target.url.clone(), target)
    }

    /// Record a discovery sighting of `url` at `now`.
    ///
    /// Static entries keep their metadata so they stay out of TTL eviction.
    pub fn refresh_discovered(&mut self, url: &str, now: DateTime<Utc>) {
        match self.targets.get_mut(url) {
            Some(existing) if existing.is_static() => {}
            Some(existing) => existing.discovered_at = Some(now),
            None => {
                self.targets
                    .insert(url.to_string(), Target::discovered(url, now));
            }
        }
    }

    /// Remove every discovered target last seen strictly before `cutoff`.
    pub fn evict_discovered_before(&mut self, cutoff: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .targets
            .values()
            .filter(|t| matches!(t.discovered_at, Some(at) if at < cutoff))
            .map(|t| t.url.clone())
            .collect();

        for url in &expired {
            self.targets.remove(url);
        }
        expired
    }

    #[cfg(test)]
    pub fn get(&self, url: &str) -> Option<&Target> {
        self.targets.get(url)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Copy of every target currently in the catalog.
    pub fn snapshot(&self) -> Vec<Target> {
        self.targets.values().cloned().collect()
    }
}
