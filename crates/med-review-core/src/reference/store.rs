//! Per-slug record storage addressed as `<domain>/<slug>`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use super::{ReferenceError, ReferenceResult};
use crate::config::ReferenceConfig;

/// Which family of records a slug addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordDomain {
    /// Drug profile records
    Profile,
    /// Drug interaction records
    Interaction,
}

impl RecordDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordDomain::Profile => "drugs",
            RecordDomain::Interaction => "drug_interactions",
        }
    }
}

impl fmt::Display for RecordDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw JSON records.
pub trait RecordStore: Send + Sync {
    /// Raw JSON for `<domain>/<slug>`, or `None` when no record exists.
    fn load(&self, domain: RecordDomain, slug: &str) -> ReferenceResult<Option<String>>;
}

/// Records stored as `<dir>/<slug>.json` files.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    profile_dir: PathBuf,
    interaction_dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(profile_dir: PathBuf, interaction_dir: PathBuf) -> Self {
        Self {
            profile_dir,
            interaction_dir,
        }
    }

    pub fn from_config(config: &ReferenceConfig) -> Self {
        Self::new(config.profile_records_dir(), config.interaction_records_dir())
    }

    /// File path for a record.
    pub fn path_for(&self, domain: RecordDomain, slug: &str) -> PathBuf {
        let dir = match domain {
            RecordDomain::Profile => &self.profile_dir,
            RecordDomain::Interaction => &self.interaction_dir,
        };
        dir.join(format!("{}.json", slug))
    }
}

impl RecordStore for FsRecordStore {
    fn load(&self, domain: RecordDomain, slug: &str) -> ReferenceResult<Option<String>> {
        // Slugs are storage keys, never paths
        if slug.is_empty() || slug.contains(['/', '\\']) || slug.contains("..") {
            tracing::warn!(%domain, slug, "Rejecting slug that is not a plain storage key");
            return Ok(None);
        }

        let path = self.path_for(domain, slug);
        match std::fs::read_to_string(&path) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ReferenceError::Io { path, source }),
        }
    }
}

/// In-memory records, for fixtures and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: HashMap<(RecordDomain, String), String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record.
    pub fn insert(&mut self, domain: RecordDomain, slug: &str, json: impl Into<String>) {
        self.records.insert((domain, slug.to_string()), json.into());
    }

    /// Builder-style insert.
    pub fn with_record(mut self, domain: RecordDomain, slug: &str, json: impl Into<String>) -> Self {
        self.insert(domain, slug, json);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, domain: RecordDomain, slug: &str) -> ReferenceResult<Option<String>> {
        Ok(self.records.get(&(domain, slug.to_string())).cloned())
    }
}
