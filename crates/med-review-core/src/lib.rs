//! Medication Review Core Library
//!
//! Drug reference resolution and interaction lookup for LLM medication reviews.
//!
//! # Architecture
//!
//! ```text
//! free-text drug name
//!         │
//!         ▼
//!   normalize (trim, lowercase)
//!         │
//!         ├── exact key in target table ──────────────► slug
//!         │
//!         ▼
//!   synonym table (exact / fuzzy) → ingredients
//!         │
//!         ▼
//!   per-ingredient lookup (exact / fuzzy)
//!         │
//!   ┌─────┴──────────────────────────┐
//!   │ profile: one slug or NoMatch   │ interactions: set of slugs
//!   │ ("a with b" for combinations)  │ (best effort, may be empty)
//!   └─────┬──────────────────────────┘
//!         ▼
//!   record store (<domain>/<slug>.json) → rendered text for the model
//! ```
//!
//! # Modules
//!
//! - [`config`]: Data root, table locations, fuzzy threshold
//! - [`reference`]: TSV lookup tables and record storage
//! - [`resolver`]: Exact + fuzzy name resolution
//! - [`lookup`]: Profile fetcher and interaction aggregator
//! - [`models`]: Domain types (DrugProfile, Interaction, Patient, etc.)
//! - [`dataset`]: JSON Lines patient loader
//! - [`render`]: HTML to markdown for reference content

pub mod config;
pub mod dataset;
pub mod lookup;
pub mod models;
pub mod reference;
pub mod render;
pub mod resolver;

// Re-export commonly used types
pub use config::ReferenceConfig;
pub use dataset::{load_jsonl, PatientSchemaHandler, V1Handler};
pub use lookup::DrugReference;
pub use models::{
    DrugProfile, FlagIndicator, HarmSeverity, Interaction, InteractionList, MatchKind, Patient,
    ReviewFlag,
};
pub use reference::{FsRecordStore, LookupTable, MemoryRecordStore, RecordDomain, RecordStore, ReferenceTables};
pub use resolver::{Resolver, ResolverError, ResolverResult};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedReviewError {
    #[error("No match: {0}")]
    NoMatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<ResolverError> for MedReviewError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::NoMatch(name) => MedReviewError::NoMatch(name),
            ResolverError::NotFound { .. } => MedReviewError::NotFound(e.to_string()),
            ResolverError::MalformedRecord { .. } => MedReviewError::MalformedRecord(e.to_string()),
            ResolverError::Reference(inner) => MedReviewError::ReferenceData(inner.to_string()),
        }
    }
}

impl From<reference::ReferenceError> for MedReviewError {
    fn from(e: reference::ReferenceError) -> Self {
        MedReviewError::ReferenceData(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Load reference data from a data root with the default threshold.
#[uniffi::export]
pub fn open_reference(data_root: String) -> Result<Arc<MedReviewCore>, MedReviewError> {
    open_reference_with_threshold(data_root, config::DEFAULT_THRESHOLD)
}

/// Load reference data with an explicit fuzzy threshold (0-100, exclusive).
#[uniffi::export]
pub fn open_reference_with_threshold(
    data_root: String,
    threshold: f64,
) -> Result<Arc<MedReviewCore>, MedReviewError> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(MedReviewError::InvalidInput(format!(
            "threshold {} is outside 0-100",
            threshold
        )));
    }
    let config = ReferenceConfig::with_data_root(data_root).threshold(threshold);
    let reference = DrugReference::open(&config)?;
    Ok(Arc::new(MedReviewCore { reference }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Loaded reference data, shared with the host orchestrator.
#[derive(uniffi::Object)]
pub struct MedReviewCore {
    reference: DrugReference,
}

impl MedReviewCore {
    pub fn new(reference: DrugReference) -> Arc<Self> {
        Arc::new(Self { reference })
    }

    pub fn reference(&self) -> &DrugReference {
        &self.reference
    }
}

#[uniffi::export]
impl MedReviewCore {
    /// Rendered drug profile for a drug name.
    pub fn profile_lookup(&self, drug_name: String) -> Result<String, MedReviewError> {
        Ok(self.reference.profile_lookup(&drug_name)?)
    }

    /// Rendered interactions among a list of drug names.
    pub fn interactions_lookup(&self, drug_names: Vec<String>) -> String {
        self.reference.interactions_lookup(drug_names.as_slice())
    }

    /// Profile slug a drug name resolves to.
    pub fn resolve_profile_slug(&self, drug_name: String) -> Result<FfiProfileResolution, MedReviewError> {
        let resolution = self.reference.resolver().resolve_profile(&drug_name)?;
        Ok(resolution.into())
    }

    /// Interaction slugs a drug name resolves to (possibly none).
    pub fn resolve_interaction_slugs(&self, drug_name: String) -> Vec<String> {
        self.reference
            .resolver()
            .resolve_interactions(&drug_name)
            .slugs
            .into_iter()
            .collect()
    }

    pub fn threshold(&self) -> f64 {
        self.reference.threshold()
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe profile resolution.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProfileResolution {
    pub query: String,
    pub slug: String,
    pub matched_key: String,
    pub exact: bool,
    pub score: f64,
}

impl From<models::ProfileResolution> for FfiProfileResolution {
    fn from(resolution: models::ProfileResolution) -> Self {
        Self {
            query: resolution.query,
            slug: resolution.slug,
            matched_key: resolution.matched_key,
            exact: resolution.method.is_exact(),
            score: resolution.method.score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_data_root(root: &std::path::Path) {
        fs::write(root.join("synonyms.tsv"), "name\tbnf_name\npanadol\tparacetamol\n").unwrap();
        fs::write(root.join("drug_profile_slugs.tsv"), "name\tslug\nparacetamol\tparacetamol\n").unwrap();
        fs::write(root.join("drug_interaction_slugs.tsv"), "name\tslug\nparacetamol\tparacetamol\n").unwrap();
    }

    #[test]
    fn test_open_reference_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        write_data_root(dir.path());

        let core = open_reference(dir.path().display().to_string()).unwrap();
        let resolution = core.resolve_profile_slug("Panadol".into()).unwrap();
        assert_eq!(resolution.slug, "paracetamol");
        assert!(resolution.exact);
        assert_eq!(core.resolve_interaction_slugs("panadol".into()), vec!["paracetamol"]);
    }

    #[test]
    fn test_missing_profile_record_maps_to_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_data_root(dir.path());

        let core = open_reference(dir.path().display().to_string()).unwrap();
        let err = core.profile_lookup("paracetamol".into()).unwrap_err();
        assert!(matches!(err, MedReviewError::NotFound(_)));
        let err = core.profile_lookup("zzqxv".into()).unwrap_err();
        assert!(matches!(err, MedReviewError::NoMatch(_)));
    }

    #[test]
    fn test_invalid_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write_data_root(dir.path());
        let result = open_reference_with_threshold(dir.path().display().to_string(), 120.0);
        assert!(matches!(result, Err(MedReviewError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_reference(dir.path().display().to_string());
        assert!(matches!(result, Err(MedReviewError::ReferenceData(_))));
    }
}
