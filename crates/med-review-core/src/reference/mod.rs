//! Reference data layer: lookup tables and per-slug record storage.

mod store;
mod tables;

pub use store::*;
pub use tables::*;

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ReferenceConfig;

/// Reference data errors.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Table {table} has no '{column}' column")]
    MissingColumn { table: String, column: String },
}

pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Value column of the synonym table.
pub const SYNONYM_VALUE_COLUMN: &str = "bnf_name";

/// Value column of both slug tables.
pub const SLUG_VALUE_COLUMN: &str = "slug";

/// The three lookup tables the resolver works over.
///
/// Read-only after load; share one instance per run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    /// Brand or informal name → comma-separated ingredient list
    pub synonyms: LookupTable,
    /// Ingredient or profile name → profile slug
    pub profile_slugs: LookupTable,
    /// Ingredient name → interaction slug
    pub interaction_slugs: LookupTable,
}

impl ReferenceTables {
    /// Load all three tables from the configured data root.
    pub fn load(config: &ReferenceConfig) -> ReferenceResult<Self> {
        let synonyms = LookupTable::from_tsv_path(config.synonyms_path(), SYNONYM_VALUE_COLUMN)?;
        let profile_slugs =
            LookupTable::from_tsv_path(config.profile_slugs_path(), SLUG_VALUE_COLUMN)?;
        let interaction_slugs =
            LookupTable::from_tsv_path(config.interaction_slugs_path(), SLUG_VALUE_COLUMN)?;

        tracing::info!(
            synonyms = synonyms.len(),
            profile_slugs = profile_slugs.len(),
            interaction_slugs = interaction_slugs.len(),
            data_root = %config.data_root.display(),
            "Loaded reference tables"
        );

        Ok(Self {
            synonyms,
            profile_slugs,
            interaction_slugs,
        })
    }

    /// Get the slug table for a record domain.
    pub fn slugs(&self, domain: RecordDomain) -> &LookupTable {
        match domain {
            RecordDomain::Profile => &self.profile_slugs,
            RecordDomain::Interaction => &self.interaction_slugs,
        }
    }
}
