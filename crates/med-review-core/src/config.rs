//! Reference data configuration.
//!
//! Paths are relative to a single data root laid out as:
//!
//! ```text
//! <data_root>/
//!   synonyms.tsv                  brand/informal name → ingredient list
//!   drug_profile_slugs.tsv        ingredient/profile name → profile slug
//!   drug_interaction_slugs.tsv    ingredient name → interaction slug
//!   drugs/<slug>.json             drug profile records
//!   drug_interactions/<slug>.json interaction records
//! ```

use std::path::{Path, PathBuf};

/// Default data root, relative to the working directory.
pub const DEFAULT_DATA_ROOT: &str = ".data/bnf-drug-data/data";

/// Default fuzzy matching threshold (0-100). Matches must score strictly above it.
pub const DEFAULT_THRESHOLD: f64 = 90.0;

/// Environment variable overriding the data root.
pub const DATA_ROOT_ENV: &str = "MED_REVIEW_DATA_ROOT";

/// Environment variable overriding the fuzzy threshold.
pub const THRESHOLD_ENV: &str = "MED_REVIEW_FUZZY_THRESHOLD";

/// Where the reference tables and records live, and how strict fuzzy matching is.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceConfig {
    /// Directory holding the tables and record directories
    pub data_root: PathBuf,
    /// Synonym table file name (key column, `bnf_name`)
    pub synonyms_file: String,
    /// Profile slug table file name (key column, `slug`)
    pub profile_slugs_file: String,
    /// Interaction slug table file name (key column, `slug`)
    pub interaction_slugs_file: String,
    /// Directory of profile records, relative to the data root
    pub profile_dir: String,
    /// Directory of interaction records, relative to the data root
    pub interaction_dir: String,
    /// Minimum similarity (exclusive) for a fuzzy match to be accepted
    pub threshold: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            synonyms_file: "synonyms.tsv".to_string(),
            profile_slugs_file: "drug_profile_slugs.tsv".to_string(),
            interaction_slugs_file: "drug_interaction_slugs.tsv".to_string(),
            profile_dir: "drugs".to_string(),
            interaction_dir: "drug_interactions".to_string(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Parse a fuzzy threshold, accepting only finite values in 0-100.
pub fn parse_threshold(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|threshold| (0.0..=100.0).contains(threshold))
}

impl ReferenceConfig {
    /// Defaults rooted at `data_root`.
    pub fn with_data_root<P: AsRef<Path>>(data_root: P) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Defaults, overridden by `MED_REVIEW_DATA_ROOT` and `MED_REVIEW_FUZZY_THRESHOLD`.
    ///
    /// A threshold that does not parse to a number in 0-100 is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            if !root.trim().is_empty() {
                config.data_root = PathBuf::from(root);
            }
        }

        if let Ok(raw) = std::env::var(THRESHOLD_ENV) {
            match parse_threshold(&raw) {
                Some(threshold) => config.threshold = threshold,
                None => {
                    tracing::warn!(value = %raw, "Ignoring {}, expected a number in 0-100", THRESHOLD_ENV);
                }
            }
        }

        config
    }

    /// Override the fuzzy threshold.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn synonyms_path(&self) -> PathBuf {
        self.data_root.join(&self.synonyms_file)
    }

    pub fn profile_slugs_path(&self) -> PathBuf {
        self.data_root.join(&self.profile_slugs_file)
    }

    pub fn interaction_slugs_path(&self) -> PathBuf {
        self.data_root.join(&self.interaction_slugs_file)
    }

    pub fn profile_records_dir(&self) -> PathBuf {
        self.data_root.join(&self.profile_dir)
    }

    pub fn interaction_records_dir(&self) -> PathBuf {
        self.data_root.join(&self.interaction_dir)
    }
}
