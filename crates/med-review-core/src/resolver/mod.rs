//! Drug name resolver.
//!
//! Pipeline: Normalize → Exact lookup → Synonym expansion → Per-ingredient lookup
//!
//! Profile resolution fails fast when a name cannot be matched. Interaction
//! resolution is best-effort and may return no slugs at all.

mod matcher;

pub use matcher::*;

use std::collections::BTreeSet;

use thiserror::Error;

use crate::config::DEFAULT_THRESHOLD;
use crate::models::{
    IngredientLookup, InteractionResolution, MatchKind, ProfileResolution, TableMatch,
};
use crate::reference::{normalize_key, LookupTable, RecordDomain, ReferenceError, ReferenceTables};

/// Separator between ingredients in a synonym value.
pub const INGREDIENT_SEPARATOR: &str = ", ";

/// Joins ingredient names into a combination product name.
pub const COMBINATION_JOINER: &str = " with ";

/// Resolver and lookup errors.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Could not find a reference match for: {0}")]
    NoMatch(String),

    #[error("No {domain} record stored for slug '{slug}'")]
    NotFound { domain: RecordDomain, slug: String },

    #[error("Could not parse record for slug '{slug}': {reason}")]
    MalformedRecord { slug: String, reason: String },

    #[error("Reference data error: {0}")]
    Reference(#[from] ReferenceError),
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Resolves free-text drug names to reference slugs.
pub struct Resolver<'a> {
    tables: &'a ReferenceTables,
    threshold: f64,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with the default threshold.
    pub fn new(tables: &'a ReferenceTables) -> Self {
        Self::with_threshold(tables, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(tables: &'a ReferenceTables, threshold: f64) -> Self {
        Self { tables, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Exact key lookup, else the best fuzzy key scoring strictly above the threshold.
    pub fn lookup(&self, name: &str, table: &LookupTable) -> Option<TableMatch> {
        let key = normalize_key(name);
        if let Some(value) = table.get(&key) {
            return Some(TableMatch {
                key,
                value: value.to_string(),
                kind: MatchKind::Exact,
            });
        }

        let (matched, value, score) = best_match(&key, table)?;
        if score > self.threshold {
            tracing::debug!(query = %key, matched, score, "Fuzzy match accepted");
            Some(TableMatch {
                key: matched.to_string(),
                value: value.to_string(),
                kind: MatchKind::Fuzzy { score },
            })
        } else {
            tracing::debug!(query = %key, best = matched, score, "Best fuzzy match below threshold");
            None
        }
    }

    /// Expand a name into ingredient names through the synonym table.
    ///
    /// Falls back to the normalized name itself when no synonym matches.
    pub fn map_ingredients(&self, name: &str) -> IngredientLookup {
        match self.lookup(name, &self.tables.synonyms) {
            Some(synonym) => {
                let ingredients = split_ingredients(&synonym.value);
                IngredientLookup::Mapped {
                    synonym,
                    ingredients,
                }
            }
            None => IngredientLookup::Literal(normalize_key(name)),
        }
    }

    /// Resolve a drug name to exactly one profile slug.
    pub fn resolve_profile(&self, name: &str) -> ResolverResult<ProfileResolution> {
        let table = &self.tables.profile_slugs;
        let normalized = normalize_key(name);

        // Exact name short-circuits everything, including synonyms
        if let Some(slug) = table.get(&normalized) {
            return Ok(ProfileResolution {
                query: name.to_string(),
                slug: slug.to_string(),
                matched_key: normalized,
                method: MatchKind::Exact,
            });
        }

        let ingredients = self.map_ingredients(name).ingredients();
        let found = match ingredients.as_slice() {
            [] => None,
            [single] => self.lookup(single, table),
            many => {
                // Combination products are stored as "a with b"
                let names: Vec<String> = many
                    .iter()
                    .map(|ingredient| match self.lookup(ingredient, table) {
                        Some(m) => m.key,
                        None => normalize_key(ingredient),
                    })
                    .collect();
                let combined = names.join(COMBINATION_JOINER);
                tracing::debug!(query = %normalized, combined = %combined, "Trying combination product");
                match self.lookup(&combined, table) {
                    Some(m) => Some(m),
                    None => return Err(ResolverError::NoMatch(combined)),
                }
            }
        };

        let found = found.ok_or_else(|| {
            ResolverError::NoMatch(ingredients.first().cloned().unwrap_or(normalized))
        })?;

        Ok(ProfileResolution {
            query: name.to_string(),
            slug: found.value,
            matched_key: found.key,
            method: found.kind,
        })
    }

    /// Resolve a drug name to the set of interaction slugs of its ingredients.
    ///
    /// Ingredients with no match are skipped and reported in `unresolved`.
    pub fn resolve_interactions(&self, name: &str) -> InteractionResolution {
        let table = &self.tables.interaction_slugs;
        let normalized = normalize_key(name);

        if let Some(slug) = table.get(&normalized) {
            return InteractionResolution {
                query: name.to_string(),
                slugs: BTreeSet::from([slug.to_string()]),
                unresolved: Vec::new(),
            };
        }

        let ingredients = match self.map_ingredients(name) {
            IngredientLookup::Mapped { ingredients, .. } => ingredients,
            // A literal may itself be a comma-separated list
            IngredientLookup::Literal(literal) => split_ingredients(&literal),
        };

        let mut resolution = InteractionResolution {
            query: name.to_string(),
            ..Default::default()
        };
        for ingredient in ingredients {
            match self.lookup(&ingredient, table) {
                Some(m) => {
                    resolution.slugs.insert(m.value);
                }
                None => {
                    tracing::debug!(query = %normalized, ingredient = %ingredient, "No interaction slug for ingredient");
                    resolution.unresolved.push(ingredient);
                }
            }
        }
        resolution
    }
}

/// Split a comma-separated ingredient list into normalized names.
pub fn split_ingredients(value: &str) -> Vec<String> {
    value
        .split(INGREDIENT_SEPARATOR)
        .map(normalize_key)
        .filter(|s| !s.is_empty())
        .collect()
}
