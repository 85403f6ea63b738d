//! Drug name resolution models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// How a name matched a table key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MatchKind {
    /// Normalized name is a key of the table
    Exact,
    /// Best fuzzy candidate, accepted above the threshold (0-100)
    Fuzzy { score: f64 },
}

impl MatchKind {
    pub fn is_exact(&self) -> bool {
        matches!(self, MatchKind::Exact)
    }

    /// Score on a 0-100 scale; exact matches score 100.
    pub fn score(&self) -> f64 {
        match self {
            MatchKind::Exact => 100.0,
            MatchKind::Fuzzy { score } => *score,
        }
    }
}

/// A table key matched by a query, with its value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMatch {
    /// Matched (normalized) table key
    pub key: String,
    pub value: String,
    pub kind: MatchKind,
}

/// How a free-text name was expanded into ingredients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IngredientLookup {
    /// Synonym table hit; ingredient names from the mapped value
    Mapped {
        synonym: TableMatch,
        ingredients: Vec<String>,
    },
    /// No synonym; the normalized name itself is the single ingredient
    Literal(String),
}

impl IngredientLookup {
    pub fn ingredients(&self) -> Vec<String> {
        match self {
            IngredientLookup::Mapped { ingredients, .. } => ingredients.clone(),
            IngredientLookup::Literal(name) => vec![name.clone()],
        }
    }
}

/// Profile slug resolved for a drug name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileResolution {
    /// Name as given by the caller
    pub query: String,
    pub slug: String,
    /// Profile table key that produced the slug
    pub matched_key: String,
    pub method: MatchKind,
}

/// Interaction slugs resolved for a drug name. May be empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InteractionResolution {
    /// Name as given by the caller
    pub query: String,
    pub slugs: BTreeSet<String>,
    /// Ingredients that matched no interaction key
    pub unresolved: Vec<String>,
}

impl InteractionResolution {
    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}
