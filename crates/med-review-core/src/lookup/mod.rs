//! Reference lookups over loaded tables and stored records.
//!
//! [`DrugReference`] is loaded once and shared; every lookup borrows it.

mod interactions;
mod profile;

use crate::config::ReferenceConfig;
use crate::reference::{FsRecordStore, RecordStore, ReferenceTables};
use crate::resolver::{Resolver, ResolverResult};

/// Loaded reference tables plus the record store they point into.
pub struct DrugReference {
    tables: ReferenceTables,
    store: Box<dyn RecordStore>,
    threshold: f64,
}

impl DrugReference {
    /// Load tables and open the filesystem record store under the configured root.
    pub fn open(config: &ReferenceConfig) -> ResolverResult<Self> {
        let tables = ReferenceTables::load(config)?;
        Ok(Self::new(
            tables,
            FsRecordStore::from_config(config),
            config.threshold,
        ))
    }

    pub fn new(tables: ReferenceTables, store: impl RecordStore + 'static, threshold: f64) -> Self {
        Self {
            tables,
            store: Box::new(store),
            threshold,
        }
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::with_threshold(&self.tables, self.threshold)
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl std::fmt::Debug for DrugReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrugReference")
            .field("synonyms", &self.tables.synonyms.len())
            .field("profile_slugs", &self.tables.profile_slugs.len())
            .field("interaction_slugs", &self.tables.interaction_slugs.len())
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    use super::DrugReference;
    use crate::config::DEFAULT_THRESHOLD;
    use crate::reference::{LookupTable, MemoryRecordStore, RecordDomain, ReferenceTables};

    pub fn profile_record(title: &str, slug: &str) -> String {
        json!({"result": {"data": {"bnfDrug": {
            "title": title,
            "slug": slug,
            "primaryClassification": {"title": "analgesics"},
            "secondaryClassifications": null,
            "drugAction": {"drugContent": {"contentFor": "", "content": "Inhibits prostaglandin synthesis."}},
            "cautions": {"drugContent": {"contentFor": "", "content": "<p>Hepatic impairment.</p>"}}
        }}}})
        .to_string()
    }

    pub fn interaction_record(entries: &[(&str, &str)]) -> String {
        let interactions: Vec<_> = entries
            .iter()
            .map(|(title, severity)| {
                json!({
                    "interactant": {"title": title},
                    "messages": [{
                        "severity": severity,
                        "additiveEffect": false,
                        "evidence": "Study",
                        "message": format!("<p>{} interaction.</p>", severity)
                    }]
                })
            })
            .collect();
        json!({"result": {"data": {"bnfInteractant": {"interactions": interactions}}}}).to_string()
    }

    pub fn reference() -> DrugReference {
        let tables = ReferenceTables {
            synonyms: LookupTable::from_pairs([
                ("panadol", "paracetamol"),
                ("co-codamol", "codeine phosphate, paracetamol"),
            ]),
            profile_slugs: LookupTable::from_pairs([
                ("paracetamol", "paracetamol"),
                ("codeine phosphate with paracetamol", "co-codamol"),
                ("ghostazole", "ghostazole"),
                ("brokenol", "brokenol"),
            ]),
            interaction_slugs: LookupTable::from_pairs([
                ("aspirin", "aspirin"),
                ("warfarin", "warfarin"),
                ("paracetamol", "paracetamol"),
                ("codeine phosphate", "codeine-phosphate"),
                ("brokenol", "brokenol"),
            ]),
        };

        let store = MemoryRecordStore::new()
            .with_record(RecordDomain::Profile, "paracetamol", profile_record("Paracetamol", "paracetamol"))
            .with_record(RecordDomain::Profile, "co-codamol", profile_record("Co-codamol", "co-codamol"))
            .with_record(RecordDomain::Profile, "brokenol", r#"{"result": {"data": {"bnfDrug": {"title": 3}}}}"#)
            .with_record(
                RecordDomain::Interaction,
                "warfarin",
                interaction_record(&[("Aspirin", "Severe"), ("Ibuprofen", "Moderate")]),
            )
            .with_record(RecordDomain::Interaction, "aspirin", "{}")
            .with_record(
                RecordDomain::Interaction,
                "paracetamol",
                interaction_record(&[("Warfarin", "Moderate")]),
            )
            .with_record(RecordDomain::Interaction, "brokenol", "not json");

        DrugReference::new(tables, store, DEFAULT_THRESHOLD)
    }
}
