use std::collections::HashSet;

use super::DrugReference;
use crate::models::{parse_interaction_record, Interaction, InteractionList};
use crate::reference::{normalize_key, RecordDomain};

impl DrugReference {
    /// Collect interactions between the given drugs.
    ///
    /// Only interactions whose interactant is one of `drug_names` are kept, so
    /// a pair found from both sides appears twice. A missing or unreadable
    /// record for one slug never affects the others.
    pub fn aggregate_interactions<S: AsRef<str>>(&self, drug_names: &[S]) -> InteractionList {
        let mut seen = HashSet::new();
        let names: Vec<&str> = drug_names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| seen.insert(*name))
            .collect();
        let targets: HashSet<String> = names.iter().map(|name| normalize_key(name)).collect();

        let resolver = self.resolver();
        let mut result = InteractionList::default();

        for name in &names {
            let resolution = resolver.resolve_interactions(name);
            if resolution.is_empty() {
                result.no_match.push(name.to_string());
                continue;
            }

            for slug in &resolution.slugs {
                let json = match self.store.load(RecordDomain::Interaction, slug) {
                    Ok(Some(json)) => json,
                    Ok(None) => {
                        tracing::debug!(drug = name, slug = %slug, "No interaction record, skipping");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(drug = name, slug = %slug, error = %e, "Failed to read interaction record");
                        continue;
                    }
                };

                let entries = match parse_interaction_record(&json) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!(drug = name, slug = %slug, error = %e, "Malformed interaction record, skipping");
                        continue;
                    }
                };

                result.interactions.extend(
                    entries
                        .into_iter()
                        .filter(|entry| targets.contains(&normalize_key(&entry.title)))
                        .map(|entry| Interaction {
                            root_drug: name.to_string(),
                            drug_name: entry.title,
                            severity: entry.severity,
                            additive_effect: entry.additive_effect,
                            evidence: entry.evidence,
                            description: entry.description,
                            url: None,
                        }),
                );
            }
        }

        tracing::info!(
            drugs = names.len(),
            interactions = result.len(),
            unmatched = result.no_match.len(),
            "Aggregated interactions"
        );
        result
    }

    /// Aggregate interactions and render them as text.
    pub fn interactions_lookup<S: AsRef<str>>(&self, drug_names: &[S]) -> String {
        self.aggregate_interactions(drug_names).prompt()
    }
}
