//! Property tests for resolution and aggregation.

use proptest::prelude::*;
use serde_json::json;

use med_review_core::config::DEFAULT_THRESHOLD;
use med_review_core::reference::normalize_key;
use med_review_core::resolver::weighted_ratio;
use med_review_core::{
    DrugReference, LookupTable, MemoryRecordStore, RecordDomain, ReferenceTables, Resolver,
};

fn drug_name() -> impl Strategy<Value = String> {
    "[a-z]{3,12}( [a-z]{3,10})?"
}

fn tables_with(keys: &[String]) -> ReferenceTables {
    let slugs = LookupTable::from_pairs(keys.iter().map(|k| (k.as_str(), format!("{}-slug", k))));
    ReferenceTables {
        synonyms: LookupTable::new(),
        profile_slugs: slugs.clone(),
        interaction_slugs: slugs,
    }
}

proptest! {
    #[test]
    fn exact_key_always_wins(keys in prop::collection::vec(drug_name(), 1..12), pick in any::<prop::sample::Index>()) {
        let tables = tables_with(&keys);
        let resolver = Resolver::new(&tables);
        let key = pick.get(&keys);

        let resolution = resolver.resolve_profile(&format!("  {}  ", key.to_uppercase())).unwrap();
        prop_assert!(resolution.method.is_exact());
        prop_assert_eq!(resolution.slug, format!("{}-slug", key));
    }

    #[test]
    fn score_is_bounded_and_symmetric_on_identity(a in drug_name(), b in drug_name()) {
        let score = weighted_ratio(&a, &b);
        prop_assert!((0.0..=100.0).contains(&score));
        prop_assert_eq!(weighted_ratio(&a, &a), 100.0);
    }

    #[test]
    fn fuzzy_matches_clear_threshold(keys in prop::collection::vec(drug_name(), 1..8), query in drug_name()) {
        let tables = tables_with(&keys);
        let resolver = Resolver::new(&tables);
        if let Ok(resolution) = resolver.resolve_profile(&query) {
            prop_assert!(resolution.method.score() > DEFAULT_THRESHOLD);
        }
    }

    #[test]
    fn aggregation_targets_stay_in_query(
        queried in prop::collection::vec(drug_name(), 1..5),
        listed in prop::collection::vec(drug_name(), 0..6),
    ) {
        let tables = tables_with(&queried);
        let interactions: Vec<_> = listed
            .iter()
            .chain(queried.iter())
            .map(|title| json!({
                "interactant": {"title": title.to_uppercase()},
                "messages": [{"severity": "Moderate", "message": "text"}]
            }))
            .collect();
        let record = json!({"result": {"data": {"bnfInteractant": {"interactions": interactions}}}}).to_string();

        let mut store = MemoryRecordStore::new();
        for key in &queried {
            store.insert(RecordDomain::Interaction, &format!("{}-slug", normalize_key(key)), record.clone());
        }
        let reference = DrugReference::new(tables, store, DEFAULT_THRESHOLD);

        let list = reference.aggregate_interactions(&queried);
        let targets: Vec<String> = queried.iter().map(|q| normalize_key(q)).collect();
        for interaction in &list.interactions {
            prop_assert!(targets.contains(&normalize_key(&interaction.drug_name)));
            prop_assert!(queried.contains(&interaction.root_drug));
        }
        prop_assert!(list.no_match.is_empty());
    }
}
