//! LLM side of the medication review evaluation.
//!
//! Builds the review prompt for a patient, runs a chat model with the BNF
//! lookup tools from `med-review-core`, asks a critic for a second opinion,
//! and extracts the final Reasoning / Flag / Severity verdict.
//!
//! Model access goes through the [`ChatModel`] trait. The `ollama` feature adds
//! an HTTP client for a local Ollama server and the `med-review` CLI.

pub mod extraction;
pub mod model;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod prompts;
pub mod solver;
pub mod tools;

pub use extraction::{extract_indicator, parse_review_output, ExtractionError};
pub use model::{ChatMessage, ChatModel, ModelError, Role, ScriptedModel, ToolCall, ToolSpec};
pub use prompts::{build_review_prompt, PromptError};
pub use solver::{ReviewConfig, ReviewSolver, ReviewTranscript, SolverError};
pub use tools::ReviewTools;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use serde_json::json;

    use med_review_core::config::DEFAULT_THRESHOLD;
    use med_review_core::models::Patient;
    use med_review_core::{DrugReference, LookupTable, MemoryRecordStore, RecordDomain, ReferenceTables};

    fn interaction_record(entries: &[(&str, &str)]) -> String {
        let interactions: Vec<_> = entries
            .iter()
            .map(|(title, severity)| {
                json!({
                    "interactant": {"title": title},
                    "messages": [{"severity": severity, "additiveEffect": false, "message": "Increased risk of bleeding."}]
                })
            })
            .collect();
        json!({"result": {"data": {"bnfInteractant": {"interactions": interactions}}}}).to_string()
    }

    pub fn reference() -> Arc<DrugReference> {
        let tables = ReferenceTables {
            synonyms: LookupTable::from_pairs([("coumadin", "warfarin"), ("disprin", "aspirin")]),
            profile_slugs: LookupTable::from_pairs([("warfarin", "warfarin"), ("aspirin", "aspirin")]),
            interaction_slugs: LookupTable::from_pairs([("warfarin", "warfarin"), ("aspirin", "aspirin")]),
        };
        let profile = json!({"result": {"data": {"bnfDrug": {
            "title": "Warfarin",
            "slug": "warfarin",
            "primaryClassification": {"title": "Coumarins"},
            "secondaryClassifications": null,
            "drugAction": {"drugContent": {"contentFor": "warfarin", "content": " is a vitamin K antagonist."}}
        }}}});
        let store = MemoryRecordStore::new()
            .with_record(RecordDomain::Profile, "warfarin", profile.to_string())
            .with_record(
                RecordDomain::Interaction,
                "warfarin",
                interaction_record(&[("Aspirin", "Severe")]),
            )
            .with_record(RecordDomain::Interaction, "aspirin", interaction_record(&[]));
        Arc::new(DrugReference::new(tables, store, DEFAULT_THRESHOLD))
    }

    pub fn patient() -> Patient {
        serde_json::from_value(json!({
            "patient_id": 7,
            "age": 76,
            "gender": "male",
            "prescription_profile": [{
                "id": 1,
                "date": "2023-05-01",
                "drugs": [
                    {"id": 1, "name": "Warfarin 3mg tablets", "quantity": 28},
                    {"id": 2, "name": "Aspirin 75mg dispersible tablets", "quantity": 28}
                ]
            }],
            "medical_data": [{
                "date_of_consultation": "2023-05-02T11:00:00",
                "gp_notes": "Atrial fibrillation. Recent nosebleeds.",
                "blood_pressure": {"blood_pressure_systolic": 138, "blood_pressure_diastolic": 84},
                "unplanned_hospital_admissions": 0,
                "deprivation_index": 6,
                "serum_sodium": 140.0,
                "haemoglobin": 12.9,
                "oxygen_saturation": 96,
                "heart_rate": 88
            }]
        }))
        .unwrap()
    }
}
