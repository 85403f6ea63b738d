//! Drug profile records.
//!
//! Profile JSON is loosely shaped: a section may be a single object or a list of
//! objects. [`OneOrMany`] captures that as a tagged variant so the record is
//! validated once, when it is parsed.

use serde::{Deserialize, Deserializer, Serialize};

use crate::render::html_to_markdown;

/// Separator between content blocks in rendered text.
const BLOCK_SEPARATOR: &str = "\n----\n";

/// Untyped section body, kept for sections that are never rendered.
pub type RawSection = serde_json::Map<String, serde_json::Value>;

/// A value that is either a single item or a list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// View as a slice regardless of shape.
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Single(item) => std::slice::from_ref(item),
            OneOrMany::Multiple(items) => items,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// One `{contentFor, content}` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    /// Who the content applies to (e.g. "For all NSAIDs")
    #[serde(default)]
    pub content_for: Option<String>,
    /// Content body, usually HTML
    pub content: String,
}

/// A rendered profile section: drug-specific content plus drug-class content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSection {
    #[serde(default)]
    pub drug_content: Option<ContentBlock>,
    #[serde(default)]
    pub drug_class_content: Option<OneOrMany<ContentBlock>>,
}

impl ProfileSection {
    /// Drug content as `contentFor` immediately followed by `content`.
    pub fn drug_content_text(&self) -> String {
        match &self.drug_content {
            Some(block) => format!(
                "{}{}",
                block.content_for.as_deref().unwrap_or(""),
                block.content
            ),
            None => String::new(),
        }
    }

    /// Class content blocks as `contentFor content`, joined by `----` rules.
    pub fn drug_class_content_text(&self) -> String {
        match &self.drug_class_content {
            Some(blocks) => blocks
                .iter()
                .map(|block| match block.content_for.as_deref() {
                    Some(content_for) => format!("{} {}", content_for, block.content),
                    None => block.content.clone(),
                })
                .collect::<Vec<_>>()
                .join(BLOCK_SEPARATOR),
            None => String::new(),
        }
    }
}

/// Accept `null` but not a missing field.
fn required_nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Structured drug profile.
///
/// Only drug action, cautions and side effects are rendered by [`DrugProfile::summary`].
/// The other sections are validated and carried but not surfaced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugProfile {
    pub title: String,
    pub slug: String,
    pub primary_classification: RawSection,
    #[serde(deserialize_with = "required_nullable")]
    pub secondary_classifications: Option<OneOrMany<RawSection>>,

    // Rendered sections
    #[serde(default)]
    pub drug_action: Option<OneOrMany<ProfileSection>>,
    #[serde(default)]
    pub cautions: Option<OneOrMany<ProfileSection>>,
    #[serde(default)]
    pub side_effects: Option<OneOrMany<ProfileSection>>,

    // Carried sections
    #[serde(default)]
    pub allergy_and_cross_sensitivity: Option<RawSection>,
    #[serde(default)]
    pub breast_feeding: Option<RawSection>,
    #[serde(default)]
    pub conception_and_contraception: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub contra_indications: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub constituent_drugs: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub directions_for_administration: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub effect_on_laboratory_tests: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub exceptions_to_legal_category: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub handling_and_storage: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub hepatic_impairment: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub important_safety_information: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub indications_and_dose: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub interactants: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub less_suitable_for_prescribing: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub medicinal_forms: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub monitoring_requirements: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub national_funding: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub palliative_care: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub patient_and_carer_advice: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub pre_treatment_screening: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub pregnancy: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub prescribing_and_dispensing_information: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub profession_specific_information: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub renal_impairment: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub treatment_cessation: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub related_treatment_summaries: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub related_nurse_prescribers_treatment_summaries: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub unlicensed_use: Option<OneOrMany<RawSection>>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize)]
struct ProfileEnvelope {
    result: ProfileResultBody,
}

#[derive(Deserialize)]
struct ProfileResultBody {
    data: ProfileData,
}

#[derive(Deserialize)]
struct ProfileData {
    #[serde(rename = "bnfDrug")]
    bnf_drug: DrugProfile,
}

impl DrugProfile {
    /// Parse a stored record (`result.data.bnfDrug`).
    pub fn from_record_json(json: &str) -> Result<Self, serde_json::Error> {
        let envelope: ProfileEnvelope = serde_json::from_str(json)?;
        Ok(envelope.result.data.bnf_drug)
    }

    /// Plain-text summary handed to the model.
    pub fn summary(&self) -> String {
        let mut out = String::from("BNF Drug Profile\n====\n");
        out.push_str(&format!("Drug Name: {}\n====\n", self.title));

        out.push_str("Drug Action: \n====\n");
        if let Some(action) = &self.drug_action {
            out.push_str(&render_sections(action, false));
            out.push('\n');
        }

        if let Some(cautions) = &self.cautions {
            out.push_str("Cautions: \n====\n");
            out.push_str(&render_sections(cautions, true));
            out.push('\n');
        }

        if let Some(side_effects) = &self.side_effects {
            out.push_str("Side Effects: \n====\n");
            out.push_str(&render_sections(side_effects, true));
            out.push('\n');
        }

        out
    }
}

fn render_sections(sections: &OneOrMany<ProfileSection>, markdown: bool) -> String {
    let convert = |text: String| if markdown { html_to_markdown(&text) } else { text };

    sections
        .iter()
        .map(|section| {
            format!(
                "{}{}{}",
                convert(section.drug_content_text()),
                BLOCK_SEPARATOR,
                convert(section.drug_class_content_text())
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}
