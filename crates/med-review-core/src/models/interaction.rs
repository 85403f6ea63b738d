//! Drug interaction models.

use serde::{Deserialize, Serialize};

use crate::render::html_to_markdown;

/// One pairwise interaction found between two queried drugs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Queried drug whose interaction record produced this entry (as given by the caller)
    pub root_drug: String,
    /// Interactant named in the record
    pub drug_name: String,
    /// Severity label as recorded (e.g. "Severe", "Moderate")
    pub severity: String,
    /// Whether the effects are additive
    pub additive_effect: bool,
    /// Evidence grade, when recorded
    pub evidence: Option<String>,
    /// Interaction description, usually HTML
    pub description: String,
    pub url: Option<String>,
}

impl Interaction {
    /// Text block handed to the model.
    pub fn prompt(&self) -> String {
        format!(
            "### {} -- {}\n----\nSeverity: {}\nAdditive Effects: {}\nEvidence for Interaction: {}\nDescription: {}\n",
            self.root_drug,
            self.drug_name,
            self.severity,
            if self.additive_effect { "Yes" } else { "No" },
            self.evidence.as_deref().unwrap_or("Not stated"),
            html_to_markdown(&self.description),
        )
    }
}

/// Aggregated interactions for a list of drugs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionList {
    pub interactions: Vec<Interaction>,
    /// Queried drugs that resolved to no interaction data at all
    pub no_match: Vec<String>,
}

impl InteractionList {
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Text block handed to the model.
    pub fn prompt(&self) -> String {
        let mut out = if self.interactions.is_empty() {
            String::from("No interactions were found between the listed drugs.\n")
        } else {
            let mut text = String::from("The following interactions were found:\n====\n");
            for interaction in &self.interactions {
                text.push_str(&interaction.prompt());
                text.push('\n');
            }
            text
        };

        if !self.no_match.is_empty() {
            out.push_str(
                "\nSome drugs were not found in the BNF database and therefore could not be checked for interactions:\n",
            );
            for name in &self.no_match {
                out.push_str(&format!("- {}\n", name));
            }
        }

        out
    }
}

/// One interactant entry from a stored interaction record.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractantEntry {
    pub title: String,
    pub severity: String,
    pub additive_effect: bool,
    pub evidence: Option<String>,
    pub description: String,
}

// Stored shape: result.data.bnfInteractant.interactions[]

#[derive(Deserialize)]
struct InteractionEnvelope {
    #[serde(default)]
    result: Option<InteractionResultBody>,
}

#[derive(Deserialize)]
struct InteractionResultBody {
    #[serde(default)]
    data: Option<InteractionData>,
}

#[derive(Deserialize)]
struct InteractionData {
    #[serde(rename = "bnfInteractant", default)]
    bnf_interactant: Option<BnfInteractant>,
}

#[derive(Deserialize)]
struct BnfInteractant {
    #[serde(default)]
    interactions: Option<Vec<RawInteraction>>,
}

#[derive(Deserialize)]
struct RawInteraction {
    interactant: RawInteractant,
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Deserialize)]
struct RawInteractant {
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    severity: String,
    #[serde(default)]
    additive_effect: bool,
    #[serde(default)]
    evidence: Option<String>,
    message: String,
}

/// Parse a stored interaction record into interactant entries.
///
/// A record without the `result.data.bnfInteractant.interactions` envelope has no
/// entries. Only the first message of each interaction is used, and a later
/// entry for the same interactant title replaces an earlier one.
pub fn parse_interaction_record(json: &str) -> Result<Vec<InteractantEntry>, serde_json::Error> {
    let envelope: InteractionEnvelope = serde_json::from_str(json)?;
    let raw = envelope
        .result
        .and_then(|r| r.data)
        .and_then(|d| d.bnf_interactant)
        .and_then(|b| b.interactions)
        .unwrap_or_default();

    let mut entries: Vec<InteractantEntry> = Vec::with_capacity(raw.len());
    for interaction in raw {
        let Some(message) = interaction.messages.into_iter().next() else {
            tracing::debug!(interactant = %interaction.interactant.title, "Interaction has no messages");
            continue;
        };

        let entry = InteractantEntry {
            title: interaction.interactant.title,
            severity: message.severity,
            additive_effect: message.additive_effect,
            evidence: message.evidence,
            description: message.message,
        };

        match entries.iter_mut().find(|e| e.title == entry.title) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    Ok(entries)
}
