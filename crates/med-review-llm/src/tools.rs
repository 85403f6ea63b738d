//! Reference lookups exposed to the model as tools.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use med_review_core::DrugReference;

use crate::model::{ToolCall, ToolSpec};

pub const PROFILE_TOOL: &str = "drug_profile_lookup";
pub const INTERACTIONS_TOOL: &str = "drug_interactions_lookup";

#[derive(Debug, Deserialize)]
struct ProfileArgs {
    drug_name: String,
}

#[derive(Debug, Deserialize)]
struct InteractionArgs {
    drug_list: DrugList,
}

/// Models sometimes send a comma-separated string instead of an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DrugList {
    Many(Vec<String>),
    Joined(String),
}

impl DrugList {
    fn into_names(self) -> Vec<String> {
        match self {
            DrugList::Many(names) => names,
            DrugList::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Tool registry backed by a loaded [`DrugReference`].
///
/// Every call returns text for the model; failures come back as
/// `Error: <message>` rather than aborting the review.
#[derive(Debug, Clone)]
pub struct ReviewTools {
    reference: Arc<DrugReference>,
}

impl ReviewTools {
    pub fn new(reference: Arc<DrugReference>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &DrugReference {
        &self.reference
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: PROFILE_TOOL.to_string(),
                description: "Return the BNF drug profile for a drug name (brand or chemical name).".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "drug_name": {"type": "string", "description": "The name of the drug to look up"}
                    },
                    "required": ["drug_name"]
                }),
            },
            ToolSpec {
                name: INTERACTIONS_TOOL.to_string(),
                description: "Look up BNF drug interactions among a list of drugs.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "drug_list": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Drug names, e.g. [\"aspirin\", \"warfarin\"]"
                        }
                    },
                    "required": ["drug_list"]
                }),
            },
        ]
    }

    pub fn drug_profile_lookup(&self, drug_name: &str) -> String {
        match self.reference.profile_lookup(drug_name) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(drug = drug_name, error = %e, "Profile tool failed");
                format!("Error: {}", e)
            }
        }
    }

    pub fn drug_interactions_lookup(&self, drug_list: &[String]) -> String {
        self.reference.interactions_lookup(drug_list)
    }

    /// Run one tool call and return the text for the tool message.
    pub fn dispatch(&self, call: &ToolCall) -> String {
        tracing::debug!(tool = %call.name, arguments = %call.arguments, "Dispatching tool call");
        match call.name.as_str() {
            PROFILE_TOOL => match serde_json::from_value::<ProfileArgs>(call.arguments.clone()) {
                Ok(args) => self.drug_profile_lookup(&args.drug_name),
                Err(e) => format!("Error: invalid arguments for {}: {}", PROFILE_TOOL, e),
            },
            INTERACTIONS_TOOL => {
                match serde_json::from_value::<InteractionArgs>(call.arguments.clone()) {
                    Ok(args) => self.drug_interactions_lookup(&args.drug_list.into_names()),
                    Err(e) => format!("Error: invalid arguments for {}: {}", INTERACTIONS_TOOL, e),
                }
            }
            other => format!("Error: unknown tool {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::reference;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_profile_tool() {
        let tools = ReviewTools::new(reference());
        let text = tools.dispatch(&call(PROFILE_TOOL, json!({"drug_name": "Coumadin"})));
        assert!(text.starts_with("BNF Drug Profile\n====\nDrug Name: Warfarin\n"));
    }

    #[test]
    fn test_profile_tool_errors_become_text() {
        let tools = ReviewTools::new(reference());
        let text = tools.dispatch(&call(PROFILE_TOOL, json!({"drug_name": "zzqxv"})));
        assert!(text.starts_with("Error: "));
        let text = tools.dispatch(&call(PROFILE_TOOL, json!({"name": "warfarin"})));
        assert!(text.starts_with("Error: invalid arguments"));
        let text = tools.dispatch(&call("web_search", json!({})));
        assert_eq!(text, "Error: unknown tool web_search");
    }

    #[test]
    fn test_interactions_tool_accepts_list_or_string() {
        let tools = ReviewTools::new(reference());
        let from_list = tools.dispatch(&call(
            INTERACTIONS_TOOL,
            json!({"drug_list": ["warfarin", "aspirin"]}),
        ));
        let from_string = tools.dispatch(&call(
            INTERACTIONS_TOOL,
            json!({"drug_list": "warfarin, aspirin"}),
        ));
        assert!(from_list.contains("### warfarin -- Aspirin"));
        assert_eq!(from_list, from_string);
    }

    #[test]
    fn test_specs_name_both_tools() {
        let tools = ReviewTools::new(reference());
        let names: Vec<String> = tools.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![PROFILE_TOOL, INTERACTIONS_TOOL]);
    }
}
