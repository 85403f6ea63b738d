//! Prompts for structured medication reviews.
//!
//! The review prompt is a system message plus one user message built from the
//! patient's active prescriptions and GP consultation history. The critique
//! templates drive the second-opinion round.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use thiserror::Error;

use med_review_core::models::{active_at_date, Patient};

#[derive(Error, Debug, PartialEq)]
pub enum PromptError {
    #[error("No medical data provided for patient {0}")]
    NoMedicalData(i64),

    #[error("Template is missing placeholder {{{0}}}")]
    MissingPlaceholder(String),
}

pub type PromptResult<T> = Result<T, PromptError>;

/// System prompt for structured medication reviews.
pub const SYSTEM_MESSAGE: &str = r#"# Task:
You are conducting structured medication reviews (SMRs).
Your task is to holistically review a patient's medication regimen and optimise it for safety and effectiveness.
Reason step by step. Explain your reasoning and recommend specialist consultation if unsure.
Prioritise patient safety and quality of life.

# Principles:
* Shared decision-making: Engage the patient as an equal partner.
* Personalisation: Tailor to individual needs and goals.
* Safety: Evaluate risk-benefit balance, potential interactions, and side effects.
* Effectiveness: Ensure clear purpose for each medication.
* Holistic approach: Consider all health conditions and non-pharmacological options.

# SMR Process:
* Review full medication list.
* Assess patient's experience with each medication.
* Evaluate appropriateness based on guidelines and individual factors.
* Identify opportunities to simplify regimens or switch medications.
* Consider deprescribing where appropriate to reduce polypharmacy.
* Recommend new medications if needed.
* Document review and recommendations.
* Plan how to discuss recommendations with the patient and educate them."#;

/// Response format instruction, including the HAMEC scale.
pub const FORMAT_RESPONSE_PROMPT: &str = r#"
Once you have reviewed the prescription profile, please provide a report on the prescription profile.
The report should have the following format:

**Reasoning:** <reasoning>
**Flag:** <flag>
**Severity:** <severity>

Where:
- <reasoning> is a detailed but concise explanation of why you have selected the output. This should
be evidence based and leave little for interpretation.
- <flag> is either "Yes" or "No" and details whether the prescription profile should be reviewed.
Only Serious and Severe cases should be flagged for review. Do not include any other words in this response.
- <severity> is one of "No Harm", "Minor", "Moderate", "Serious" or "Severe". This is based on the
Harm Associated with Medication Errors Classification (HAMEC) scale. Full details of the scale can be found
below. Do not include any other words in this response.

Harm Associated with Medication Errors Classification (HAMEC) scale:
No harm - No potential for patient harm, nor any change in patient monitoring, level or length of care required
Minor - There was potential for minor, non-life threatening, temporary harm that may or may not require efforts
to assess for a change in a patient's condition such as monitoring. These efforts may or may not have potentially
caused minimal increase in length of care (<1 day)
Moderate - There was potential for minor, non-life threatening, temporary harm that would require efforts to assess
for a change in a patient's condition such as monitoring, and additional low-level change in a patient's level of care
such as a blood test. Any potential increase in the length of care is likely to be minimal (<1 day)
Serious - There was potential for major, non-life threatening, temporary harm, or minor permanent harm that would
require a high level of care such as the administration of an antidote. An increase in the length of care of >=1 day is
expected
Severe - There was potential for life-threatening or mortal harm, or major permanent harm that would require a high
level of care such as the administration of an antidote or transfer to intensive care. A substantial increase in the
length of care of >1 day is expected
"#;

pub const MEDICAL_DATA_PROMPT: &str = r#"
You have been provided with the following medical data. Pay particular care to whether any of the patient's symptoms or conditions could be related to the prescription profile they are on.
"#;

pub const USE_BROWSER_PROMPT: &str = r#"
YOU MUST use the web browser tool to help you make your diagnosis. The following websites may be useful:
https://bnf.nice.org.uk/search/?q= (search for key information on the selection, prescribing, dispensing, administration and interactions of medicines.)
https://www.nice.org.uk/search?q= (search the National Institute for Health and Care Excellence for guidelines of patient specific features)
"#;

pub const USE_REFERENCE_TOOL_PROMPT: &str = r#"
YOU MUST use the BNF tools to help you make your diagnosis. Please cite verbatim any key information you find.
"#;

/// Critique prompt. Placeholders: `{smr}` (review trace), `{completion}` (current answer).
pub const DEFAULT_CRITIQUE_TEMPLATE: &str = r#"
You are an expert in structured medication reviews. Please review this prescription profile and decide if the answer is correct.
Consider whether it addresses:
- Indications
- Efficacy (or Effectiveness)
- Safety (including adverse effects and interactions)
- Adherence
- Cost or feasibility
- Any other relevant patient factors

If the answer is fully correct and comprehensive, respond with exactly: "The original answer is fully correct".

[BEGIN DATA]
***
SMR trace: {smr}
***
Answer: {completion}
***
[END DATA]

Critique:
"#;

/// Regeneration prompt. Placeholder: `{critique}`.
pub const DEFAULT_COMPLETION_TEMPLATE: &str = r#"
You are an expert in structured medication reviews. The user asked for a medication review.
Below is a critique of the original answer.
Using the critique, produce an improved structured medication review that addresses:
- Indications
- Efficacy (or Effectiveness)
- Safety (including adverse effects and interactions)
- Adherence
- Cost or feasibility
- Other relevant patient factors

If the original answer is fully correct, repeat it verbatim.

[BEGIN DATA]
***
[Critique]: {critique}
***
[END DATA]

Provide your final revised answer (or the same one, if fully correct), in the following format:

**Reasoning:** <reasoning>
**Flag:** <flag>
**Severity:** <severity>
"#;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Patient header plus prescription events active around `date`.
///
/// `date` defaults to the latest prescription event.
pub fn format_prescription_profile(patient: &Patient, date: Option<NaiveDateTime>) -> String {
    let mut prompt = format!(
        "Patient Profile:\n\
         - Patient Identifier: {}\n\
         - Patient Age: {}\n\
         - Patient Gender: {}\n\
         \n\
         Prescription Profile:\n",
        patient.patient_id, patient.age, patient.gender
    );

    for event in active_at_date(&patient.prescription_profile, date) {
        prompt.push_str("----------------------------\n");
        prompt.push_str("Prescription Event:\n");
        prompt.push_str(&format!("    - Prescription Date: {}\n", format_date(&event.date)));
        prompt.push_str("Drugs:\n");
        for drug in &event.drugs {
            prompt.push_str("--------------------------------\n");
            prompt.push_str(&format!("- Drug Name: {}\n", drug.name));
            prompt.push_str(&format!("- Drug Quantity: {}\n", drug.quantity));
        }
    }

    prompt
}

/// One block per GP consultation.
pub fn format_medical_data(patient: &Patient) -> PromptResult<String> {
    let data = match &patient.medical_data {
        Some(data) if !data.is_empty() => data,
        _ => return Err(PromptError::NoMedicalData(patient.patient_id)),
    };

    let mut prompt = String::new();
    for event in data {
        prompt.push_str(&format!(
            "\nConsultation Event: {}\n\
             - GP Notes: {}\n\
             - Blood Pressure: {}/{}\n\
             - Unplanned Hospital Admissions: {}\n\
             - Deprivation Index (0 most deprived 10 least deprived): {}\n\
             - Serum Sodium: {}\n\
             - Haemoglobin: {}\n\
             - Oxygen Saturation: {}\n\
             - Heart Rate: {}\n",
            format_date(&event.date_of_consultation),
            event.gp_notes,
            event.blood_pressure.blood_pressure_systolic,
            event.blood_pressure.blood_pressure_diastolic,
            event.unplanned_hospital_admissions,
            event.deprivation_index,
            event.serum_sodium,
            event.haemoglobin,
            event.oxygen_saturation,
            event.heart_rate,
        ));
    }
    Ok(prompt)
}

/// The user message that opens a review.
pub fn build_review_prompt(patient: &Patient) -> PromptResult<String> {
    let mut prompt = format_prescription_profile(patient, None);
    prompt.push_str(&format_medical_data(patient)?);
    prompt.push_str(MEDICAL_DATA_PROMPT);
    prompt.push_str(FORMAT_RESPONSE_PROMPT);
    prompt.push_str(USE_BROWSER_PROMPT);
    prompt.push_str(USE_REFERENCE_TOOL_PROMPT);
    Ok(prompt)
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

/// Substitute `{name}` placeholders in one pass over `template`.
///
/// Substituted values are not scanned again, and placeholders with no
/// matching var are left as written.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.iter().find(|(var, _)| *var == name) {
                Some((_, value)) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Check that `template` mentions every placeholder in `names`.
pub fn require_placeholders(template: &str, names: &[&str]) -> PromptResult<()> {
    match names
        .iter()
        .find(|name| !template.contains(&format!("{{{}}}", name)))
    {
        Some(missing) => Err(PromptError::MissingPlaceholder(missing.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient(medical_data: serde_json::Value) -> Patient {
        serde_json::from_value(json!({
            "patient_id": 42,
            "age": 81,
            "gender": "female",
            "prescription_profile": [
                {"id": 1, "date": "2022-01-10", "drugs": [{"id": 1, "name": "Digoxin 125microgram tablets", "quantity": 28}]},
                {"id": 2, "date": "2023-03-01", "drugs": [
                    {"id": 2, "name": "Warfarin 1mg tablets", "quantity": 56},
                    {"id": 3, "name": "Aspirin 75mg dispersible tablets", "quantity": 28}
                ]}
            ],
            "medical_data": medical_data
        }))
        .unwrap()
    }

    fn consultation() -> serde_json::Value {
        json!({
            "date_of_consultation": "2023-03-02T09:30:00",
            "gp_notes": "Bruising on forearms.",
            "blood_pressure": {"blood_pressure_systolic": 142, "blood_pressure_diastolic": 88},
            "unplanned_hospital_admissions": 1,
            "deprivation_index": 3,
            "serum_sodium": 137.5,
            "haemoglobin": 11.2,
            "oxygen_saturation": 95,
            "heart_rate": 78
        })
    }

    #[test]
    fn test_prescription_profile_only_active_events() {
        let prompt = format_prescription_profile(&patient(json!(null)), None);
        assert!(prompt.starts_with("Patient Profile:\n- Patient Identifier: 42\n- Patient Age: 81\n"));
        assert!(prompt.contains("    - Prescription Date: 2023-03-01 00:00:00\n"));
        assert!(prompt.contains("- Drug Name: Warfarin 1mg tablets\n- Drug Quantity: 56\n"));
        // more than 180 days before the latest event
        assert!(!prompt.contains("Digoxin"));
    }

    #[test]
    fn test_medical_data_block() {
        let prompt = format_medical_data(&patient(json!([consultation()]))).unwrap();
        assert!(prompt.contains("Consultation Event: 2023-03-02 09:30:00\n"));
        assert!(prompt.contains("- Blood Pressure: 142/88\n"));
        assert!(prompt.contains("- Serum Sodium: 137.5\n"));
        assert!(prompt.contains("- Heart Rate: 78\n"));
    }

    #[test]
    fn test_missing_medical_data() {
        assert_eq!(
            format_medical_data(&patient(json!(null))),
            Err(PromptError::NoMedicalData(42))
        );
        assert_eq!(
            build_review_prompt(&patient(json!([]))),
            Err(PromptError::NoMedicalData(42))
        );
    }

    #[test]
    fn test_review_prompt_sections_in_order() {
        let prompt = build_review_prompt(&patient(json!([consultation()]))).unwrap();
        let profile = prompt.find("Prescription Profile:").unwrap();
        let medical = prompt.find("Consultation Event:").unwrap();
        let format = prompt.find("**Reasoning:**").unwrap();
        let tools = prompt.find("BNF tools").unwrap();
        assert!(profile < medical && medical < format && format < tools);
    }

    #[test]
    fn test_render_template() {
        let rendered =
            render_template(DEFAULT_CRITIQUE_TEMPLATE, &[("smr", "trace"), ("completion", "answer")]);
        assert!(rendered.contains("SMR trace: trace\n"));
        assert!(rendered.contains("Answer: answer\n"));
        assert_eq!(render_template("{a} and {b}", &[("a", "x"), ("c", "y")]), "x and {b}");
    }

    #[test]
    fn test_render_template_does_not_expand_substituted_text() {
        // a tool result quoted in the trace may itself contain placeholder syntax
        let rendered = render_template(
            DEFAULT_CRITIQUE_TEMPLATE,
            &[("smr", "model wrote {completion} here"), ("completion", "answer")],
        );
        assert!(rendered.contains("SMR trace: model wrote {completion} here\n"));
        assert!(rendered.contains("Answer: answer\n"));
        assert_eq!(render_template("{a}{b}", &[("a", "{b}"), ("b", "{a}")]), "{b}{a}");
    }

    #[test]
    fn test_require_placeholders() {
        assert!(require_placeholders(DEFAULT_CRITIQUE_TEMPLATE, &["smr", "completion"]).is_ok());
        assert!(require_placeholders(DEFAULT_COMPLETION_TEMPLATE, &["critique"]).is_ok());
        assert_eq!(
            require_placeholders(DEFAULT_COMPLETION_TEMPLATE, &["critique", "smr"]),
            Err(PromptError::MissingPlaceholder("smr".into()))
        );
    }
}
