//! The medication review loop.
//!
//! ```text
//! system + patient prompt
//!         │
//!         ▼
//!   generate ◄──── tool results (bounded rounds)
//!         │
//!         ▼
//!   critique (critic model, defaults to the reviewer)
//!         │
//!         ▼
//!   regenerate with critique ──► extract Reasoning / Flag / Severity
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use med_review_core::models::{active_at_date, Consultation, FlagIndicator, Indicators, Patient};

use crate::extraction::extract_indicator;
use crate::model::{ChatMessage, ChatModel, ModelError, ToolSpec};
use crate::prompts::{
    build_review_prompt, render_template, require_placeholders, PromptError,
    DEFAULT_COMPLETION_TEMPLATE, DEFAULT_CRITIQUE_TEMPLATE, SYSTEM_MESSAGE,
};
use crate::tools::ReviewTools;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type SolverResult<T> = Result<T, SolverError>;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Model turns that may request tools before an answer is forced
    pub max_tool_rounds: usize,
    pub system_message: String,
    /// Uses `{smr}` and `{completion}`
    pub critique_template: String,
    /// Uses `{critique}`
    pub completion_template: String,
    /// Skip the critique round entirely when false
    pub critique: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            system_message: SYSTEM_MESSAGE.to_string(),
            critique_template: DEFAULT_CRITIQUE_TEMPLATE.to_string(),
            completion_template: DEFAULT_COMPLETION_TEMPLATE.to_string(),
            critique: true,
        }
    }
}

impl ReviewConfig {
    pub fn validate(&self) -> SolverResult<()> {
        require_placeholders(&self.critique_template, &["smr"])?;
        require_placeholders(&self.completion_template, &["critique"])?;
        Ok(())
    }
}

/// Everything a review produced, for one patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTranscript {
    pub run_id: Uuid,
    pub patient_id: i64,
    pub model: String,
    pub critic_model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    /// Answer before the critique round
    pub initial_answer: String,
    pub critique: Option<String>,
    pub final_answer: String,
    pub tool_calls: usize,
    /// Review record with the extracted verdict attached
    pub consultation: Consultation,
}

impl ReviewTranscript {
    pub fn indicator(&self) -> Option<&FlagIndicator> {
        self.consultation
            .indicators
            .as_ref()
            .and_then(|i| i.llm_flag.as_ref())
    }
}

pub struct ReviewSolver {
    model: Arc<dyn ChatModel>,
    critic: Option<Arc<dyn ChatModel>>,
    tools: ReviewTools,
    config: ReviewConfig,
}

impl ReviewSolver {
    pub fn new(model: Arc<dyn ChatModel>, tools: ReviewTools) -> Self {
        Self {
            model,
            critic: None,
            tools,
            config: ReviewConfig::default(),
        }
    }

    /// Use a different model for the critique round.
    pub fn with_critic(mut self, critic: Arc<dyn ChatModel>) -> Self {
        self.critic = Some(critic);
        self
    }

    pub fn with_config(mut self, config: ReviewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Review one patient.
    pub fn review(&self, patient: &Patient) -> SolverResult<ReviewTranscript> {
        self.config.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, patient_id = patient.patient_id, model = self.model.name(), "Starting review");

        let mut messages = vec![
            ChatMessage::system(self.config.system_message.as_str()),
            ChatMessage::user(build_review_prompt(patient)?),
        ];
        let mut tool_calls = 0;

        let initial_answer = self.generate(self.model.as_ref(), &mut messages, &mut tool_calls)?;

        let (critique, final_answer) = if self.config.critique {
            let critic = self.critic.as_deref().unwrap_or(self.model.as_ref());
            let critique = self.critique(critic, &messages, &initial_answer)?;
            messages.push(ChatMessage::user(render_template(
                &self.config.completion_template,
                &[("critique", critique.as_str())],
            )));
            let answer = self.generate(self.model.as_ref(), &mut messages, &mut tool_calls)?;
            (Some(critique), answer)
        } else {
            (None, initial_answer.clone())
        };

        let indicator = extract_indicator(&final_answer);
        tracing::info!(
            %run_id,
            patient_id = patient.patient_id,
            tool_calls,
            flag = ?indicator.flag,
            severity = ?indicator.severity,
            "Review complete"
        );

        let consultation = Consultation {
            date_performed: Some(Utc::now().naive_utc()),
            indicators: Some(Indicators {
                llm_flag: Some(indicator),
            }),
            prescription_profile: active_at_date(&patient.prescription_profile, None)
                .into_iter()
                .cloned()
                .collect(),
        };

        Ok(ReviewTranscript {
            run_id,
            patient_id: patient.patient_id,
            model: self.model.name().to_string(),
            critic_model: self
                .config
                .critique
                .then(|| self.critic.as_ref().unwrap_or(&self.model).name().to_string()),
            started_at,
            messages,
            initial_answer,
            critique,
            final_answer,
            tool_calls,
            consultation,
        })
    }

    /// Run the model until it answers without requesting tools.
    ///
    /// After `max_tool_rounds` tool turns the model is asked once more with no
    /// tools on offer, and whatever it says is the answer.
    fn generate(
        &self,
        model: &dyn ChatModel,
        messages: &mut Vec<ChatMessage>,
        tool_calls: &mut usize,
    ) -> SolverResult<String> {
        let specs = self.tools.specs();
        let mut rounds = 0;
        loop {
            let offer_tools = rounds < self.config.max_tool_rounds;
            let offered: &[ToolSpec] = if offer_tools { &specs } else { &[] };
            let reply = model.chat(messages, offered)?;
            let content = reply.content.clone();
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            if calls.is_empty() {
                return Ok(content);
            }
            if !offer_tools {
                tracing::warn!(
                    rounds,
                    ignored = calls.len(),
                    "Tool round limit reached, ignoring further tool calls"
                );
                return Ok(content);
            }

            rounds += 1;
            for call in &calls {
                let result = self.tools.dispatch(call);
                messages.push(ChatMessage::tool(call.name.as_str(), result));
                *tool_calls += 1;
            }
        }
    }

    fn critique(
        &self,
        critic: &dyn ChatModel,
        messages: &[ChatMessage],
        answer: &str,
    ) -> SolverResult<String> {
        let trace = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = render_template(
            &self.config.critique_template,
            &[("smr", trace.as_str()), ("completion", answer)],
        );
        let reply = critic.chat(&[ChatMessage::user(prompt)], &[])?;
        tracing::debug!(critic = critic.name(), "Received critique");
        Ok(reply.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::MockReviewer;
    use crate::model::{Role, ScriptedModel, ToolCall};
    use crate::test_support::{patient, reference};
    use med_review_core::models::{HarmSeverity, ReviewFlag};
    use serde_json::json;

    fn profile_call(drug: &str) -> ChatMessage {
        ChatMessage::assistant("").with_tool_calls(vec![ToolCall {
            name: "drug_profile_lookup".into(),
            arguments: json!({"drug_name": drug}),
        }])
    }

    fn answer(flag: ReviewFlag, severity: HarmSeverity) -> ChatMessage {
        ChatMessage::assistant(MockReviewer::answer("Bleeding risk.", flag, severity))
    }

    #[test]
    fn test_review_with_tool_call_and_critique() {
        let model = Arc::new(ScriptedModel::new(
            "reviewer",
            [
                profile_call("Coumadin"),
                answer(ReviewFlag::No, HarmSeverity::Minor),
                ChatMessage::assistant("Underestimates the warfarin and aspirin interaction."),
                answer(ReviewFlag::Yes, HarmSeverity::Serious),
            ],
        ));
        let solver = ReviewSolver::new(model.clone(), ReviewTools::new(reference()));

        let transcript = solver.review(&patient()).unwrap();
        assert_eq!(transcript.tool_calls, 1);
        assert_eq!(transcript.model, "reviewer");
        assert_eq!(transcript.critic_model.as_deref(), Some("reviewer"));
        assert!(transcript.initial_answer.contains("**Flag:** No"));
        assert_eq!(
            transcript.critique.as_deref(),
            Some("Underestimates the warfarin and aspirin interaction.")
        );

        let indicator = transcript.indicator().unwrap();
        assert_eq!(indicator.flag, Some(ReviewFlag::Yes));
        assert_eq!(indicator.severity, Some(HarmSeverity::Serious));

        let tool_msg = transcript
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("BNF Drug Profile"));

        let requests = model.requests();
        assert_eq!(requests.len(), 4);
        // the critic sees only the critique prompt
        assert_eq!(requests[2].len(), 1);
        assert!(requests[2][0].content.contains("SMR trace: # Task:"));
        assert!(requests[2][0].content.contains("Answer: **Reasoning:** Bleeding risk."));
        // regeneration continues the original conversation
        assert!(requests[3].last().unwrap().content.contains("[Critique]: Underestimates"));
    }

    #[test]
    fn test_separate_critic() {
        let model = Arc::new(ScriptedModel::new(
            "reviewer",
            [
                answer(ReviewFlag::No, HarmSeverity::NoHarm),
                answer(ReviewFlag::No, HarmSeverity::NoHarm),
            ],
        ));
        let critic = Arc::new(ScriptedModel::new(
            "critic",
            [ChatMessage::assistant("The original answer is fully correct")],
        ));
        let solver = ReviewSolver::new(model.clone(), ReviewTools::new(reference()))
            .with_critic(critic.clone());

        let transcript = solver.review(&patient()).unwrap();
        assert_eq!(transcript.critic_model.as_deref(), Some("critic"));
        assert_eq!(model.requests().len(), 2);
        assert_eq!(critic.requests().len(), 1);
        assert_eq!(transcript.tool_calls, 0);
    }

    #[test]
    fn test_tool_rounds_are_bounded() {
        let model = Arc::new(ScriptedModel::new(
            "reviewer",
            [
                profile_call("warfarin"),
                profile_call("aspirin"),
                profile_call("paracetamol"),
            ],
        ));
        let config = ReviewConfig {
            max_tool_rounds: 2,
            critique: false,
            ..ReviewConfig::default()
        };
        let solver = ReviewSolver::new(model.clone(), ReviewTools::new(reference())).with_config(config);

        let transcript = solver.review(&patient()).unwrap();
        assert_eq!(transcript.tool_calls, 2);
        assert_eq!(transcript.critique, None);
        assert_eq!(transcript.critic_model, None);
        // nothing to extract from an empty answer
        assert!(transcript.indicator().unwrap().is_empty());
        assert_eq!(model.remaining(), 0);
    }

    #[test]
    fn test_missing_medical_data_fails_before_model_call() {
        let model = Arc::new(ScriptedModel::new("reviewer", Vec::<ChatMessage>::new()));
        let solver = ReviewSolver::new(model.clone(), ReviewTools::new(reference()));
        let mut patient = patient();
        patient.medical_data = None;

        let err = solver.review(&patient).unwrap_err();
        assert!(matches!(err, SolverError::Prompt(PromptError::NoMedicalData(_))));
        assert!(model.requests().is_empty());
    }

    #[test]
    fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::new("reviewer", [answer(ReviewFlag::No, HarmSeverity::Minor)]));
        let solver = ReviewSolver::new(model, ReviewTools::new(reference()));

        // the critique round finds the script exhausted
        let err = solver.review(&patient()).unwrap_err();
        assert!(matches!(err, SolverError::Model(ModelError::Exhausted)));
    }

    #[test]
    fn test_invalid_template_rejected() {
        let model = Arc::new(ScriptedModel::new("reviewer", Vec::<ChatMessage>::new()));
        let config = ReviewConfig {
            completion_template: "Try again.".into(),
            ..ReviewConfig::default()
        };
        let solver = ReviewSolver::new(model, ReviewTools::new(reference())).with_config(config);
        assert!(matches!(
            solver.review(&patient()),
            Err(SolverError::Prompt(PromptError::MissingPlaceholder(_)))
        ));
    }
}
