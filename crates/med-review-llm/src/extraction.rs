//! Verdict extraction from a model's final review.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use med_review_core::models::{FlagIndicator, HarmSeverity, ReviewFlag};

/// Extraction errors.
#[derive(Error, Debug, PartialEq)]
pub enum ExtractionError {
    #[error("Missing **{0}:** section in response")]
    MissingField(&'static str),

    #[error("Invalid {field} value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\*\*Reasoning:?\*\*:?\s*(.*?)\s*(?:\*\*Flag|\*\*Severity|\z)")
        .expect("valid regex")
});

static FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*\*Flag:?\*\*:?[ \t]*([^\n]*)").expect("valid regex"));

static SEVERITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*\*Severity:?\*\*:?[ \t]*([^\n]*)").expect("valid regex"));

fn last_capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn clean_value(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '.' | '*' | '<' | '>'))
}

/// Parse `**Reasoning:**`, `**Flag:**` and `**Severity:**` out of a review.
///
/// When a section appears more than once the last one wins, since the model
/// often restates the format before answering.
pub fn parse_review_output(text: &str) -> ExtractionResult<FlagIndicator> {
    let reasoning = last_capture(&REASONING_RE, text)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(ExtractionError::MissingField("Reasoning"))?;

    let flag_raw = last_capture(&FLAG_RE, text).ok_or(ExtractionError::MissingField("Flag"))?;
    let flag: ReviewFlag =
        clean_value(flag_raw)
            .parse()
            .map_err(|_| ExtractionError::InvalidValue {
                field: "Flag",
                value: flag_raw.trim().to_string(),
            })?;

    let severity_raw =
        last_capture(&SEVERITY_RE, text).ok_or(ExtractionError::MissingField("Severity"))?;
    let severity: HarmSeverity =
        clean_value(severity_raw)
            .parse()
            .map_err(|_| ExtractionError::InvalidValue {
                field: "Severity",
                value: severity_raw.trim().to_string(),
            })?;

    Ok(FlagIndicator {
        reasoning: Some(reasoning.to_string()),
        flag: Some(flag),
        severity: Some(severity),
    })
}

/// Like [`parse_review_output`], but a failure is logged and yields an empty indicator.
pub fn extract_indicator(text: &str) -> FlagIndicator {
    match parse_review_output(text) {
        Ok(indicator) => indicator,
        Err(e) => {
            tracing::warn!(error = %e, "Could not extract verdict from review output");
            FlagIndicator::default()
        }
    }
}

/// Mock reviewer for testing without a model server.
pub struct MockReviewer;

impl MockReviewer {
    /// A well-formed answer for the given verdict.
    pub fn answer(reasoning: &str, flag: ReviewFlag, severity: HarmSeverity) -> String {
        format!(
            "**Reasoning:** {}\n**Flag:** {}\n**Severity:** {}\n",
            reasoning, flag, severity
        )
    }
}
