//! Review outcome models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether a prescription profile should be escalated for human review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReviewFlag {
    Yes,
    No,
}

/// Harm Associated with Medication Errors Classification (HAMEC).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum HarmSeverity {
    #[serde(rename = "No Harm")]
    NoHarm,
    Minor,
    Moderate,
    Serious,
    Severe,
}

impl HarmSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarmSeverity::NoHarm => "No Harm",
            HarmSeverity::Minor => "Minor",
            HarmSeverity::Moderate => "Moderate",
            HarmSeverity::Serious => "Serious",
            HarmSeverity::Severe => "Severe",
        }
    }

    /// Only serious and severe cases warrant a review.
    pub fn warrants_review(&self) -> bool {
        matches!(self, HarmSeverity::Serious | HarmSeverity::Severe)
    }
}

impl fmt::Display for HarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HarmSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "no harm" => Ok(HarmSeverity::NoHarm),
            "minor" => Ok(HarmSeverity::Minor),
            "moderate" => Ok(HarmSeverity::Moderate),
            "serious" => Ok(HarmSeverity::Serious),
            "severe" => Ok(HarmSeverity::Severe),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

impl fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReviewFlag::Yes => "Yes",
            ReviewFlag::No => "No",
        })
    }
}

impl FromStr for ReviewFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(ReviewFlag::Yes),
            "no" => Ok(ReviewFlag::No),
            other => Err(format!("unknown flag: {}", other)),
        }
    }
}

/// Structured verdict extracted from a model's review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FlagIndicator {
    /// Evidence-based explanation for the verdict
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub flag: Option<ReviewFlag>,
    #[serde(default)]
    pub severity: Option<HarmSeverity>,
}

impl FlagIndicator {
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_none() && self.flag.is_none() && self.severity.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serde_names() {
        let json = serde_json::to_string(&HarmSeverity::NoHarm).unwrap();
        assert_eq!(json, "\"No Harm\"");
        let parsed: HarmSeverity = serde_json::from_str("\"Serious\"").unwrap();
        assert_eq!(parsed, HarmSeverity::Serious);
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!("no harm".parse::<HarmSeverity>(), Ok(HarmSeverity::NoHarm));
        assert_eq!(" YES ".parse::<ReviewFlag>(), Ok(ReviewFlag::Yes));
        assert!("catastrophic".parse::<HarmSeverity>().is_err());
    }

    #[test]
    fn test_warrants_review() {
        assert!(HarmSeverity::Severe.warrants_review());
        assert!(!HarmSeverity::Moderate.warrants_review());
        assert!(HarmSeverity::Minor < HarmSeverity::Serious);
    }
}
