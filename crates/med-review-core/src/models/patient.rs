//! Patient models.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::review::FlagIndicator;

/// Prescription events older than this (relative to the query date) are not active.
pub const ACTIVE_WINDOW_DAYS: i64 = 180;

/// A synthetic patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub patient_id: i64,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub age: u32,
    pub gender: String,
    pub prescription_profile: Vec<PrescriptionEvent>,
    /// Source organisation code
    #[serde(default = "default_organisation")]
    pub organisation: Option<String>,
    /// Creation timestamp (RFC 3339)
    #[serde(default = "default_created_datetime")]
    pub created_datetime: String,
    #[serde(default)]
    pub consultations: Vec<Consultation>,
    /// GP consultation history, excluding prescriptions
    #[serde(default)]
    pub medical_data: Option<Vec<MedicalConsultation>>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_organisation() -> Option<String> {
    Some("P2U".to_string())
}

fn default_created_datetime() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Patient {
    /// Most recent review consultation, if any.
    pub fn latest_consultation(&self) -> Option<&Consultation> {
        self.consultations.last()
    }

    /// Most recent GP consultation data, if any.
    pub fn latest_medical_data(&self) -> Option<&MedicalConsultation> {
        self.medical_data.as_ref().and_then(|data| data.last())
    }

    /// Drugs being taken on `date`, judged by each drug's dosing window.
    ///
    /// Drugs without both a start and end date are never active.
    pub fn active_drugs(&self, date: NaiveDateTime) -> Vec<&Drug> {
        self.prescription_profile
            .iter()
            .flat_map(|event| event.drugs.iter())
            .filter(|drug| {
                drug.event
                    .as_ref()
                    .is_some_and(|e| e.is_active_on(date))
            })
            .collect()
    }

    /// Prescription events within the active window of `date`.
    pub fn active_prescriptions(&self, date: Option<NaiveDateTime>) -> Vec<&PrescriptionEvent> {
        active_at_date(&self.prescription_profile, date)
    }
}

/// Events dated no more than [`ACTIVE_WINDOW_DAYS`] before `date`.
///
/// `date` defaults to the latest event date. Events after `date` are kept.
pub fn active_at_date(
    events: &[PrescriptionEvent],
    date: Option<NaiveDateTime>,
) -> Vec<&PrescriptionEvent> {
    let Some(anchor) = date.or_else(|| events.iter().map(|e| e.date).max()) else {
        return Vec::new();
    };
    let cutoff = anchor - Duration::days(ACTIVE_WINDOW_DAYS);
    events.iter().filter(|e| e.date >= cutoff).collect()
}

/// A single prescribing event with one or more drugs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionEvent {
    pub id: i64,
    pub drugs: Vec<Drug>,
    #[serde(with = "flexible_datetime")]
    pub date: NaiveDateTime,
}

/// A prescribed drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    pub id: i64,
    pub name: String,
    /// Number of units issued
    pub quantity: i64,
    #[serde(default)]
    pub event: Option<DrugEvent>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub instructions_to_patient: Option<String>,
    #[serde(default)]
    pub bnf_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Structured dosing information parsed from prescriber instructions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DosingInstructions {
    /// Minimum consumptions per time period
    #[serde(default)]
    pub min_consumption_frequency: Option<f64>,
    #[serde(default)]
    pub max_consumption_frequency: Option<f64>,
    #[serde(default)]
    pub time_period: Option<TimePeriod>,
    #[serde(default)]
    pub min_administrations_at_each_consumption: Option<f64>,
    #[serde(default)]
    pub max_administrations_at_each_consumption: Option<f64>,
    /// Drug quantity or measurement, e.g. "5ml"
    #[serde(default)]
    pub min_dose_quantity: Option<String>,
    #[serde(default)]
    pub max_dose_quantity: Option<String>,
    /// Form of the medication, e.g. "tablet", "puff"
    #[serde(default)]
    pub administration_unit: Option<String>,
    #[serde(default)]
    pub as_needed: bool,
    #[serde(default)]
    pub as_directed: bool,
}

impl DosingInstructions {
    /// Midpoint of the consumption frequency range, or whichever bound is present.
    pub fn default_consumption_frequency(&self) -> Option<f64> {
        midpoint(self.min_consumption_frequency, self.max_consumption_frequency)
    }

    /// Midpoint of the administrations-per-consumption range, or whichever bound is present.
    pub fn default_administration_quantity(&self) -> Option<f64> {
        midpoint(
            self.min_administrations_at_each_consumption,
            self.max_administrations_at_each_consumption,
        )
    }
}

fn midpoint(min: Option<f64>, max: Option<f64>) -> Option<f64> {
    match (min, max) {
        (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Dosing plus the estimated period a drug was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DrugEvent {
    #[serde(flatten)]
    pub dosing: DosingInstructions,
    #[serde(default)]
    pub instructions_to_patient: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default, with = "flexible_datetime::option")]
    pub start_date: Option<NaiveDateTime>,
    /// Estimated date the patient stops taking the drug
    #[serde(default, with = "flexible_datetime::option")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub active: Option<bool>,
    /// Days taken
    #[serde(default)]
    pub duration: Option<f64>,
}

impl DrugEvent {
    pub fn is_active_on(&self, date: NaiveDateTime) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }

    pub fn default_consumption_frequency(&self) -> Option<f64> {
        self.dosing.default_consumption_frequency()
    }

    pub fn default_administration_quantity(&self) -> Option<f64> {
        self.dosing.default_administration_quantity()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodPressure {
    /// mmHg
    pub blood_pressure_systolic: u32,
    /// mmHg
    pub blood_pressure_diastolic: u32,
}

/// Medical information from a general practice consultation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalConsultation {
    #[serde(with = "flexible_datetime")]
    pub date_of_consultation: NaiveDateTime,
    pub gp_notes: String,
    pub blood_pressure: BloodPressure,
    /// Since the previous consultation
    pub unplanned_hospital_admissions: u32,
    /// 0 (most deprived) to 10 (least deprived)
    pub deprivation_index: u8,
    /// mmol/L
    pub serum_sodium: f64,
    /// g/dL
    pub haemoglobin: f64,
    /// Percent
    pub oxygen_saturation: u32,
    /// bpm
    pub heart_rate: u32,
}

/// A medication review performed for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Consultation {
    #[serde(default, with = "flexible_datetime::option")]
    pub date_performed: Option<NaiveDateTime>,
    #[serde(default)]
    pub indicators: Option<Indicators>,
    #[serde(default)]
    pub prescription_profile: Vec<PrescriptionEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Indicators {
    #[serde(default)]
    pub llm_flag: Option<FlagIndicator>,
}

/// Date fields accept RFC 3339, naive ISO datetimes, or bare dates.
pub mod flexible_datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(dt);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid datetime: {}", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.format(FORMAT).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid datetime: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn event(id: i64, date: NaiveDateTime) -> PrescriptionEvent {
        PrescriptionEvent {
            id,
            drugs: vec![],
            date,
        }
    }

    fn patient_json() -> serde_json::Value {
        json!({
            "patient_id": 7,
            "age": 81,
            "gender": "female",
            "prescription_profile": [{
                "id": 1,
                "date": "2023-03-01T09:30:00",
                "drugs": [{
                    "id": 10,
                    "name": "Warfarin 1mg tablets",
                    "quantity": 28,
                    "event": {
                        "min_consumption_frequency": 1,
                        "max_consumption_frequency": 2,
                        "time_period": "daily",
                        "as_needed": false,
                        "start_date": "2023-03-01",
                        "end_date": "2023-03-29T00:00:00Z"
                    }
                }]
            }],
            "consultations": [],
            "medical_data": null
        })
    }

    #[test]
    fn test_patient_defaults() {
        let patient: Patient = serde_json::from_value(patient_json()).unwrap();
        assert_eq!(patient.schema_version, 1);
        assert_eq!(patient.organisation.as_deref(), Some("P2U"));
        assert!(!patient.created_datetime.is_empty());
        assert!(patient.latest_consultation().is_none());
        assert!(patient.latest_medical_data().is_none());
    }

    #[test]
    fn test_flexible_dates() {
        assert_eq!(flexible_datetime::parse("2023-03-01"), Some(at(2023, 3, 1)));
        assert_eq!(flexible_datetime::parse("2023-03-01T00:00:00.000"), Some(at(2023, 3, 1)));
        assert_eq!(flexible_datetime::parse("2023-03-01T01:00:00+01:00"), Some(at(2023, 3, 1)));
        assert_eq!(flexible_datetime::parse("01/03/2023"), None);
    }

    #[test]
    fn test_active_drugs() {
        let patient: Patient = serde_json::from_value(patient_json()).unwrap();
        assert_eq!(patient.active_drugs(at(2023, 3, 15)).len(), 1);
        assert!(patient.active_drugs(at(2023, 4, 15)).is_empty());
    }

    #[test]
    fn test_active_at_date_window() {
        let events = vec![
            event(1, at(2022, 1, 1)),
            event(2, at(2022, 9, 1)),
            event(3, at(2023, 1, 1)),
        ];
        let active: Vec<i64> = active_at_date(&events, None).iter().map(|e| e.id).collect();
        assert_eq!(active, vec![2, 3]);

        let active: Vec<i64> = active_at_date(&events, Some(at(2022, 2, 1)))
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(active, vec![1, 2, 3]);

        assert!(active_at_date(&[], None).is_empty());
    }

    #[test]
    fn test_dosing_defaults() {
        let dosing = DosingInstructions {
            min_consumption_frequency: Some(1.0),
            max_consumption_frequency: Some(3.0),
            max_administrations_at_each_consumption: Some(2.0),
            ..Default::default()
        };
        assert_eq!(dosing.default_consumption_frequency(), Some(2.0));
        assert_eq!(dosing.default_administration_quantity(), Some(2.0));
        assert_eq!(DosingInstructions::default().default_consumption_frequency(), None);
    }

    #[test]
    fn test_event_without_window_not_active() {
        let event = DrugEvent {
            start_date: Some(at(2023, 1, 1)),
            ..Default::default()
        };
        assert!(!event.is_active_on(at(2023, 1, 2)));
    }
}
