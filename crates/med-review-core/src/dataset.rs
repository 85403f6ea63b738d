//! Patient dataset loading.
//!
//! Patients are stored one JSON object per line. Each line is handed to a
//! [`PatientSchemaHandler`] for its schema version.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use thiserror::Error;

use crate::models::Patient;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: invalid JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: {reason}")]
    Invalid { line: usize, reason: String },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Builds a [`Patient`] from one raw dataset record.
pub trait PatientSchemaHandler {
    /// Schema version this handler reads.
    fn version(&self) -> u32;

    fn load_patient(&self, record: serde_json::Value) -> Result<Patient, String>;
}

/// Schema version 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1Handler;

impl PatientSchemaHandler for V1Handler {
    fn version(&self) -> u32 {
        1
    }

    fn load_patient(&self, record: serde_json::Value) -> Result<Patient, String> {
        let has_prescriptions = record
            .get("prescription_profile")
            .and_then(|p| p.as_array())
            .is_some_and(|p| !p.is_empty());
        if !has_prescriptions {
            return Err("record does not contain a prescription profile".to_string());
        }

        let patient: Patient = serde_json::from_value(record).map_err(|e| e.to_string())?;
        if patient.schema_version != self.version() {
            return Err(format!(
                "schema version {} is not supported (expected {})",
                patient.schema_version,
                self.version()
            ));
        }

        if let Some(data) = &patient.medical_data {
            if let Some(bad) = data.iter().find(|m| m.deprivation_index > 10) {
                return Err(format!(
                    "deprivation index {} is outside 0..=10",
                    bad.deprivation_index
                ));
            }
        }

        Ok(patient)
    }
}

/// Read patients from JSON Lines. Blank lines are skipped.
pub fn read_jsonl<R: Read>(
    reader: R,
    handler: &dyn PatientSchemaHandler,
) -> DatasetResult<Vec<Patient>> {
    let mut patients = Vec::new();
    for (idx, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let record: serde_json::Value =
            serde_json::from_str(&line).map_err(|source| DatasetError::Json {
                line: line_no,
                source,
            })?;
        let patient = handler
            .load_patient(record)
            .map_err(|reason| DatasetError::Invalid {
                line: line_no,
                reason,
            })?;
        patients.push(patient);
    }
    Ok(patients)
}

/// Load a JSON Lines patients file.
pub fn load_jsonl<P: AsRef<Path>>(
    path: P,
    handler: &dyn PatientSchemaHandler,
) -> DatasetResult<Vec<Patient>> {
    let path = path.as_ref();
    let patients = read_jsonl(File::open(path)?, handler)?;
    tracing::info!(
        path = %path.display(),
        patients = patients.len(),
        schema_version = handler.version(),
        "Loaded patients"
    );
    Ok(patients)
}
