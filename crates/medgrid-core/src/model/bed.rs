use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};
use crate::id::{generate_id, validate_id};
use crate::validation::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Available,
    Occupied,
    Maintenance,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BedStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(CoreError::validation(format!(
                "unknown bed status '{other}', expected available, occupied or maintenance"
            ))),
        }
    }
}

/// A bed in exactly one department.
///
/// `current_patient_id` is a non-owning back-reference to the patient whose
/// active admission points at this bed. It is always serialized (as `null`
/// when free) so conditional writes can match on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Bed {
    pub id: String,
    pub department_id: String,
    pub bed_number: String,
    pub status: BedStatus,
    pub current_patient_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Bed {
    /// JSON pointer of the status field in the stored document.
    pub const STATUS_POINTER: &'static str = "/status";
    /// JSON pointer of the back-reference in the stored document.
    pub const PATIENT_POINTER: &'static str = "/currentPatientId";
    pub const DEPARTMENT_POINTER: &'static str = "/departmentId";

    pub fn is_available(&self) -> bool {
        self.status == BedStatus::Available
    }

    /// `occupied` iff a back-reference is set.
    pub fn is_consistent(&self) -> bool {
        (self.status == BedStatus::Occupied) == self.current_patient_id.is_some()
    }

    pub fn is_occupied_by(&self, patient_id: &str) -> bool {
        self.status == BedStatus::Occupied && self.current_patient_id.as_deref() == Some(patient_id)
    }

    pub fn occupied_by(&self, patient_id: &str, now: OffsetDateTime) -> Bed {
        Bed {
            status: BedStatus::Occupied,
            current_patient_id: Some(patient_id.to_string()),
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn released(&self, now: OffsetDateTime) -> Bed {
        self.with_status(BedStatus::Available, now)
    }

    /// Non-occupied status change; clears the back-reference.
    pub fn with_status(&self, status: BedStatus, now: OffsetDateTime) -> Bed {
        Bed {
            status,
            current_patient_id: None,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBed {
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub bed_number: String,
    /// Initial status; beds can start in maintenance but never occupied.
    #[serde(default)]
    pub status: Option<BedStatus>,
}

impl NewBed {
    pub fn into_bed(self, now: OffsetDateTime) -> Result<Bed> {
        let mut errors = FieldErrors::new();
        if errors.require("departmentId", &self.department_id)
            && let Err(e) = validate_id(self.department_id.trim())
        {
            errors.invalid("departmentId", e.to_string());
        }
        errors.require("bedNumber", &self.bed_number);
        let status = self.status.unwrap_or(BedStatus::Available);
        if status == BedStatus::Occupied {
            errors.invalid("status", "a new bed cannot start occupied");
        }
        errors.into_result()?;

        Ok(Bed {
            id: generate_id(),
            department_id: self.department_id.trim().to_string(),
            bed_number: self.bed_number.trim().to_string(),
            status,
            current_patient_id: None,
            updated_at: now,
        })
    }
}
