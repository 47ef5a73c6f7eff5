use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::error::{CoreError, Result};
use crate::id::generate_id;
use crate::model::BillStatus;
use crate::time::{iso_date, parse_date};
use crate::validation::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub contact_number: String,
}

/// Where a patient was before a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferRecord {
    pub from_department_id: String,
    pub from_bed_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub transferred_at: OffsetDateTime,
}

/// One stay. Active while `discharged_at` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Admission {
    pub department_id: String,
    pub bed_id: String,
    pub reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub admitted_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub discharged_at: Option<OffsetDateTime>,
    pub bill_id: String,
    pub bill_status: BillStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transfers: Vec<TransferRecord>,
}

impl Admission {
    pub fn is_active(&self) -> bool {
        self.discharged_at.is_none()
    }
}

/// Everything needed to open a new admission.
#[derive(Debug, Clone)]
pub struct AdmissionDetails {
    pub department_id: String,
    pub bed_id: String,
    pub reason: String,
    pub bill_id: String,
    pub bill_status: BillStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date")]
    pub date_of_birth: Date,
    pub gender: Gender,
    pub contact_number: String,
    pub emergency_contact: EmergencyContact,
    /// Append-only; only the last entry may be active.
    #[serde(default)]
    pub admissions: Vec<Admission>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Patient {
    pub fn active_admission(&self) -> Option<&Admission> {
        self.admissions.last().filter(|a| a.is_active())
    }

    fn active_admission_mut(&mut self) -> Option<&mut Admission> {
        self.admissions.last_mut().filter(|a| a.is_active())
    }

    pub fn is_admitted(&self) -> bool {
        self.active_admission().is_some()
    }

    /// Opens a new admission at `now`.
    pub fn admit(&mut self, details: AdmissionDetails, now: OffsetDateTime) -> Result<&Admission> {
        if self.is_admitted() {
            return Err(CoreError::validation(format!(
                "patient {} already has an active admission",
                self.id
            )));
        }
        self.admissions.push(Admission {
            department_id: details.department_id,
            bed_id: details.bed_id,
            reason: details.reason,
            admitted_at: now,
            discharged_at: None,
            bill_id: details.bill_id,
            bill_status: details.bill_status,
            transfers: Vec::new(),
        });
        self.admissions
            .last()
            .ok_or_else(|| CoreError::invalid_record("admission was not recorded"))
    }

    /// Closes the active admission, returning it. `None` if there is none.
    pub fn discharge(&mut self, now: OffsetDateTime) -> Option<&Admission> {
        let admission = self.active_admission_mut()?;
        admission.discharged_at = Some(now);
        Some(admission)
    }

    /// Moves the active admission to another bed, keeping its start time.
    pub fn transfer(
        &mut self,
        department_id: &str,
        bed_id: &str,
        now: OffsetDateTime,
    ) -> Option<&Admission> {
        let admission = self.active_admission_mut()?;
        let from_department_id =
            std::mem::replace(&mut admission.department_id, department_id.to_string());
        let from_bed_id = std::mem::replace(&mut admission.bed_id, bed_id.to_string());
        admission.transfers.push(TransferRecord {
            from_department_id,
            from_bed_id,
            transferred_at: now,
        });
        Some(admission)
    }

    /// Mirrors a bill's status onto the admission that opened it.
    pub fn set_bill_status(&mut self, bill_id: &str, status: BillStatus) -> bool {
        match self.admissions.iter_mut().find(|a| a.bill_id == bill_id) {
            Some(admission) => {
                admission.bill_status = status;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EmergencyContactDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub contact_number: String,
}

/// Demographics as submitted. Every field defaults to blank so validation can
/// report all missing fields together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatientDraft {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContactDraft>,
}

impl PatientDraft {
    /// Validates the draft into a patient with no admissions yet.
    pub fn into_patient(self, now: OffsetDateTime) -> Result<Patient> {
        let mut errors = FieldErrors::new();
        errors.require("firstName", &self.first_name);
        errors.require("lastName", &self.last_name);
        errors.require("contactNumber", &self.contact_number);

        let date_of_birth = if errors.require("dateOfBirth", &self.date_of_birth) {
            match parse_date(&self.date_of_birth) {
                Ok(date) if date > now.date() => {
                    errors.invalid("dateOfBirth", "must not be in the future");
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.invalid("dateOfBirth", "expected YYYY-MM-DD");
                    None
                }
            }
        } else {
            None
        };

        let gender = if errors.require("gender", &self.gender) {
            let parsed = Gender::parse(&self.gender);
            if parsed.is_none() {
                errors.invalid("gender", "expected male, female or other");
            }
            parsed
        } else {
            None
        };

        let contact = self.emergency_contact.unwrap_or_default();
        errors.require("emergencyContact.name", &contact.name);
        errors.require("emergencyContact.relationship", &contact.relationship);
        errors.require("emergencyContact.contactNumber", &contact.contact_number);

        errors.into_result()?;
        let (Some(date_of_birth), Some(gender)) = (date_of_birth, gender) else {
            return Err(CoreError::validation("invalid patient demographics"));
        };

        Ok(Patient {
            id: generate_id(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth,
            gender,
            contact_number: self.contact_number.trim().to_string(),
            emergency_contact: EmergencyContact {
                name: contact.name.trim().to_string(),
                relationship: contact.relationship.trim().to_string(),
                contact_number: contact.contact_number.trim().to_string(),
            },
            admissions: Vec::new(),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now_utc;
    use serde_json::json;

    fn draft() -> PatientDraft {
        serde_json::from_value(json!({
            "firstName": "Ada",
            "lastName": "Okafor",
            "dateOfBirth": "1990-05-17",
            "gender": "female",
            "contactNumber": "+2348000000",
            "emergencyContact": {
                "name": "Chidi Okafor",
                "relationship": "brother",
                "contactNumber": "+2348000001"
            }
        }))
        .unwrap()
    }

    fn details(bed: &str) -> AdmissionDetails {
        AdmissionDetails {
            department_id: "d1".into(),
            bed_id: bed.into(),
            reason: "observation".into(),
            bill_id: "bill-1".into(),
            bill_status: BillStatus::Draft,
        }
    }

    #[test]
    fn valid_draft_builds_patient() {
        let patient = draft().into_patient(now_utc()).unwrap();
        assert_eq!(patient.gender, Gender::Female);
        assert!(!patient.is_admitted());
    }

    #[test]
    fn reports_missing_fields() {
        let mut draft = draft();
        draft.first_name.clear();
        draft.emergency_contact = None;
        let message = draft.into_patient(now_utc()).unwrap_err().to_string();
        assert!(message.contains("firstName"));
        assert!(message.contains("emergencyContact.name"));
        assert!(message.contains("emergencyContact.contactNumber"));
    }

    #[test]
    fn rejects_future_birth_date_and_unknown_gender() {
        let mut draft = draft();
        draft.date_of_birth = "2999-01-01".into();
        draft.gender = "robot".into();
        let message = draft.into_patient(now_utc()).unwrap_err().to_string();
        assert!(message.contains("dateOfBirth (must not be in the future)"));
        assert!(message.contains("gender"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let raw = json!({"firstName": "Ada", "bloodType": "O+"});
        assert!(serde_json::from_value::<PatientDraft>(raw).is_err());
    }

    #[test]
    fn admission_lifecycle() {
        let mut patient = draft().into_patient(now_utc()).unwrap();
        patient.admit(details("b1"), now_utc()).unwrap();
        assert!(patient.admit(details("b2"), now_utc()).is_err());

        let admitted_at = patient.active_admission().unwrap().admitted_at;
        let moved = patient.transfer("d2", "b2", now_utc()).unwrap();
        assert_eq!(moved.bed_id, "b2");
        assert_eq!(moved.admitted_at, admitted_at);
        assert_eq!(moved.transfers[0].from_bed_id, "b1");

        assert!(patient.discharge(now_utc()).is_some());
        assert!(patient.active_admission().is_none());
        assert!(patient.discharge(now_utc()).is_none());

        patient.admit(details("b3"), now_utc()).unwrap();
        assert_eq!(patient.admissions.len(), 2);
    }

    #[test]
    fn stored_patient_round_trips() {
        let mut patient = draft().into_patient(now_utc()).unwrap();
        patient.admit(details("b1"), now_utc()).unwrap();
        let value = serde_json::to_value(&patient).unwrap();
        assert_eq!(value["dateOfBirth"], json!("1990-05-17"));
        assert_eq!(value["admissions"][0]["dischargedAt"], json!(null));
        let back: Patient = serde_json::from_value(value).unwrap();
        assert_eq!(back, patient);
    }
}
