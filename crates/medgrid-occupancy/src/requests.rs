//! Request payloads accepted by the occupancy operations.
//!
//! Every field defaults to blank so that validation can name all missing
//! fields at once; unknown fields are rejected during deserialization.

use medgrid_core::model::EmergencyContactDraft;
use medgrid_core::validation::{FieldErrors, non_blank};
use medgrid_core::{BedStatus, BillStatus, CoreError, Patient, PatientDraft};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{OccupancyError, Result};

/// Admission form. Either `patientId` (returning patient) or the patient's
/// demographics must be given, not both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdmitRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
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
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub bed_id: String,
    #[serde(default)]
    pub reason_for_admission: String,
    #[serde(default)]
    pub bill_status: Option<BillStatus>,
}

pub(crate) enum AdmittedPatient {
    New(Patient),
    Existing(String),
}

pub(crate) struct ValidatedAdmit {
    pub patient: AdmittedPatient,
    pub department_id: String,
    pub bed_id: String,
    pub reason: String,
    pub bill_status: BillStatus,
}

impl AdmitRequest {
    /// Admission of a patient not yet on record.
    pub fn new_patient(
        draft: PatientDraft,
        department_id: impl Into<String>,
        bed_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: None,
            first_name: draft.first_name,
            last_name: draft.last_name,
            date_of_birth: draft.date_of_birth,
            gender: draft.gender,
            contact_number: draft.contact_number,
            emergency_contact: draft.emergency_contact,
            department_id: department_id.into(),
            bed_id: bed_id.into(),
            reason_for_admission: reason.into(),
            bill_status: None,
        }
    }

    /// Re-admission of a patient already on record.
    pub fn returning(
        patient_id: impl Into<String>,
        department_id: impl Into<String>,
        bed_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: Some(patient_id.into()),
            department_id: department_id.into(),
            bed_id: bed_id.into(),
            reason_for_admission: reason.into(),
            ..Self::default()
        }
    }

    pub fn with_bill_status(mut self, status: BillStatus) -> Self {
        self.bill_status = Some(status);
        self
    }

    fn has_demographics(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.date_of_birth,
            &self.gender,
            &self.contact_number,
        ]
        .iter()
        .any(|v| !v.trim().is_empty())
            || self.emergency_contact.is_some()
    }

    pub(crate) fn validate(self, now: OffsetDateTime) -> Result<ValidatedAdmit> {
        let mut errors = FieldErrors::new();
        errors.require("departmentId", &self.department_id);
        errors.require("bedId", &self.bed_id);
        errors.require("reasonForAdmission", &self.reason_for_admission);
        let admission = errors.into_result();

        let patient = match non_blank(self.patient_id.as_deref()) {
            Some(_) if self.has_demographics() => Err(CoreError::validation(
                "patientId cannot be combined with patient details",
            )),
            Some(id) => Ok(AdmittedPatient::Existing(id)),
            None => PatientDraft {
                first_name: self.first_name,
                last_name: self.last_name,
                date_of_birth: self.date_of_birth,
                gender: self.gender,
                contact_number: self.contact_number,
                emergency_contact: self.emergency_contact,
            }
            .into_patient(now)
            .map(AdmittedPatient::New),
        };

        match (admission, patient) {
            (Ok(()), Ok(patient)) => Ok(ValidatedAdmit {
                patient,
                department_id: self.department_id.trim().to_string(),
                bed_id: self.bed_id.trim().to_string(),
                reason: self.reason_for_admission.trim().to_string(),
                bill_status: self.bill_status.unwrap_or_default(),
            }),
            (admission, patient) => {
                let messages: Vec<String> = [admission.err(), patient.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| match e {
                        CoreError::Validation(message) => message,
                        other => other.to_string(),
                    })
                    .collect();
                Err(OccupancyError::Validation(messages.join("; ")))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferRequest {
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub bed_id: String,
}

impl TransferRequest {
    pub fn new(department_id: impl Into<String>, bed_id: impl Into<String>) -> Self {
        Self {
            department_id: department_id.into(),
            bed_id: bed_id.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(String, String)> {
        let mut errors = FieldErrors::new();
        errors.require("departmentId", &self.department_id);
        errors.require("bedId", &self.bed_id);
        errors.into_result()?;
        Ok((
            self.department_id.trim().to_string(),
            self.bed_id.trim().to_string(),
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedStatusUpdate {
    #[serde(default)]
    pub status: Option<BedStatus>,
}

impl BedStatusUpdate {
    pub fn into_status(self) -> Result<BedStatus> {
        self.status
            .ok_or_else(|| OccupancyError::validation("missing required fields: status"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillStatusUpdate {
    #[serde(default)]
    pub status: Option<BillStatus>,
}

impl BillStatusUpdate {
    pub fn into_status(self) -> Result<BillStatus> {
        self.status
            .ok_or_else(|| OccupancyError::validation("missing required fields: status"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgrid_core::now_utc;
    use serde_json::json;

    fn form() -> serde_json::Value {
        json!({
            "firstName": "Ada",
            "lastName": "Okafor",
            "dateOfBirth": "1990-05-17",
            "gender": "female",
            "contactNumber": "555-0100",
            "emergencyContact": {"name": "Chidi", "relationship": "brother", "contactNumber": "555-0101"},
            "departmentId": "d1",
            "bedId": "b1",
            "reasonForAdmission": "chest pain",
            "billStatus": "generated"
        })
    }

    #[test]
    fn accepts_admission_form() {
        let request: AdmitRequest = serde_json::from_value(form()).unwrap();
        let admit = request.validate(now_utc()).unwrap();
        assert!(matches!(admit.patient, AdmittedPatient::New(_)));
        assert_eq!(admit.bill_status, BillStatus::Generated);
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut raw = form();
        raw["ward"] = json!("x");
        assert!(serde_json::from_value::<AdmitRequest>(raw).is_err());
    }

    #[test]
    fn reports_admission_and_patient_fields_together() {
        let request: AdmitRequest =
            serde_json::from_value(json!({"firstName": "Ada", "bedId": "b1"})).unwrap();
        let Err(OccupancyError::Validation(message)) = request.validate(now_utc()) else {
            panic!("expected validation error");
        };
        assert!(message.contains("departmentId"));
        assert!(message.contains("reasonForAdmission"));
        assert!(message.contains("lastName"));
    }

    #[test]
    fn returning_patient_cannot_carry_demographics() {
        let mut request = AdmitRequest::returning("p1", "d1", "b1", "follow-up");
        assert!(matches!(
            request.clone().validate(now_utc()).unwrap().patient,
            AdmittedPatient::Existing(ref id) if id == "p1"
        ));
        request.first_name = "Ada".into();
        assert!(request.validate(now_utc()).is_err());
    }

    #[test]
    fn transfer_requires_both_ids() {
        assert!(TransferRequest::new("d1", " ").validate().is_err());
        assert_eq!(
            TransferRequest::new(" d1", "b2").validate().unwrap(),
            ("d1".to_string(), "b2".to_string())
        );
    }
}
