//! Typed records for the ward domain.
//!
//! Stored documents and request payloads both go through these types, so a
//! record with unknown or missing fields is rejected instead of drifting.

mod bed;
mod bill;
mod department;
mod patient;
mod user;

pub use bed::{Bed, BedStatus, NewBed};
pub use bill::{Bill, BillStatus};
pub use department::{Department, NewDepartment};
pub use patient::{
    Admission, AdmissionDetails, EmergencyContact, EmergencyContactDraft, Gender, Patient,
    PatientDraft, TransferRecord,
};
pub use user::{NewUser, StaffRole, User, UserProfile, normalize_email};
