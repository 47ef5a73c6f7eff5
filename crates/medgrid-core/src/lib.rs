pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod time;
pub mod validation;

pub use error::{CoreError, Result};
pub use events::{OccupancyEvent, OCCUPANCY_CHANGED};
pub use id::{IdError, generate_id, validate_id};
pub use model::{
    Admission, AdmissionDetails, Bed, BedStatus, Bill, BillStatus, Department, EmergencyContact,
    Gender, NewBed, NewDepartment, NewUser, Patient, PatientDraft, StaffRole, TransferRecord, User,
    UserProfile, normalize_email,
};
pub use crate::time::{now_utc, parse_date};
