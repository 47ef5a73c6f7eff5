use medgrid_core::CoreError;
use medgrid_storage::StorageError;
use thiserror::Error;

/// Failures of occupancy, ward and billing operations.
///
/// Every variant leaves stored state unchanged.
#[derive(Debug, Error)]
pub enum OccupancyError {
    /// Malformed or missing input; the caller must fix and resubmit.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The bed is occupied, under maintenance, or was taken by a concurrent
    /// request. Retry with another bed or re-query availability.
    #[error("Bed {bed_id} is unavailable: {reason}")]
    BedUnavailable { bed_id: String, reason: String },

    #[error("Patient {patient_id} has no active admission")]
    NoActiveAdmission { patient_id: String },

    #[error("Patient {patient_id} is already admitted")]
    AlreadyAdmitted { patient_id: String },

    /// A uniqueness rule was violated (duplicate bed number, ...).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or was too contended; retry with backoff.
    #[error("Storage temporarily unavailable: {0}")]
    Transient(#[source] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OccupancyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn bed_unavailable(bed_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BedUnavailable {
            bed_id: bed_id.into(),
            reason: reason.into(),
        }
    }

    pub fn no_active_admission(patient_id: impl Into<String>) -> Self {
        Self::NoActiveAdmission {
            patient_id: patient_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable code, shared with the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::BedUnavailable { .. } => "bed_unavailable",
            Self::NoActiveAdmission { .. } => "no_active_admission",
            Self::AlreadyAdmitted { .. } => "already_admitted",
            Self::Conflict(_) => "conflict",
            Self::Transient(_) => "store_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<CoreError> for OccupancyError {
    fn from(err: CoreError) -> Self {
        if err.is_client_error() {
            Self::Validation(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<StorageError> for OccupancyError {
    fn from(err: StorageError) -> Self {
        if err.is_transient() {
            Self::Transient(err)
        } else {
            tracing::error!(error = %err, category = %err.category(), "unexpected storage error");
            Self::Internal(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, OccupancyError>;
