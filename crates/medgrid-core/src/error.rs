use thiserror::Error;

/// Core error types for MedGrid records
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid record data: {message}")]
    InvalidRecord { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate(value.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Errors caused by caller input rather than by a broken stored record.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId(_)
                | Self::InvalidDate(_)
                | Self::Validation(_)
                | Self::InvalidTransition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = CoreError::invalid_id("");
        assert!(matches!(err, CoreError::InvalidId(_)));
        assert!(err.is_client_error());

        let err = CoreError::invalid_transition("paid", "draft");
        assert_eq!(err.to_string(), "Invalid status transition: paid -> draft");
        assert!(err.is_client_error());

        let err = CoreError::invalid_record("bed without department");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::JsonError(_)));
    }
}
