use thiserror::Error;

const MAX_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("id must not be empty")]
    Empty,
    #[error("id exceeds {MAX_ID_LEN} characters")]
    TooLong,
    #[error("id contains invalid character {0:?}")]
    InvalidChar(char),
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ids are opaque, but restricted to `[A-Za-z0-9._-]` so they are safe to use
/// in URL paths and as scope keys.
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(IdError::InvalidChar(c));
    }
    Ok(())
}
