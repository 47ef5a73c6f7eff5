//! Authentication error types.

use medgrid_core::CoreError;
use medgrid_storage::StorageError;

use crate::token::JwtError;

/// Errors that can occur while registering, logging in or authorizing staff.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The registration or login payload is incomplete or malformed.
    #[error("{0}")]
    Validation(String),

    /// E-mail and password do not match a known account.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Another account already uses this e-mail address.
    #[error("Email already registered: {email}")]
    EmailTaken { email: String },

    /// The request carries no usable credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The bearer token is malformed or its signature does not verify.
    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    /// The bearer token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authenticated user lacks the required role.
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// The account store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller must (re)authenticate.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::Unauthorized { .. }
                | Self::InvalidToken { .. }
                | Self::TokenExpired
        )
    }
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        if err.is_client_error() {
            Self::Validation(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => Self::TokenExpired,
            JwtError::Encoding { message } => Self::internal(message),
            other => Self::invalid_token(other.to_string()),
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::internal(format!("password hashing failed: {err}"))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_require_authentication() {
        assert!(AuthError::from(JwtError::Expired).is_unauthorized());
        assert!(AuthError::from(JwtError::InvalidSignature).is_unauthorized());
        assert!(!AuthError::forbidden("admin only").is_unauthorized());
    }

    #[test]
    fn test_core_validation_maps_to_validation() {
        let err = AuthError::from(CoreError::validation("missing required fields: email"));
        assert!(matches!(err, AuthError::Validation(m) if m.contains("email")));
    }
}
