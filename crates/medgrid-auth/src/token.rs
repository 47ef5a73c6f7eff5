//! HS256 access tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use medgrid_core::{StaffRole, User};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Issuer stamped into and required from every token.
pub const ISSUER: &str = "medgrid";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {message}")]
    Encoding { message: String },

    #[error("Failed to decode token: {message}")]
    Decoding { message: String },

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Decoding {
                message: err.to_string(),
            },
        }
    }
}

/// Claims carried by a staff access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: StaffRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, now: OffsetDateTime, ttl_secs: i64) -> Self {
        let iat = now.unix_timestamp();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            iss: ISSUER.to_string(),
            iat,
            exp: iat + ttl_secs,
        }
    }
}

/// Signs and validates tokens with a shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issues a token for `user` valid for the configured TTL.
    pub fn issue(&self, user: &User, now: OffsetDateTime) -> Result<String, JwtError> {
        self.encode(&Claims::for_user(user, now, self.ttl_secs))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            JwtError::Encoding {
                message: e.to_string(),
            }
        })
    }

    /// Decodes a token, checking signature, issuer and expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_aud = false;

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgrid_core::now_utc;

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "admin@example.org".into(),
            full_name: "Admin".into(),
            role: StaffRole::Admin,
            password_hash: String::new(),
            created_at: now_utc(),
        }
    }

    #[test]
    fn test_issue_and_decode() {
        let jwt = JwtService::new("a-very-long-test-secret-value", 3600);
        let token = jwt.issue(&user(), now_utc()).unwrap();
        let claims = jwt.decode(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, StaffRole::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = JwtService::new("a-very-long-test-secret-value", 3600);
        let past = now_utc() - time::Duration::hours(3);
        let token = jwt.issue(&user(), past).unwrap();
        assert!(matches!(jwt.decode(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let ours = JwtService::new("a-very-long-test-secret-value", 3600);
        let theirs = JwtService::new("somebody-elses-secret-value", 3600);
        let token = theirs.issue(&user(), now_utc()).unwrap();
        assert!(matches!(ours.decode(&token), Err(JwtError::InvalidSignature)));
        assert!(ours.decode("garbage").is_err());
    }
}
