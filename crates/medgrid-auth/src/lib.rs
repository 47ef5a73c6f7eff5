//! Staff authentication for MedGrid.
//!
//! - [`password`]: argon2id hashing of staff passwords
//! - [`token`]: HS256 access tokens carrying user id, e-mail and role
//! - [`service`]: registration, login and bearer-token authentication over
//!   the document store

pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use password::{hash_password, verify_password};
pub use service::{AuthContext, AuthService, AuthSession, Credentials};
pub use token::{Claims, JwtError, JwtService};
