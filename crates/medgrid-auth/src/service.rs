//! Staff accounts: registration, login and token authentication.

use medgrid_core::{NewUser, StaffRole, User, UserProfile, normalize_email, now_utc};
use medgrid_storage::{Collection, DynStorage, StorageError, WriteBatch};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::password::{hash_password, verify_password};
use crate::token::{Claims, JwtService};

/// Who is making the request, as proven by a valid token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub role: StaffRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fails with `Forbidden` unless the caller is an administrator.
    pub fn require_admin(&self) -> AuthResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::forbidden("administrator role required"))
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Token plus the profile it was issued for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    storage: DynStorage,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(storage: DynStorage, jwt: JwtService) -> Self {
        Self { storage, jwt }
    }

    /// Creates an account and returns a session for it.
    ///
    /// The user record and its e-mail index entry are committed together, so
    /// two concurrent registrations with the same address cannot both succeed.
    pub async fn register(&self, draft: NewUser) -> AuthResult<AuthSession> {
        draft.validate()?;
        let hash = hash_blocking(draft.password.clone()).await?;
        let user = draft.into_user(hash, now_utc());

        let batch = WriteBatch::new()
            .create(
                Collection::UserEmails,
                json!({ "id": user.email, "userId": user.id }),
            )
            .create(Collection::Users, to_document(&user)?);

        match self.storage.commit(batch).await {
            Ok(_) => {}
            Err(StorageError::AlreadyExists { .. }) => {
                return Err(AuthError::EmailTaken { email: user.email });
            }
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, role = %user.role, "staff account registered");
        self.session_for(&user)
    }

    pub async fn login(&self, credentials: Credentials) -> AuthResult<AuthSession> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::Validation(
                "missing required fields: email, password".to_string(),
            ));
        }

        let Some(user) = self.find_by_email(&credentials.email).await? else {
            warn!("login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let password = credentials.password;
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::internal(format!("password check aborted: {e}")))??;
        if !valid {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        debug!(user_id = %user.id, "login succeeded");
        self.session_for(&user)
    }

    /// Validates a bearer token.
    pub fn authenticate(&self, token: &str) -> AuthResult<AuthContext> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::unauthorized("empty bearer token"));
        }
        let claims = self.jwt.decode(token).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::from(e)
        })?;
        Ok(claims.into())
    }

    /// Loads the profile of the authenticated user.
    pub async fn me(&self, context: &AuthContext) -> AuthResult<UserProfile> {
        match self.storage.read(Collection::Users, &context.user_id).await? {
            Some(stored) => Ok(stored.decode::<User>()?.profile()),
            None => Err(AuthError::unauthorized("account no longer exists")),
        }
    }

    /// Creates the configured administrator account if no account uses its
    /// e-mail yet. Returns `true` when an account was created.
    pub async fn ensure_bootstrap_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> AuthResult<bool> {
        if self.find_by_email(email).await?.is_some() {
            debug!("bootstrap admin already present");
            return Ok(false);
        }

        let draft = NewUser {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            role: Some(StaffRole::Admin),
        };
        match self.register(draft).await {
            Ok(_) => {
                info!("bootstrap admin account created");
                Ok(true)
            }
            Err(AuthError::EmailTaken { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let email = normalize_email(email);
        let Some(index) = self.storage.read(Collection::UserEmails, &email).await? else {
            return Ok(None);
        };
        let Some(user_id) = index.field("/userId").and_then(|v| v.as_str()) else {
            return Err(AuthError::internal(format!("e-mail index entry {email} has no userId")));
        };
        match self.storage.read(Collection::Users, user_id).await? {
            Some(stored) => Ok(Some(stored.decode()?)),
            None => Ok(None),
        }
    }

    fn session_for(&self, user: &User) -> AuthResult<AuthSession> {
        Ok(AuthSession {
            token: self.jwt.issue(user, now_utc())?,
            user: user.profile(),
        })
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("backend", &self.storage.backend_name())
            .field("jwt", &self.jwt)
            .finish()
    }
}

async fn hash_blocking(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::internal(format!("password hashing aborted: {e}")))?
        .map_err(AuthError::from)
}

fn to_document(user: &User) -> AuthResult<serde_json::Value> {
    serde_json::to_value(user).map_err(|e| AuthError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use medgrid_db_memory::InMemoryStorage;

    use super::*;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryStorage::new()),
            JwtService::new("unit-test-secret-0123456789", 3600),
        )
    }

    fn nurse(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password: "correct horse".into(),
            full_name: "Nurse Joy".into(),
            role: Some(StaffRole::Nurse),
        }
    }

    #[tokio::test]
    async fn test_register_login_and_authenticate() {
        let auth = service();
        let session = auth.register(nurse("Joy@Example.org")).await.unwrap();
        assert_eq!(session.user.email, "joy@example.org");

        let ctx = auth.authenticate(&session.token).unwrap();
        assert_eq!(ctx.role, StaffRole::Nurse);
        assert!(ctx.require_admin().is_err());
        assert_eq!(auth.me(&ctx).await.unwrap().full_name, "Nurse Joy");

        let login = auth
            .login(Credentials {
                email: "joy@example.org".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(login.user.id, session.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let auth = service();
        auth.register(nurse("joy@example.org")).await.unwrap();
        let err = auth.register(nurse(" JOY@example.org")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken { .. }));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() {
        let auth = service();
        auth.register(nurse("joy@example.org")).await.unwrap();

        for (email, password) in [("joy@example.org", "wrong horse"), ("nobody@example.org", "x")] {
            let err = auth
                .login(Credentials {
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn test_invalid_registration() {
        let auth = service();
        let err = auth
            .register(NewUser {
                password: "short".into(),
                ..nurse("joy@example.org")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let auth = service();
        assert!(auth.ensure_bootstrap_admin("root@example.org", "change-me-now", "Root").await.unwrap());
        assert!(!auth.ensure_bootstrap_admin("root@example.org", "change-me-now", "Root").await.unwrap());

        let session = auth
            .login(Credentials {
                email: "root@example.org".into(),
                password: "change-me-now".into(),
            })
            .await
            .unwrap();
        assert!(auth.authenticate(&session.token).unwrap().is_admin());
    }

    #[test]
    fn test_garbage_token() {
        let err = service().authenticate("not.a.token").unwrap_err();
        assert!(err.is_unauthorized());
        assert!(service().authenticate("  ").unwrap_err().is_unauthorized());
    }
}
