//! Email/password login and logout.

use std::sync::Arc;

use identity_tokens::SessionToken;
use tracing::instrument;

use crate::error::{AuthError, AuthResult};
use crate::ports::PasswordHasher;
use crate::session::{SessionGrant, SessionLifecycle};
use crate::user::UserStore;

/// Password login flow.
pub struct PasswordLogin {
    users: Arc<dyn UserStore>,
    passwords: Arc<dyn PasswordHasher>,
    sessions: SessionLifecycle,
}

impl PasswordLogin {
    /// Create the flow.
    pub fn new(
        users: Arc<dyn UserStore>,
        passwords: Arc<dyn PasswordHasher>,
        sessions: SessionLifecycle,
    ) -> Self {
        Self {
            users,
            passwords,
            sessions,
        }
    }

    /// Sign in with email and password.
    ///
    /// Unknown emails, provider-only accounts and wrong passwords all
    /// report `INVALID_CREDENTIALS`.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<SessionGrant> {
        let Some(user) = self.users.find_by_email(email).await? else {
            tracing::debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.as_ref() else {
            tracing::debug!(user_id = %user.id, "login for account without password");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(password, hash).await? {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.sessions.grant(user).await
    }

    /// End the session behind `token`.
    pub async fn logout(&self, token: &SessionToken) -> AuthResult<()> {
        let validated = self.sessions.engine().validate(token).await?;
        self.sessions.invalidate(&validated.artifact.id).await
    }

    /// End every session of the user behind `token`.
    pub async fn logout_everywhere(&self, token: &SessionToken) -> AuthResult<u64> {
        let validated = self.sessions.engine().validate(token).await?;
        self.sessions.invalidate_all(validated.artifact.user_id).await
    }
}
