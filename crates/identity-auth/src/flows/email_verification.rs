//! Email verification for signed-in users.

use std::sync::Arc;

use chrono::Duration;
use identity_tokens::{EmailVerificationToken, VerificationCode};
use tracing::instrument;

use crate::artifact::EmailVerificationRequest;
use crate::config::AuthConfig;
use crate::engine::ArtifactEngine;
use crate::error::{AuthError, AuthResult};
use crate::ports::EmailGateway;
use crate::session::{SessionGrant, SessionLifecycle};
use crate::user::User;

/// Email verification flow.
pub struct EmailVerificationFlow {
    requests: ArtifactEngine<EmailVerificationRequest>,
    sessions: SessionLifecycle,
    emails: Arc<dyn EmailGateway>,
    ttl: Duration,
    code_length: usize,
}

impl EmailVerificationFlow {
    /// Create the flow.
    pub fn new(
        requests: ArtifactEngine<EmailVerificationRequest>,
        sessions: SessionLifecycle,
        emails: Arc<dyn EmailGateway>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            requests,
            sessions,
            emails,
            ttl: config.email_verification_ttl(),
            code_length: config.code_length,
        }
    }

    /// Replace any pending request of `user` and mail a new code to the
    /// user's current address.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn request(&self, user: &User) -> AuthResult<EmailVerificationToken> {
        if user.email_verified {
            return Err(AuthError::EmailAlreadyVerified);
        }

        self.requests.revoke_owner(user.id).await?;

        let code = VerificationCode::generate(self.code_length);
        let (request, token) = self
            .requests
            .issue(self.ttl, |seed| EmailVerificationRequest {
                id: seed.id,
                user_id: user.id,
                email: user.email.clone(),
                code,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        self.emails
            .send_verification_email(&request.email, request.code.expose())
            .await?;
        Ok(token)
    }

    /// Confirm the code, mark the email verified and start a fresh session.
    ///
    /// Every other session of the user is revoked.
    #[instrument(skip_all)]
    pub async fn confirm(
        &self,
        token: &EmailVerificationToken,
        code: &str,
    ) -> AuthResult<SessionGrant> {
        let (request, mut user) = self.requests.validate(token).await?.into_bound()?;
        self.requests.check_code(&request, code)?;

        self.requests.revoke_owner(user.id).await?;
        self.sessions.invalidate_all(user.id).await?;

        user.email_verified = true;
        user.updated_at = self.requests.now();
        let user = self.requests.users().update(user).await?;

        tracing::info!(user_id = %user.id, "email verified");
        self.sessions.grant(user).await
    }
}
