//! Password reset.
//!
//! A reset is requested by email, its code confirmed, then completed with
//! the new password. Completing it revokes every session of the user.

use std::sync::Arc;

use chrono::Duration;
use identity_tokens::{PasswordResetToken, VerificationCode};
use tracing::instrument;

use crate::artifact::PasswordResetSession;
use crate::config::AuthConfig;
use crate::engine::ArtifactEngine;
use crate::error::{AuthError, AuthResult};
use crate::ports::{EmailGateway, PasswordHasher};
use crate::session::SessionLifecycle;

/// Password reset flow.
pub struct PasswordResetFlow {
    resets: ArtifactEngine<PasswordResetSession>,
    sessions: SessionLifecycle,
    passwords: Arc<dyn PasswordHasher>,
    emails: Arc<dyn EmailGateway>,
    ttl: Duration,
    code_length: usize,
}

impl PasswordResetFlow {
    /// Create the flow.
    pub fn new(
        resets: ArtifactEngine<PasswordResetSession>,
        sessions: SessionLifecycle,
        passwords: Arc<dyn PasswordHasher>,
        emails: Arc<dyn EmailGateway>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            resets,
            sessions,
            passwords,
            emails,
            ttl: config.password_reset_ttl(),
            code_length: config.code_length,
        }
    }

    /// Start a reset for the account registered under `email`.
    #[instrument(skip_all)]
    pub async fn request(&self, email: &str) -> AuthResult<PasswordResetToken> {
        let Some(user) = self.resets.users().find_by_email(email).await? else {
            return Err(AuthError::UserNotFound);
        };

        self.resets.revoke_owner(user.id).await?;

        let code = VerificationCode::generate(self.code_length);
        let (reset, token) = self
            .resets
            .issue(self.ttl, |seed| PasswordResetSession {
                id: seed.id,
                user_id: user.id,
                email: user.email.clone(),
                email_verified: false,
                code,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        self.emails
            .send_verification_email(&reset.email, reset.code.expose())
            .await?;
        Ok(token)
    }

    /// Confirm the emailed code.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &PasswordResetToken, code: &str) -> AuthResult<()> {
        let mut reset = self.resets.validate(token).await?.artifact;
        self.resets.check_code(&reset, code)?;

        reset.email_verified = true;
        self.resets.update(&reset).await
    }

    /// Set the new password and sign the user out everywhere.
    #[instrument(skip_all)]
    pub async fn complete(&self, token: &PasswordResetToken, new_password: &str) -> AuthResult<()> {
        let (reset, mut user) = self.resets.validate(token).await?.into_bound()?;
        if !reset.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.resets.revoke_owner(user.id).await?;

        user.password_hash = Some(self.passwords.hash(new_password).await?);
        user.updated_at = self.resets.now();
        let user = self.resets.users().update(user).await?;

        self.sessions.invalidate_all(user.id).await?;
        tracing::info!(user_id = %user.id, "password reset completed");
        Ok(())
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;
    use crate::testing::{PlainPasswordHasher, TestContext};
    use crate::user::UserStore;

    struct TestFixture {
        ctx: TestContext,
        store: MemoryArtifactStore<PasswordResetSession>,
        flow: PasswordResetFlow,
    }

    impl TestFixture {
        fn new() -> Self {
            let ctx = TestContext::new();
            let store = MemoryArtifactStore::new();
            let flow = PasswordResetFlow::new(
                ctx.engine(&store),
                ctx.sessions(),
                Arc::new(PlainPasswordHasher),
                Arc::new(ctx.emails.clone()),
                &ctx.config,
            );
            Self { ctx, store, flow }
        }
    }

    #[tokio::test]
    async fn test_full_reset() {
        let fx = TestFixture::new();
        let user = fx.ctx.user_with_password("a@example.com", "old").await;
        fx.ctx.sessions().create(user.id).await.unwrap();

        let token = fx.flow.request("a@example.com").await.unwrap();
        let code = fx.ctx.emails.last_code_for("a@example.com").await.unwrap();
        fx.flow.verify_email(&token, &code).await.unwrap();
        fx.flow.complete(&token, "new").await.unwrap();

        let stored = fx.ctx.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(PlainPasswordHasher
            .verify("new", stored.password_hash.as_ref().unwrap())
            .await
            .unwrap());
        assert!(fx.store.is_empty());
        assert!(fx.ctx.sessions_store.is_empty());
        assert!(fx.flow.complete(&token, "again").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let fx = TestFixture::new();
        assert!(matches!(
            fx.flow.request("nobody@example.com").await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_verified_code() {
        let fx = TestFixture::new();
        fx.ctx.user_with_password("a@example.com", "old").await;
        let token = fx.flow.request("a@example.com").await.unwrap();

        assert!(matches!(
            fx.flow.complete(&token, "new").await,
            Err(AuthError::EmailNotVerified)
        ));
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_new_request_revokes_old() {
        let fx = TestFixture::new();
        fx.ctx.user_with_password("a@example.com", "old").await;
        let first = fx.flow.request("a@example.com").await.unwrap();
        let second = fx.flow.request("a@example.com").await.unwrap();

        let err = fx.flow.verify_email(&first, "00000000").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID");

        let code = fx.ctx.emails.last_code_for("a@example.com").await.unwrap();
        fx.flow.verify_email(&second, &code).await.unwrap();
    }
}
