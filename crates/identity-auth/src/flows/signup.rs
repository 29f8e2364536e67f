//! Email signup.
//!
//! Signup runs in three steps over one [`SignupSession`]: request a code
//! for an unregistered email, confirm the code, then register with a
//! password. The account only comes into existence in the last step.

use std::sync::Arc;

use chrono::Duration;
use identity_tokens::{SignupSessionToken, VerificationCode};
use tracing::instrument;

use crate::artifact::SignupSession;
use crate::config::AuthConfig;
use crate::engine::ArtifactEngine;
use crate::error::{AuthError, AuthResult, StoreError};
use crate::ports::{EmailGateway, PasswordHasher};
use crate::session::{SessionGrant, SessionLifecycle};
use crate::user::User;

/// Signup flow.
pub struct SignupFlow {
    signups: ArtifactEngine<SignupSession>,
    sessions: SessionLifecycle,
    passwords: Arc<dyn PasswordHasher>,
    emails: Arc<dyn EmailGateway>,
    ttl: Duration,
    code_length: usize,
}

impl SignupFlow {
    /// Create the flow.
    pub fn new(
        signups: ArtifactEngine<SignupSession>,
        sessions: SessionLifecycle,
        passwords: Arc<dyn PasswordHasher>,
        emails: Arc<dyn EmailGateway>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            signups,
            sessions,
            passwords,
            emails,
            ttl: config.signup_session_ttl(),
            code_length: config.code_length,
        }
    }

    /// Start a signup for `email` and mail the verification code.
    #[instrument(skip_all)]
    pub async fn request(&self, email: &str) -> AuthResult<SignupSessionToken> {
        if self.signups.users().find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        let code = VerificationCode::generate(self.code_length);
        let (signup, token) = self
            .signups
            .issue(self.ttl, |seed| SignupSession {
                id: seed.id,
                email: email.to_string(),
                email_verified: false,
                code,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        self.emails
            .send_verification_email(&signup.email, signup.code.expose())
            .await?;
        Ok(token)
    }

    /// Confirm the emailed code. The session keeps its id and expiry.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &SignupSessionToken, code: &str) -> AuthResult<()> {
        let mut signup = self.signups.validate(token).await?.artifact;
        self.signups.check_code(&signup, code)?;

        signup.email_verified = true;
        self.signups.update(&signup).await
    }

    /// Create the account from a verified signup session.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        token: &SignupSessionToken,
        password: &str,
        name: Option<&str>,
    ) -> AuthResult<SessionGrant> {
        let signup = self.signups.validate(token).await?.artifact;
        if !signup.email_verified {
            return Err(AuthError::EmailNotVerified);
        }
        self.signups.consume(&signup.id).await?;

        let password_hash = self.passwords.hash(password).await?;
        let mut user = User::new(signup.email, self.signups.now())
            .verified()
            .with_password_hash(password_hash);
        if let Some(name) = name {
            user = user.with_name(name);
        }

        let user = match self.signups.users().create(user).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(AuthError::EmailAlreadyRegistered),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user.id, "account registered");
        self.sessions.grant(user).await
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::store::{ArtifactStore, MemoryArtifactStore};
    use crate::testing::{PlainPasswordHasher, TestContext};

    struct TestFixture {
        ctx: TestContext,
        store: MemoryArtifactStore<SignupSession>,
        flow: SignupFlow,
    }

    impl TestFixture {
        fn new() -> Self {
            let ctx = TestContext::new();
            let store = MemoryArtifactStore::new();
            let flow = SignupFlow::new(
                ctx.engine(&store),
                ctx.sessions(),
                Arc::new(PlainPasswordHasher),
                Arc::new(ctx.emails.clone()),
                &ctx.config,
            );
            Self { ctx, store, flow }
        }

        async fn code(&self, email: &str) -> String {
            self.ctx.emails.last_code_for(email).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_full_signup() {
        let fx = TestFixture::new();
        let token = fx.flow.request("new@example.com").await.unwrap();
        let code = fx.code("new@example.com").await;
        assert_eq!(code.len(), 8);

        fx.flow.verify_email(&token, &code).await.unwrap();
        let grant = fx
            .flow
            .register(&token, "hunter2", Some("New User"))
            .await
            .unwrap();

        assert_eq!(grant.user.email, "new@example.com");
        assert!(grant.user.email_verified);
        assert_eq!(grant.user.name.as_deref(), Some("New User"));
        assert!(fx.store.is_empty());

        // single use
        assert!(fx.flow.register(&token, "hunter2", None).await.is_err());
    }

    #[tokio::test]
    async fn test_request_rejects_registered_email() {
        let fx = TestFixture::new();
        fx.ctx.user_with_password("a@example.com", "pw").await;
        assert!(matches!(
            fx.flow.request("a@example.com").await,
            Err(AuthError::EmailAlreadyRegistered)
        ));
        assert!(fx.ctx.emails.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_code_allows_retry() {
        let fx = TestFixture::new();
        let token = fx.flow.request("new@example.com").await.unwrap();
        let code = fx.code("new@example.com").await;
        let wrong = if code == "00000000" { "11111111" } else { "00000000" };

        assert!(matches!(
            fx.flow.verify_email(&token, wrong).await,
            Err(AuthError::InvalidCode)
        ));
        fx.flow.verify_email(&token, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_requires_verified_email() {
        let fx = TestFixture::new();
        let token = fx.flow.request("new@example.com").await.unwrap();
        assert!(matches!(
            fx.flow.register(&token, "pw", None).await,
            Err(AuthError::EmailNotVerified)
        ));
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_keeps_id_and_expiry() {
        let fx = TestFixture::new();
        let token = fx.flow.request("new@example.com").await.unwrap();
        let (id, _) = token.decode().unwrap();
        let before = fx.store.find_by_id(&id).await.unwrap().unwrap();

        let code = fx.code("new@example.com").await;
        fx.flow.verify_email(&token, &code).await.unwrap();

        let after = fx.store.find_by_id(&id).await.unwrap().unwrap();
        assert!(after.email_verified);
        assert_eq!(after.expires_at, before.expires_at);
    }
}
