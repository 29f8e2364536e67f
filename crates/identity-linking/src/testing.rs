//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use identity_auth::{
    Artifact, ArtifactEngine, AuthConfig, Clock, MemoryArtifactStore, MemoryEmailGateway,
    MemoryUserStore, MockClock, PasswordHash, Session, SessionLifecycle, StoreError, StoreResult,
    User, UserId, UserStore,
};
use identity_tokens::{AccountAssociationToken, Sha256SecretHasher};
use url::Url;

use crate::account::{MemoryProviderAccountStore, ProviderAccount, ProviderAccountStore};
use crate::artifacts::{AccountAssociationSession, ProviderConnectionTicket, ProviderLinkRequest};
use crate::config::LinkingConfig;
use crate::error::{GatewayError, GatewayResult, LinkingResult};
use crate::oauth::{
    CodeVerifier, GatewayRegistry, IdentityProvider, OAuthConfig, OAuthProviderGateway,
    OAuthTokens, ProviderIdentity, ProviderUserId,
};
use crate::orchestrator::{
    AccountLinkingOrchestrator, AuthorizationRequest, FederatedOutcome, LinkingEngines,
    OAuthCallback,
};
use crate::redirect::ClientType;
use crate::state::FederatedFlow;

pub(crate) const STATE_SECRET: &str = "test-state-secret-0123456789abcdef";

/// Gateway that answers from a script instead of calling a provider.
///
/// The code `bad-code` fails the exchange; the identity is whatever was
/// last set, and fetching fails while none is set.
pub(crate) struct ScriptedGateway {
    config: OAuthConfig,
    identity: Mutex<Option<ProviderIdentity>>,
    revoked: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(provider: IdentityProvider) -> Self {
        Self {
            config: OAuthConfig::new(
                provider,
                "client-id",
                "client-secret",
                format!("https://api.example.com/auth/{provider}/callback"),
            ),
            identity: Mutex::new(None),
            revoked: AtomicUsize::new(0),
        }
    }

    pub fn set_identity(&self, provider_user_id: &str, email: &str) {
        *self.identity.lock().unwrap() = Some(ProviderIdentity {
            provider_user_id: ProviderUserId::new(provider_user_id),
            email: email.to_string(),
            name: Some("Provider User".to_string()),
            icon_url: Some("https://cdn.example.com/avatar.png".to_string()),
        });
    }

    pub fn fail_identity(&self) {
        *self.identity.lock().unwrap() = None;
    }

    pub fn revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProviderGateway for ScriptedGateway {
    fn provider(&self) -> IdentityProvider {
        self.config.provider
    }

    fn authorization_url(&self, state: &str, verifier: &CodeVerifier) -> LinkingResult<Url> {
        self.config.authorization_url(state, verifier)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &CodeVerifier,
    ) -> GatewayResult<OAuthTokens> {
        if code == "bad-code" || verifier.expose().is_empty() {
            return Err(GatewayError::TokenExchange("invalid_grant".to_string()));
        }
        Ok(OAuthTokens {
            access_token: format!("access-{code}"),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            id_token: None,
            scope: None,
        })
    }

    async fn fetch_identity(&self, _tokens: &OAuthTokens) -> GatewayResult<ProviderIdentity> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::IdentityFetch("userinfo returned 500".to_string()))
    }

    async fn revoke_token(&self, _tokens: &OAuthTokens) -> GatewayResult<()> {
        self.revoked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider account store whose writes always fail with `error`.
///
/// Reads go to `inner`, so the orchestrator still sees existing links.
pub(crate) struct FailingAccountStore {
    inner: MemoryProviderAccountStore,
    error: StoreError,
}

impl FailingAccountStore {
    pub fn new(inner: &MemoryProviderAccountStore, error: StoreError) -> Self {
        Self {
            inner: inner.clone(),
            error,
        }
    }
}

#[async_trait]
impl ProviderAccountStore for FailingAccountStore {
    async fn find_by_provider_user(
        &self,
        provider: IdentityProvider,
        provider_user_id: &ProviderUserId,
    ) -> StoreResult<Option<ProviderAccount>> {
        self.inner
            .find_by_provider_user(provider, provider_user_id)
            .await
    }

    async fn find_by_user_and_provider(
        &self,
        user_id: UserId,
        provider: IdentityProvider,
    ) -> StoreResult<Option<ProviderAccount>> {
        self.inner.find_by_user_and_provider(user_id, provider).await
    }

    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<ProviderAccount>> {
        self.inner.find_by_user(user_id).await
    }

    async fn save(&self, _account: &ProviderAccount) -> StoreResult<()> {
        Err(self.error.clone())
    }

    async fn delete(&self, _user_id: UserId, _provider: IdentityProvider) -> StoreResult<bool> {
        Err(self.error.clone())
    }
}

/// Callback for `request` as the provider would deliver it.
pub(crate) fn callback(request: &AuthorizationRequest, code: &str) -> OAuthCallback {
    OAuthCallback {
        provider: IdentityProvider::Google,
        state: request.state.clone(),
        code: Some(code.to_string()),
        error: None,
        code_verifier: request.code_verifier.clone(),
        redirect_uri: Some(request.redirect_to_client.to_string()),
    }
}

pub(crate) struct TestContext {
    pub users: MemoryUserStore,
    pub clock: MockClock,
    pub emails: MemoryEmailGateway,
    pub accounts: MemoryProviderAccountStore,
    pub sessions_store: MemoryArtifactStore<Session>,
    pub associations_store: MemoryArtifactStore<AccountAssociationSession>,
    pub link_requests_store: MemoryArtifactStore<ProviderLinkRequest>,
    pub tickets_store: MemoryArtifactStore<ProviderConnectionTicket>,
    pub google: Arc<ScriptedGateway>,
    pub orchestrator: AccountLinkingOrchestrator,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_account_store(|accounts| {
            Arc::new(accounts.clone()) as Arc<dyn ProviderAccountStore>
        })
    }

    /// Context whose orchestrator writes links through the store built by
    /// `port`; `accounts` is still the in-memory store underneath.
    pub fn with_account_store(
        port: impl FnOnce(&MemoryProviderAccountStore) -> Arc<dyn ProviderAccountStore>,
    ) -> Self {
        let users = MemoryUserStore::new();
        let clock = MockClock::default();
        let emails = MemoryEmailGateway::new();
        let accounts = MemoryProviderAccountStore::new();
        let sessions_store = MemoryArtifactStore::new();
        let associations_store = MemoryArtifactStore::new();
        let link_requests_store = MemoryArtifactStore::new();
        let tickets_store = MemoryArtifactStore::new();
        let google = Arc::new(ScriptedGateway::new(IdentityProvider::Google));
        let auth_config = AuthConfig::default();

        fn engine<A: Artifact>(
            store: &MemoryArtifactStore<A>,
            users: &MemoryUserStore,
            clock: &MockClock,
        ) -> ArtifactEngine<A> {
            ArtifactEngine::new(
                Arc::new(store.clone()),
                Arc::new(users.clone()),
                Arc::new(Sha256SecretHasher),
                Arc::new(clock.clone()),
            )
        }

        let engines = LinkingEngines {
            sessions: SessionLifecycle::new(
                engine(&sessions_store, &users, &clock),
                &auth_config,
            ),
            associations: engine(&associations_store, &users, &clock),
            link_requests: engine(&link_requests_store, &users, &clock),
            tickets: engine(&tickets_store, &users, &clock),
        };
        let gateways = GatewayRegistry::new()
            .with(google.clone())
            .with(Arc::new(ScriptedGateway::new(IdentityProvider::Discord)));
        let config =
            LinkingConfig::new(STATE_SECRET).with_web_base_url("https://app.example.com");

        let orchestrator = AccountLinkingOrchestrator::new(
            engines,
            port(&accounts),
            gateways,
            Arc::new(emails.clone()),
            config,
            &auth_config,
        )
        .unwrap();

        Self {
            users,
            clock,
            emails,
            accounts,
            sessions_store,
            associations_store,
            link_requests_store,
            tickets_store,
            google,
            orchestrator,
        }
    }

    /// Verified user with a password.
    pub async fn user(&self, email: &str) -> User {
        self.users
            .create(
                User::new(email, self.clock.now())
                    .verified()
                    .with_password_hash(PasswordHash::new("plain$pw")),
            )
            .await
            .unwrap()
    }

    /// Verified user without a password.
    pub async fn provider_only_user(&self, email: &str) -> User {
        self.users
            .create(User::new(email, self.clock.now()).verified())
            .await
            .unwrap()
    }

    /// Link a Google identity directly in the store.
    pub async fn link(&self, user_id: UserId, provider_user_id: &str) {
        self.link_at(IdentityProvider::Google, user_id, provider_user_id)
            .await;
    }

    /// Link a Discord identity directly in the store.
    pub async fn link_discord(&self, user_id: UserId, provider_user_id: &str) {
        self.link_at(IdentityProvider::Discord, user_id, provider_user_id)
            .await;
    }

    async fn link_at(&self, provider: IdentityProvider, user_id: UserId, provider_user_id: &str) {
        self.accounts
            .save(&ProviderAccount::new(
                provider,
                ProviderUserId::new(provider_user_id),
                user_id,
                self.clock.now(),
            ))
            .await
            .unwrap();
    }

    /// Start a unified Google sign-in from the web client.
    pub fn begin(&self, flow: FederatedFlow) -> AuthorizationRequest {
        self.orchestrator
            .begin_federated(IdentityProvider::Google, ClientType::Web, flow, Some("/done"))
            .unwrap()
    }

    /// Start a Google link for `user` from the web client.
    pub async fn begin_link(&self, user: &User) -> AuthorizationRequest {
        let grant = self
            .orchestrator
            .request_provider_link(user, IdentityProvider::Google)
            .await
            .unwrap();
        self.orchestrator
            .begin_provider_link(IdentityProvider::Google, &grant.token, ClientType::Web, None)
            .await
            .unwrap()
    }

    /// Obtain an association offer for `owner` by signing in with a new
    /// Google identity that has the owner's email.
    pub async fn offer(&self, owner: &User, provider_user_id: &str) -> AccountAssociationToken {
        self.google.set_identity(provider_user_id, &owner.email);
        let request = self.begin(FederatedFlow::Unified);
        let result = self
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap();
        match result.outcome {
            FederatedOutcome::AssociationAvailable { token, .. } => token,
            other => panic!("expected association offer, got {}", other.code()),
        }
    }
}
