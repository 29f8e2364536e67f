//! Account linking orchestrator
//!
//! Decides what a verified provider identity means for the local account
//! space: sign in, sign up, or an offer to associate it with an existing
//! account that has the same email. Accounts are never merged silently.
//!
//! The operations are split by flow:
//!
//! - [`federated`]: sign-in/sign-up through a provider
//! - [`association`]: completing an association offer
//! - [`provider_link`]: linking a provider to a signed-in user
//! - [`connections`]: connection tickets, listing and unlinking
//!
//! Cross-store writes are not transactional. Linking stays exclusive
//! because provider account stores enforce both uniqueness keys at save,
//! and a conflicting save is re-checked and reported as the matching
//! linking error.

pub mod association;
pub mod connections;
pub mod federated;
pub mod provider_link;

use std::sync::Arc;

use chrono::Duration;
use identity_auth::{
    ArtifactEngine, AuthConfig, EmailGateway, SessionLifecycle, StoreError, UserId, UserStore,
};
use identity_tokens::{ScopedStateSigner, StateError};
use url::Url;

use crate::account::{ProviderAccount, ProviderAccountStore};
use crate::artifacts::{AccountAssociationSession, ProviderConnectionTicket, ProviderLinkRequest};
use crate::config::LinkingConfig;
use crate::error::{LinkingError, LinkingResult};
use crate::oauth::{
    CodeVerifier, GatewayRegistry, IdentityProvider, OAuthProviderGateway, ProviderIdentity,
    ProviderUserId,
};
use crate::redirect::{validate_redirect_url, ClientType};
use crate::state::{
    FederatedAuthState, ProviderLinkState, FEDERATED_AUTH_PURPOSE, PROVIDER_LINK_PURPOSE,
};

pub use association::AssociationOffer;
pub use connections::ConnectionTicketGrant;
pub use federated::{FederatedCallbackResult, FederatedOutcome};
pub use provider_link::{ProviderLinkGrant, ProviderLinkResult};

/// Everything needed to send the user agent to a provider.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Signed state, also kept by the client for the callback
    pub state: String,
    /// PKCE verifier the client must present on callback
    pub code_verifier: CodeVerifier,
    /// Validated client redirect for after the callback
    pub redirect_to_client: Url,
    /// Provider authorization URL
    pub redirect_to_provider: Url,
}

/// Query of an OAuth callback, plus what the client kept from the request.
#[derive(Debug, Clone)]
pub struct OAuthCallback {
    /// Provider from the callback route
    pub provider: IdentityProvider,
    /// `state` query parameter
    pub state: String,
    /// `code` query parameter
    pub code: Option<String>,
    /// `error` query parameter
    pub error: Option<String>,
    /// Verifier kept by the client since the request
    pub code_verifier: CodeVerifier,
    /// Client redirect kept since the request
    pub redirect_uri: Option<String>,
}

/// Artifact engines used by the orchestrator.
pub struct LinkingEngines {
    /// Login sessions
    pub sessions: SessionLifecycle,
    /// Association offers
    pub associations: ArtifactEngine<AccountAssociationSession>,
    /// Provider link requests
    pub link_requests: ArtifactEngine<ProviderLinkRequest>,
    /// Connection tickets
    pub tickets: ArtifactEngine<ProviderConnectionTicket>,
}

/// Lifetimes of the artifacts the orchestrator issues.
#[derive(Debug, Clone, Copy)]
struct Lifetimes {
    association: Duration,
    link_request: Duration,
    ticket: Duration,
}

/// OAuth sign-in and account linking.
pub struct AccountLinkingOrchestrator {
    gateways: GatewayRegistry,
    accounts: Arc<dyn ProviderAccountStore>,
    emails: Arc<dyn EmailGateway>,
    sessions: SessionLifecycle,
    associations: ArtifactEngine<AccountAssociationSession>,
    link_requests: ArtifactEngine<ProviderLinkRequest>,
    tickets: ArtifactEngine<ProviderConnectionTicket>,
    federated_state: ScopedStateSigner<FederatedAuthState>,
    link_state: ScopedStateSigner<ProviderLinkState>,
    config: LinkingConfig,
    lifetimes: Lifetimes,
    code_length: usize,
}

impl std::fmt::Debug for AccountLinkingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountLinkingOrchestrator")
            .field("gateways", &self.gateways)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AccountLinkingOrchestrator {
    /// Create the orchestrator.
    ///
    /// Fails if the state secret in `config` is unusable.
    pub fn new(
        engines: LinkingEngines,
        accounts: Arc<dyn ProviderAccountStore>,
        gateways: GatewayRegistry,
        emails: Arc<dyn EmailGateway>,
        config: LinkingConfig,
        auth_config: &AuthConfig,
    ) -> LinkingResult<Self> {
        config.validate()?;
        let codec = config.state_codec()?;

        Ok(Self {
            gateways,
            accounts,
            emails,
            sessions: engines.sessions,
            associations: engines.associations,
            link_requests: engines.link_requests,
            tickets: engines.tickets,
            federated_state: ScopedStateSigner::new(codec.clone(), FEDERATED_AUTH_PURPOSE),
            link_state: ScopedStateSigner::new(codec, PROVIDER_LINK_PURPOSE),
            config,
            lifetimes: Lifetimes {
                association: auth_config.account_association_ttl(),
                link_request: auth_config.provider_link_ttl(),
                ticket: auth_config.connection_ticket_ttl(),
            },
            code_length: auth_config.code_length,
        })
    }

    /// Session lifecycle used for grants.
    pub fn sessions(&self) -> &SessionLifecycle {
        &self.sessions
    }

    /// Delete expired association offers, link requests and tickets.
    pub async fn sweep_expired(&self) -> LinkingResult<u64> {
        let removed = self.associations.sweep_expired().await?
            + self.link_requests.sweep_expired().await?
            + self.tickets.sweep_expired().await?;
        Ok(removed)
    }

    fn users(&self) -> &Arc<dyn UserStore> {
        self.sessions.engine().users()
    }

    fn redirect_for(&self, client: ClientType, redirect_uri: Option<&str>) -> LinkingResult<Url> {
        let base = self.config.client_base(client);
        validate_redirect_url(base, redirect_uri.unwrap_or("/")).ok_or_else(|| {
            tracing::debug!(client = %client, "client redirect rejected");
            LinkingError::InvalidRedirectUri
        })
    }

    /// Reject a callback arriving for a provider other than the one the
    /// state was minted for.
    fn ensure_state_provider(
        provider: IdentityProvider,
        callback: &OAuthCallback,
    ) -> LinkingResult<()> {
        if provider == callback.provider {
            return Ok(());
        }
        tracing::debug!(
            expected = %provider,
            received = %callback.provider,
            "state used with another provider"
        );
        Err(StateError::Invalid.into())
    }

    fn authorization_request(
        gateway: &dyn OAuthProviderGateway,
        state: String,
        redirect_to_client: Url,
    ) -> LinkingResult<AuthorizationRequest> {
        let code_verifier = CodeVerifier::generate();
        let redirect_to_provider = gateway.authorization_url(&state, &code_verifier)?;
        Ok(AuthorizationRequest {
            state,
            code_verifier,
            redirect_to_client,
            redirect_to_provider,
        })
    }

    /// Turn a callback into a provider identity.
    ///
    /// Tokens are revoked once the identity has been fetched, whether or
    /// not the fetch succeeded; revocation failures are only logged.
    async fn provider_identity(
        gateway: &dyn OAuthProviderGateway,
        callback: &OAuthCallback,
        redirect_url: &Url,
    ) -> LinkingResult<ProviderIdentity> {
        let provider = gateway.provider();

        if let Some(error) = callback.error.as_deref() {
            tracing::info!(provider = %provider, error, "provider returned an error");
            return Err(if error == "access_denied" {
                LinkingError::ProviderAccessDenied {
                    redirect_url: redirect_url.clone(),
                }
            } else {
                LinkingError::ProviderError {
                    error: error.to_string(),
                    redirect_url: redirect_url.clone(),
                }
            });
        }

        let Some(code) = callback.code.as_deref() else {
            tracing::debug!(provider = %provider, "callback without code");
            return Err(LinkingError::TokenExchangeFailed {
                redirect_url: redirect_url.clone(),
            });
        };

        let tokens = gateway
            .exchange_code(code, &callback.code_verifier)
            .await
            .map_err(|e| {
                tracing::warn!(provider = %provider, error = %e, "token exchange failed");
                LinkingError::TokenExchangeFailed {
                    redirect_url: redirect_url.clone(),
                }
            })?;

        let identity = gateway.fetch_identity(&tokens).await;

        if let Err(e) = gateway.revoke_token(&tokens).await {
            tracing::warn!(provider = %provider, error = %e, "token revocation failed");
        }

        identity.map_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "identity fetch failed");
            LinkingError::IdentityFetchFailed {
                redirect_url: redirect_url.clone(),
            }
        })
    }

    /// Reject a link that would break either uniqueness key.
    async fn ensure_linkable(
        &self,
        user_id: UserId,
        provider: IdentityProvider,
        provider_user_id: &ProviderUserId,
        redirect_url: Option<&Url>,
    ) -> LinkingResult<()> {
        if self
            .accounts
            .find_by_user_and_provider(user_id, provider)
            .await?
            .is_some()
        {
            return Err(LinkingError::ProviderAlreadyLinked {
                redirect_url: redirect_url.cloned(),
            });
        }

        if self
            .accounts
            .find_by_provider_user(provider, provider_user_id)
            .await?
            .is_some()
        {
            return Err(LinkingError::AccountLinkedElsewhere {
                redirect_url: redirect_url.cloned(),
            });
        }

        Ok(())
    }

    /// Link a provider identity to `user_id`, re-checked at commit.
    async fn link_identity(
        &self,
        user_id: UserId,
        provider: IdentityProvider,
        provider_user_id: &ProviderUserId,
        redirect_url: Option<&Url>,
    ) -> LinkingResult<ProviderAccount> {
        self.ensure_linkable(user_id, provider, provider_user_id, redirect_url)
            .await?;

        let account = ProviderAccount::new(
            provider,
            provider_user_id.clone(),
            user_id,
            self.sessions.engine().now(),
        );

        match self.accounts.save(&account).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, provider = %provider, "provider linked");
                Ok(account)
            }
            Err(StoreError::Conflict(detail)) => {
                tracing::info!(
                    user_id = %user_id,
                    provider = %provider,
                    detail = %detail,
                    "provider link lost a race"
                );
                self.ensure_linkable(user_id, provider, provider_user_id, redirect_url)
                    .await?;
                // the winning row is gone again; report the identity as taken
                Err(LinkingError::AccountLinkedElsewhere {
                    redirect_url: redirect_url.cloned(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
