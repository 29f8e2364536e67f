//! Sign-in and sign-up through a provider.
//!
//! | provider account | same-email user | outcome |
//! |---|---|---|
//! | yes | any | login/unified: session. signup: `ACCOUNT_ALREADY_REGISTERED` |
//! | no | no | signup/unified: new user and link. login: `ACCOUNT_NOT_FOUND` |
//! | no | yes | association offer; the existing account must opt in |

use identity_auth::{SessionGrant, StoreError, User};
use identity_tokens::AccountAssociationToken;
use tracing::instrument;
use url::Url;

use super::{AccountLinkingOrchestrator, AuthorizationRequest, OAuthCallback};
use crate::artifacts::AccountAssociationSession;
use crate::error::{LinkingError, LinkingResult};
use crate::oauth::{IdentityProvider, ProviderIdentity};
use crate::redirect::ClientType;
use crate::state::{FederatedAuthState, FederatedFlow};

/// What a federated callback resolved to.
#[derive(Debug)]
pub enum FederatedOutcome {
    /// The identity is linked; the user is signed in
    SignedIn(SessionGrant),
    /// A new account was created and linked
    SignedUp(SessionGrant),
    /// An account with the same email exists; it may opt in to linking
    AssociationAvailable {
        /// Stored offer
        association: AccountAssociationSession,
        /// Token for the offer
        token: AccountAssociationToken,
    },
}

impl FederatedOutcome {
    /// Stable outcome code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            FederatedOutcome::SignedIn(_) => "SIGNED_IN",
            FederatedOutcome::SignedUp(_) => "SIGNED_UP",
            FederatedOutcome::AssociationAvailable { .. } => "ACCOUNT_ASSOCIATION_AVAILABLE",
        }
    }

    /// Session grant, when the outcome signed the user in.
    pub fn grant(&self) -> Option<&SessionGrant> {
        match self {
            FederatedOutcome::SignedIn(grant) | FederatedOutcome::SignedUp(grant) => Some(grant),
            FederatedOutcome::AssociationAvailable { .. } => None,
        }
    }
}

/// Result of a successful federated callback.
#[derive(Debug)]
pub struct FederatedCallbackResult {
    /// Client that started the flow
    pub client: ClientType,
    /// Validated client redirect
    pub redirect_url: Url,
    /// Decision
    pub outcome: FederatedOutcome,
}

impl AccountLinkingOrchestrator {
    /// Start a sign-in/sign-up at `provider`.
    #[instrument(skip_all, fields(provider = %provider, client = %client, flow = flow.as_str()))]
    pub fn begin_federated(
        &self,
        provider: IdentityProvider,
        client: ClientType,
        flow: FederatedFlow,
        redirect_uri: Option<&str>,
    ) -> LinkingResult<AuthorizationRequest> {
        let gateway = self.gateways.get(provider)?;
        let redirect_to_client = self.redirect_for(client, redirect_uri)?;
        let state = self.federated_state.sign(&FederatedAuthState {
            provider,
            client,
            flow,
        })?;
        Self::authorization_request(gateway.as_ref(), state, redirect_to_client)
    }

    /// Handle the provider callback of a sign-in/sign-up.
    #[instrument(skip_all, fields(provider = %callback.provider))]
    pub async fn federated_callback(
        &self,
        callback: &OAuthCallback,
    ) -> LinkingResult<FederatedCallbackResult> {
        let FederatedAuthState {
            provider,
            client,
            flow,
        } = self.federated_state.verify(&callback.state)?;
        Self::ensure_state_provider(provider, callback)?;
        let gateway = self.gateways.get(callback.provider)?;
        let redirect_url = self.redirect_for(client, callback.redirect_uri.as_deref())?;

        let identity =
            Self::provider_identity(gateway.as_ref(), callback, &redirect_url).await?;
        let outcome = self
            .resolve_identity(callback.provider, flow, identity, &redirect_url)
            .await?;

        tracing::info!(outcome = outcome.code(), "federated callback resolved");
        Ok(FederatedCallbackResult {
            client,
            redirect_url,
            outcome,
        })
    }

    async fn resolve_identity(
        &self,
        provider: IdentityProvider,
        flow: FederatedFlow,
        identity: ProviderIdentity,
        redirect_url: &Url,
    ) -> LinkingResult<FederatedOutcome> {
        let linked = self
            .accounts
            .find_by_provider_user(provider, &identity.provider_user_id)
            .await?;

        if let Some(account) = linked {
            if flow == FederatedFlow::Signup {
                return Err(LinkingError::AccountAlreadyRegistered {
                    redirect_url: redirect_url.clone(),
                });
            }

            let Some(user) = self.users().find_by_id(account.user_id).await? else {
                tracing::warn!(user_id = %account.user_id, "provider account without user");
                return Err(LinkingError::AccountNotFound {
                    redirect_url: redirect_url.clone(),
                });
            };
            return Ok(FederatedOutcome::SignedIn(self.sessions.grant(user).await?));
        }

        if let Some(owner) = self.users().find_by_email(&identity.email).await? {
            let (association, token) = self.offer_association(&owner, provider, identity).await?;
            return Ok(FederatedOutcome::AssociationAvailable { association, token });
        }

        if flow == FederatedFlow::Login {
            return Err(LinkingError::AccountNotFound {
                redirect_url: redirect_url.clone(),
            });
        }

        self.sign_up(provider, identity, redirect_url).await
    }

    /// Replace any pending offer of `owner` with a fresh code-less one.
    async fn offer_association(
        &self,
        owner: &User,
        provider: IdentityProvider,
        identity: ProviderIdentity,
    ) -> LinkingResult<(AccountAssociationSession, AccountAssociationToken)> {
        self.associations.revoke_owner(owner.id).await?;

        let offer = self
            .associations
            .issue(self.lifetimes.association, |seed| AccountAssociationSession {
                id: seed.id,
                user_id: owner.id,
                email: owner.email.clone(),
                provider,
                provider_user_id: identity.provider_user_id,
                code: None,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        tracing::info!(user_id = %owner.id, provider = %provider, "association offered");
        Ok(offer)
    }

    async fn sign_up(
        &self,
        provider: IdentityProvider,
        identity: ProviderIdentity,
        redirect_url: &Url,
    ) -> LinkingResult<FederatedOutcome> {
        let user = User::new(identity.email, self.sessions.engine().now())
            .verified()
            .with_icon_url(identity.icon_url);
        let user = match identity.name {
            Some(name) => user.with_name(name),
            None => user,
        };

        let user = match self.users().create(user).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => {
                return Err(LinkingError::AccountAlreadyRegistered {
                    redirect_url: redirect_url.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self
            .link_identity(user.id, provider, &identity.provider_user_id, Some(redirect_url))
            .await
        {
            // the new account is unusable without its link
            self.discard_user(&user).await;
            return Err(match e {
                LinkingError::AccountLinkedElsewhere { .. }
                | LinkingError::ProviderAlreadyLinked { .. } => {
                    tracing::warn!(provider = %provider, "identity registered concurrently");
                    LinkingError::AccountAlreadyRegistered {
                        redirect_url: redirect_url.clone(),
                    }
                }
                other => other,
            });
        }

        tracing::info!(user_id = %user.id, provider = %provider, "account registered");
        Ok(FederatedOutcome::SignedUp(self.sessions.grant(user).await?))
    }

    async fn discard_user(&self, user: &User) {
        match self.users().delete(user.id).await {
            Ok(_) => tracing::debug!(user_id = %user.id, "unlinked sign-up rolled back"),
            Err(e) => tracing::warn!(
                user_id = %user.id,
                error = %e,
                "failed to roll back unlinked sign-up"
            ),
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::account::ProviderAccountStore;
    use crate::oauth::ProviderUserId;
    use crate::testing::{callback, FailingAccountStore, TestContext};
    use identity_auth::UserStore;
    use std::sync::Arc;

    async fn sign_up_with_failing_links(error: StoreError) -> (TestContext, LinkingError) {
        let ctx = TestContext::with_account_store(|accounts| {
            Arc::new(FailingAccountStore::new(accounts, error)) as Arc<dyn ProviderAccountStore>
        });
        ctx.google.set_identity("g-1", "new@example.com");

        let request = ctx.begin(FederatedFlow::Signup);
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap_err();
        (ctx, err)
    }

    #[tokio::test]
    async fn test_begin_builds_authorization_url() {
        let ctx = TestContext::new();
        let request = ctx
            .orchestrator
            .begin_federated(
                IdentityProvider::Google,
                ClientType::Web,
                FederatedFlow::Unified,
                Some("/welcome"),
            )
            .unwrap();

        assert_eq!(
            request.redirect_to_client.as_str(),
            "https://app.example.com/welcome"
        );
        let query: std::collections::HashMap<_, _> =
            request.redirect_to_provider.query_pairs().into_owned().collect();
        assert_eq!(query["state"], request.state);
        assert_eq!(query["code_challenge"], request.code_verifier.challenge());
    }

    #[tokio::test]
    async fn test_begin_rejects_foreign_redirect_and_unknown_provider() {
        let ctx = TestContext::new();
        let err = ctx
            .orchestrator
            .begin_federated(
                IdentityProvider::Google,
                ClientType::Web,
                FederatedFlow::Login,
                Some("https://evil.example.com/"),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REDIRECT_URI");

        let err = ctx
            .orchestrator
            .begin_federated(
                IdentityProvider::Apple,
                ClientType::Web,
                FederatedFlow::Login,
                None,
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_PROVIDER");
    }

    #[tokio::test]
    async fn test_unified_signs_up_then_signs_in() {
        let ctx = TestContext::new();
        ctx.google.set_identity("g-1", "new@example.com");

        let request = ctx.begin(FederatedFlow::Unified);
        let first = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap();
        let FederatedOutcome::SignedUp(grant) = first.outcome else {
            panic!("expected sign-up");
        };
        assert!(grant.user.email_verified);
        assert_eq!(grant.user.name.as_deref(), Some("Provider User"));
        assert_eq!(first.client, ClientType::Web);

        let request = ctx.begin(FederatedFlow::Login);
        let second = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap();
        let FederatedOutcome::SignedIn(again) = second.outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(again.user.id, grant.user.id);
        assert_eq!(ctx.google.revoked(), 2);
    }

    #[tokio::test]
    async fn test_sign_up_link_conflict_removes_new_user() {
        let (ctx, err) =
            sign_up_with_failing_links(StoreError::Conflict("google g-1 taken".into())).await;

        assert_eq!(err.error_code(), "ACCOUNT_ALREADY_REGISTERED");
        assert!(ctx
            .users
            .find_by_email("new@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(ctx.users.is_empty());
        assert!(ctx.sessions_store.is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_link_store_failure_removes_new_user() {
        let (ctx, err) = sign_up_with_failing_links(StoreError::Backend("down".into())).await;

        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(ctx
            .users
            .find_by_email("new@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(ctx.sessions_store.is_empty());
    }

    #[tokio::test]
    async fn test_signup_flow_rejects_registered_identity() {
        let ctx = TestContext::new();
        let user = ctx.user("a@example.com").await;
        ctx.link(user.id, "g-1").await;
        ctx.google.set_identity("g-1", "a@example.com");

        let request = ctx.begin(FederatedFlow::Signup);
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_ALREADY_REGISTERED");
        assert_eq!(err.redirect_url(), Some(&request.redirect_to_client));
    }

    #[tokio::test]
    async fn test_login_flow_rejects_unknown_identity() {
        let ctx = TestContext::new();
        ctx.google.set_identity("g-9", "nobody@example.com");

        let request = ctx.begin(FederatedFlow::Login);
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
        assert!(ctx
            .users
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_same_email_offers_association_without_linking() {
        let ctx = TestContext::new();
        let owner = ctx.user("a@example.com").await;
        ctx.google.set_identity("g-1", "a@example.com");

        let request = ctx.begin(FederatedFlow::Unified);
        let result = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap();

        let FederatedOutcome::AssociationAvailable { association, .. } = result.outcome else {
            panic!("expected association offer");
        };
        assert_eq!(association.user_id, owner.id);
        assert!(association.code.is_none());
        assert!(ctx
            .accounts
            .find_by_provider_user(IdentityProvider::Google, &ProviderUserId::new("g-1"))
            .await
            .unwrap()
            .is_none());
        assert!(ctx.sessions_store.is_empty());
    }

    #[tokio::test]
    async fn test_provider_errors_carry_redirect() {
        let ctx = TestContext::new();
        let request = ctx.begin(FederatedFlow::Unified);

        let mut denied = callback(&request, "code");
        denied.code = None;
        denied.error = Some("access_denied".to_string());
        let err = ctx.orchestrator.federated_callback(&denied).await.unwrap_err();
        assert_eq!(err.error_code(), "PROVIDER_ACCESS_DENIED");
        assert_eq!(err.redirect_url(), Some(&request.redirect_to_client));

        denied.error = Some("server_error".to_string());
        let err = ctx.orchestrator.federated_callback(&denied).await.unwrap_err();
        assert_eq!(err.error_code(), "PROVIDER_ERROR");

        denied.error = None;
        let err = ctx.orchestrator.federated_callback(&denied).await.unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_EXCHANGE_FAILED");

        let bad_code = callback(&request, "bad-code");
        let err = ctx.orchestrator.federated_callback(&bad_code).await.unwrap_err();
        assert_eq!(err.error_code(), "TOKEN_EXCHANGE_FAILED");
        assert_eq!(ctx.google.revoked(), 0);
    }

    #[tokio::test]
    async fn test_identity_failure_still_revokes() {
        let ctx = TestContext::new();
        ctx.google.fail_identity();

        let request = ctx.begin(FederatedFlow::Unified);
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "IDENTITY_FETCH_FAILED");
        assert_eq!(ctx.google.revoked(), 1);
    }

    #[tokio::test]
    async fn test_tampered_or_foreign_state_is_rejected() {
        let ctx = TestContext::new();
        let request = ctx.begin(FederatedFlow::Unified);

        let mut tampered = callback(&request, "code");
        tampered.state.push('0');
        let err = ctx.orchestrator.federated_callback(&tampered).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");

        // a provider-link state is signed with the same key but another purpose
        let user = ctx.user("a@example.com").await;
        let grant = ctx
            .orchestrator
            .request_provider_link(&user, IdentityProvider::Google)
            .await
            .unwrap();
        let link = ctx
            .orchestrator
            .begin_provider_link(IdentityProvider::Google, &grant.token, ClientType::Web, None)
            .await
            .unwrap();
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&link, "code"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert_eq!(ctx.google.revoked(), 0);
    }

    #[tokio::test]
    async fn test_callback_for_other_provider_is_rejected() {
        let ctx = TestContext::new();
        ctx.google.set_identity("g-1", "new@example.com");
        let request = ctx.begin(FederatedFlow::Unified);

        let mut other = callback(&request, "code");
        other.provider = IdentityProvider::Discord;
        let err = ctx.orchestrator.federated_callback(&other).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(ctx.users.is_empty());
        assert_eq!(ctx.google.revoked(), 0);
    }

    #[tokio::test]
    async fn test_dangling_provider_account() {
        let ctx = TestContext::new();
        ctx.link(identity_auth::UserId::new(), "g-1").await;
        ctx.google.set_identity("g-1", "ghost@example.com");

        let request = ctx.begin(FederatedFlow::Login);
        let err = ctx
            .orchestrator
            .federated_callback(&callback(&request, "code"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
        assert!(ctx.sessions_store.is_empty());
    }
}
