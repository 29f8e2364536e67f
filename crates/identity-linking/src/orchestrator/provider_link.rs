//! Linking a provider to a signed-in user.
//!
//! The user first obtains a [`ProviderLinkRequest`] for one provider. Its
//! token is burned when the authorization redirect is built, and the user
//! id then travels inside the signed state to the callback.

use identity_auth::{AuthError, InvalidReason, User};
use identity_tokens::ProviderLinkRequestToken;
use tracing::instrument;
use url::Url;

use super::{AccountLinkingOrchestrator, AuthorizationRequest, OAuthCallback};
use crate::account::ProviderAccount;
use crate::artifacts::ProviderLinkRequest;
use crate::error::LinkingResult;
use crate::oauth::IdentityProvider;
use crate::redirect::ClientType;
use crate::state::ProviderLinkState;

/// A freshly issued link request.
#[derive(Debug, Clone)]
pub struct ProviderLinkGrant {
    /// Stored request
    pub request: ProviderLinkRequest,
    /// Token for the request
    pub token: ProviderLinkRequestToken,
}

/// Result of a successful provider-link callback.
#[derive(Debug, Clone)]
pub struct ProviderLinkResult {
    /// Client that started the flow
    pub client: ClientType,
    /// Validated client redirect
    pub redirect_url: Url,
    /// New link
    pub account: ProviderAccount,
}

impl AccountLinkingOrchestrator {
    /// Issue a request to link `provider` to `user`, replacing older ones.
    #[instrument(skip_all, fields(user_id = %user.id, provider = %provider))]
    pub async fn request_provider_link(
        &self,
        user: &User,
        provider: IdentityProvider,
    ) -> LinkingResult<ProviderLinkGrant> {
        self.gateways.get(provider)?;
        self.link_requests.revoke_owner(user.id).await?;

        let (request, token) = self
            .link_requests
            .issue(self.lifetimes.link_request, |seed| ProviderLinkRequest {
                id: seed.id,
                user_id: user.id,
                provider,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        Ok(ProviderLinkGrant { request, token })
    }

    /// Redeem a link request and build the authorization redirect.
    ///
    /// The client redirect is checked before the request is touched, so an
    /// invalid redirect does not burn it.
    #[instrument(skip_all, fields(provider = %provider, client = %client))]
    pub async fn begin_provider_link(
        &self,
        provider: IdentityProvider,
        token: &ProviderLinkRequestToken,
        client: ClientType,
        redirect_uri: Option<&str>,
    ) -> LinkingResult<AuthorizationRequest> {
        let gateway = self.gateways.get(provider)?;
        let redirect_to_client = self.redirect_for(client, redirect_uri)?;

        let (request, user) = self.link_requests.validate(token).await?.into_bound()?;
        if request.provider != provider {
            tracing::debug!(
                artifact_id = %request.id,
                requested = %request.provider,
                "link request used for another provider"
            );
            return Err(AuthError::Invalid(InvalidReason::WrongSubject).into());
        }

        let state = self.link_state.sign(&ProviderLinkState {
            provider,
            client,
            uid: user.id,
        })?;
        Self::authorization_request(gateway.as_ref(), state, redirect_to_client)
    }

    /// Handle the provider callback of a link.
    #[instrument(skip_all, fields(provider = %callback.provider))]
    pub async fn provider_link_callback(
        &self,
        callback: &OAuthCallback,
    ) -> LinkingResult<ProviderLinkResult> {
        let ProviderLinkState {
            provider,
            client,
            uid,
        } = self.link_state.verify(&callback.state)?;
        Self::ensure_state_provider(provider, callback)?;
        let gateway = self.gateways.get(callback.provider)?;
        let redirect_url = self.redirect_for(client, callback.redirect_uri.as_deref())?;

        let identity =
            Self::provider_identity(gateway.as_ref(), callback, &redirect_url).await?;

        if self.users().find_by_id(uid).await?.is_none() {
            tracing::debug!(user_id = %uid, "link target no longer exists");
            return Err(AuthError::Invalid(InvalidReason::OwnerMissing).into());
        }

        let account = self
            .link_identity(
                uid,
                callback.provider,
                &identity.provider_user_id,
                Some(&redirect_url),
            )
            .await?;

        Ok(ProviderLinkResult {
            client,
            redirect_url,
            account,
        })
    }
}
