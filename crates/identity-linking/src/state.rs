//! OAuth state payloads.
//!
//! Both flows round-trip a small typed payload through the provider inside
//! a signed state string. Each payload type has its own purpose, so a state
//! minted for one flow never verifies in the other. Payloads also name the
//! provider the flow was started with; a callback for another provider is
//! rejected.

use identity_auth::UserId;
use serde::{Deserialize, Serialize};

use crate::oauth::IdentityProvider;
use crate::redirect::ClientType;

/// Purpose of sign-in/sign-up state.
pub const FEDERATED_AUTH_PURPOSE: &str = "federated-auth";

/// Purpose of provider-link state.
pub const PROVIDER_LINK_PURPOSE: &str = "provider-link";

/// Which outcomes a federated flow accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedFlow {
    /// Existing accounts only
    Login,
    /// New accounts only
    Signup,
    /// Sign in, or sign up when the identity is new
    Unified,
}

impl FederatedFlow {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedFlow::Login => "login",
            FederatedFlow::Signup => "signup",
            FederatedFlow::Unified => "unified",
        }
    }
}

/// State carried through a sign-in/sign-up redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederatedAuthState {
    /// Provider the user was sent to
    pub provider: IdentityProvider,
    /// Client that started the flow
    pub client: ClientType,
    /// Flow variant
    pub flow: FederatedFlow,
}

/// State carried through a provider-link redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderLinkState {
    /// Provider being linked
    pub provider: IdentityProvider,
    /// Client that started the flow
    pub client: ClientType,
    /// User the provider will be linked to
    pub uid: UserId,
}
