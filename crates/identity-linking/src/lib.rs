//! # Identity Linking
//!
//! OAuth sign-in and provider account linking for the identity service.
//!
//! ## Overview
//!
//! The identity-linking crate handles:
//! - **Providers**: PKCE authorization URLs and the gateway port per provider
//! - **Signed state**: purpose-scoped OAuth `state` for sign-in and linking
//! - **Orchestration**: sign in, sign up, or offer an association by email
//! - **Provider artifacts**: association offers, link requests, connection tickets
//! - **Redirects**: same-origin validation of client redirect targets
//!
//! ## Features
//!
//! - `memory` (default): in-memory provider account store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity_linking::{
//!     AccountLinkingOrchestrator, ClientType, FederatedFlow, FederatedOutcome,
//!     IdentityProvider,
//! };
//!
//! let request = orchestrator.begin_federated(
//!     IdentityProvider::Google,
//!     ClientType::Web,
//!     FederatedFlow::Unified,
//!     Some("/dashboard"),
//! )?;
//! // send the user agent to request.redirect_to_provider ...
//!
//! let result = orchestrator.federated_callback(&callback).await?;
//! match result.outcome {
//!     FederatedOutcome::SignedIn(grant) | FederatedOutcome::SignedUp(grant) => {
//!         // set grant.token as the session cookie
//!     }
//!     FederatedOutcome::AssociationAvailable { token, .. } => {
//!         // let the user confirm the association
//!     }
//! }
//! ```
//!
//! ## Cross-Crate Integration
//!
//! This crate integrates with:
//! - `identity-tokens`: tokens and the signed state codec
//! - `identity-auth`: artifact engine, sessions, users and email delivery

pub mod account;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod oauth;
pub mod orchestrator;
pub mod redirect;
pub mod state;

#[cfg(all(test, feature = "memory"))]
mod testing;

pub use account::{ProviderAccount, ProviderAccountStore};
pub use artifacts::{AccountAssociationSession, ProviderConnectionTicket, ProviderLinkRequest};
pub use config::{LinkingConfig, DEFAULT_MOBILE_SCHEME, DEFAULT_WEB_BASE_URL};
pub use error::{GatewayError, GatewayResult, LinkingError, LinkingResult};
pub use oauth::{
    CodeVerifier, GatewayRegistry, IdentityProvider, OAuthConfig, OAuthProviderGateway,
    OAuthTokens, ProviderIdentity, ProviderUserId, CODE_VERIFIER_LENGTH,
};
pub use orchestrator::{
    AccountLinkingOrchestrator, AssociationOffer, AuthorizationRequest, ConnectionTicketGrant,
    FederatedCallbackResult, FederatedOutcome, LinkingEngines, OAuthCallback, ProviderLinkGrant,
    ProviderLinkResult,
};
pub use redirect::{validate_redirect_url, ClientType};
pub use state::{FederatedAuthState, FederatedFlow, ProviderLinkState};

#[cfg(feature = "memory")]
pub use account::MemoryProviderAccountStore;
