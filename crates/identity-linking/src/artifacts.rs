//! Provider-related credential artifacts.
//!
//! These plug into the generic engine through
//! [`Artifact`](identity_auth::Artifact). The link request and the
//! connection ticket are burned on first presentation.

use chrono::{DateTime, Utc};
use identity_auth::{Artifact, Binding, CodeBearing, UserId, VerifyOrder};
use identity_tokens::{
    kind, AccountAssociationSessionId, ProviderConnectionTicketId, ProviderLinkRequestId,
    SecretHash, VerificationCode,
};

use crate::oauth::{IdentityProvider, ProviderUserId};

/// Offer to attach a provider identity to the existing account that owns
/// the same email.
///
/// Issued code-less from the OAuth callback; a challenge replaces it with
/// a code-bearing one.
#[derive(Debug, Clone)]
pub struct AccountAssociationSession {
    /// Session ID
    pub id: AccountAssociationSessionId,
    /// Existing account
    pub user_id: UserId,
    /// Email the account had when the session was issued
    pub email: String,
    /// Provider to link
    pub provider: IdentityProvider,
    /// Identity at the provider
    pub provider_user_id: ProviderUserId,
    /// Emailed code, once challenged
    pub code: Option<VerificationCode>,
    /// Hash of the session secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for AccountAssociationSession {
    type Kind = kind::AccountAssociationSession;

    fn id(&self) -> &AccountAssociationSessionId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::OwnerEmail {
            user_id: self.user_id,
            email: &self.email,
        }
    }
}

impl CodeBearing for AccountAssociationSession {
    fn code(&self) -> Option<&VerificationCode> {
        self.code.as_ref()
    }
}

/// A signed-in user's request to link a specific provider.
#[derive(Debug, Clone)]
pub struct ProviderLinkRequest {
    /// Request ID
    pub id: ProviderLinkRequestId,
    /// Requesting user
    pub user_id: UserId,
    /// Provider the user asked to link
    pub provider: IdentityProvider,
    /// Hash of the request secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for ProviderLinkRequest {
    type Kind = kind::ProviderLinkRequest;

    const VERIFY_ORDER: VerifyOrder = VerifyOrder::DeleteThenVerify;

    fn id(&self) -> &ProviderLinkRequestId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::Owner(self.user_id)
    }
}

/// Short-lived ticket that authenticates a signed-in user across the
/// browser hop into a provider connection flow.
#[derive(Debug, Clone)]
pub struct ProviderConnectionTicket {
    /// Ticket ID
    pub id: ProviderConnectionTicketId,
    /// Ticket holder
    pub user_id: UserId,
    /// Hash of the ticket secret
    pub secret_hash: SecretHash,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

impl Artifact for ProviderConnectionTicket {
    type Kind = kind::ProviderConnectionTicket;

    const VERIFY_ORDER: VerifyOrder = VerifyOrder::DeleteThenVerify;

    fn id(&self) -> &ProviderConnectionTicketId {
        &self.id
    }

    fn secret_hash(&self) -> &SecretHash {
        &self.secret_hash
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn binding(&self) -> Binding<'_> {
        Binding::Owner(self.user_id)
    }
}
