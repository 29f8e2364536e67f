//! Completing an association offer.
//!
//! An offer is completed either with the code emailed by a challenge, or
//! without a code by its owner while signed in. Either way the offer is
//! consumed before linking, and the link is re-checked at commit.

use identity_auth::{AuthError, InvalidReason, SessionGrant, User};
use identity_tokens::{AccountAssociationToken, VerificationCode};
use tracing::instrument;

use super::AccountLinkingOrchestrator;
use crate::artifacts::AccountAssociationSession;
use crate::error::LinkingResult;

/// A validated association offer and its owner.
#[derive(Debug, Clone)]
pub struct AssociationOffer {
    /// Stored offer
    pub association: AccountAssociationSession,
    /// Existing account the provider would be linked to
    pub owner: User,
}

impl AccountLinkingOrchestrator {
    /// Validate an association token without consuming it.
    #[instrument(skip_all)]
    pub async fn validate_association(
        &self,
        token: &AccountAssociationToken,
    ) -> LinkingResult<AssociationOffer> {
        let (association, owner) = self.associations.validate(token).await?.into_bound()?;
        Ok(AssociationOffer { association, owner })
    }

    /// Replace the offer with a code-bearing one and email the code.
    ///
    /// The old token stops working; the returned one replaces it.
    #[instrument(skip_all)]
    pub async fn challenge_association(
        &self,
        token: &AccountAssociationToken,
    ) -> LinkingResult<(AccountAssociationSession, AccountAssociationToken)> {
        let AssociationOffer { association, owner } = self.validate_association(token).await?;

        self.associations.revoke_owner(owner.id).await?;

        let code = VerificationCode::generate(self.code_length);
        let (challenged, token) = self
            .associations
            .issue(self.lifetimes.association, |seed| AccountAssociationSession {
                id: seed.id,
                user_id: owner.id,
                email: owner.email.clone(),
                provider: association.provider,
                provider_user_id: association.provider_user_id,
                code: Some(code),
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        if let Some(code) = challenged.code.as_ref() {
            self.emails
                .send_verification_email(&challenged.email, code.expose())
                .await?;
        }

        tracing::info!(user_id = %owner.id, provider = %challenged.provider, "association challenged");
        Ok((challenged, token))
    }

    /// Complete an offer with its emailed code.
    ///
    /// A wrong code, or an offer that was never challenged, leaves the
    /// offer in place.
    #[instrument(skip_all)]
    pub async fn confirm_association(
        &self,
        token: &AccountAssociationToken,
        code: &str,
    ) -> LinkingResult<SessionGrant> {
        let offer = self.validate_association(token).await?;
        self.associations.check_code(&offer.association, code)?;
        self.complete_association(offer).await
    }

    /// Complete an offer for its owner, who is already signed in.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn complete_association_as_owner(
        &self,
        token: &AccountAssociationToken,
        user: &User,
    ) -> LinkingResult<SessionGrant> {
        let offer = self.validate_association(token).await?;
        if offer.owner.id != user.id {
            tracing::debug!(
                artifact_id = %offer.association.id,
                "association presented by another user"
            );
            return Err(AuthError::Invalid(InvalidReason::WrongSubject).into());
        }
        self.complete_association(offer).await
    }

    async fn complete_association(&self, offer: AssociationOffer) -> LinkingResult<SessionGrant> {
        let AssociationOffer {
            association,
            mut owner,
        } = offer;

        self.associations.consume(&association.id).await?;

        self.link_identity(
            owner.id,
            association.provider,
            &association.provider_user_id,
            None,
        )
        .await?;

        if !owner.email_verified {
            owner.email_verified = true;
            owner.updated_at = self.sessions.engine().now();
            owner = self.users().update(owner).await?;
        }

        Ok(self.sessions.grant(owner).await?)
    }
}
