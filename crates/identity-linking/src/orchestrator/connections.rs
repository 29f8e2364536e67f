//! Connection tickets and linked-provider management.

use identity_auth::User;
use identity_tokens::ProviderConnectionTicketToken;
use tracing::instrument;

use super::AccountLinkingOrchestrator;
use crate::account::ProviderAccount;
use crate::artifacts::ProviderConnectionTicket;
use crate::error::{LinkingError, LinkingResult};
use crate::oauth::IdentityProvider;

/// A freshly issued connection ticket.
#[derive(Debug, Clone)]
pub struct ConnectionTicketGrant {
    /// Stored ticket
    pub ticket: ProviderConnectionTicket,
    /// Token for the ticket
    pub token: ProviderConnectionTicketToken,
}

impl AccountLinkingOrchestrator {
    /// Issue a connection ticket for `user`, replacing older ones.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn issue_connection_ticket(&self, user: &User) -> LinkingResult<ConnectionTicketGrant> {
        self.tickets.revoke_owner(user.id).await?;

        let (ticket, token) = self
            .tickets
            .issue(self.lifetimes.ticket, |seed| ProviderConnectionTicket {
                id: seed.id,
                user_id: user.id,
                secret_hash: seed.secret_hash,
                expires_at: seed.expires_at,
            })
            .await?;

        Ok(ConnectionTicketGrant { ticket, token })
    }

    /// Redeem a ticket for its user. Any presentation burns the ticket.
    #[instrument(skip_all)]
    pub async fn redeem_connection_ticket(
        &self,
        token: &ProviderConnectionTicketToken,
    ) -> LinkingResult<User> {
        let (_, user) = self.tickets.validate(token).await?.into_bound()?;
        Ok(user)
    }

    /// Providers linked to `user`.
    pub async fn list_connections(&self, user: &User) -> LinkingResult<Vec<ProviderAccount>> {
        Ok(self.accounts.find_by_user(user.id).await?)
    }

    /// Remove the link to `provider`.
    ///
    /// Refused when it is the user's only way to sign in.
    #[instrument(skip_all, fields(user_id = %user.id, provider = %provider))]
    pub async fn unlink_provider(&self, user: &User, provider: IdentityProvider) -> LinkingResult<()> {
        let linked = self.accounts.find_by_user(user.id).await?;
        if !linked.iter().any(|a| a.provider == provider) {
            return Err(LinkingError::ProviderNotLinked);
        }
        if !user.has_password() && linked.len() <= 1 {
            return Err(LinkingError::LastLoginMethod);
        }

        if !self.accounts.delete(user.id, provider).await? {
            return Err(LinkingError::ProviderNotLinked);
        }
        tracing::info!("provider unlinked");
        Ok(())
    }
}
