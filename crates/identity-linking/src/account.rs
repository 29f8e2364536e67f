//! Provider accounts
//!
//! A provider account links one identity at one provider to one local
//! user. Two uniqueness keys hold at all times:
//!
//! - `(provider, provider_user_id)`: an identity belongs to one user
//! - `(user_id, provider)`: a user links at most one identity per provider
//!
//! Stores enforce both on [`ProviderAccountStore::save`]; the orchestrator
//! relies on that when two completions race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use identity_auth::{StoreResult, UserId};
use serde::{Deserialize, Serialize};

use crate::oauth::{IdentityProvider, ProviderUserId};

/// A provider identity linked to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Provider
    pub provider: IdentityProvider,
    /// Identity at the provider
    pub provider_user_id: ProviderUserId,
    /// Local user
    pub user_id: UserId,
    /// When the link was created
    pub linked_at: DateTime<Utc>,
}

impl ProviderAccount {
    /// Create a link.
    pub fn new(
        provider: IdentityProvider,
        provider_user_id: ProviderUserId,
        user_id: UserId,
        linked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            provider,
            provider_user_id,
            user_id,
            linked_at,
        }
    }
}

/// Provider account storage port.
#[async_trait]
pub trait ProviderAccountStore: Send + Sync {
    /// Find the account for a provider identity.
    async fn find_by_provider_user(
        &self,
        provider: IdentityProvider,
        provider_user_id: &ProviderUserId,
    ) -> StoreResult<Option<ProviderAccount>>;

    /// Find the account a user has at `provider`.
    async fn find_by_user_and_provider(
        &self,
        user_id: UserId,
        provider: IdentityProvider,
    ) -> StoreResult<Option<ProviderAccount>>;

    /// Every account of a user.
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<ProviderAccount>>;

    /// Insert a link. Fails with `Conflict` if either uniqueness key is taken.
    async fn save(&self, account: &ProviderAccount) -> StoreResult<()>;

    /// Remove the user's link at `provider`. Returns whether one existed.
    async fn delete(&self, user_id: UserId, provider: IdentityProvider) -> StoreResult<bool>;
}

#[cfg(feature = "memory")]
pub use memory::MemoryProviderAccountStore;

#[cfg(feature = "memory")]
mod memory {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use identity_auth::{StoreError, StoreResult, UserId};
    use tokio::sync::RwLock;

    use super::{ProviderAccount, ProviderAccountStore};
    use crate::oauth::{IdentityProvider, ProviderUserId};

    type IdentityKey = (IdentityProvider, ProviderUserId);

    /// In-memory provider account store.
    ///
    /// Both uniqueness checks and the insert happen under one write lock.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryProviderAccountStore {
        accounts: Arc<RwLock<HashMap<IdentityKey, ProviderAccount>>>,
    }

    impl MemoryProviderAccountStore {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored links.
        pub async fn len(&self) -> usize {
            self.accounts.read().await.len()
        }

        /// Whether the store is empty.
        pub async fn is_empty(&self) -> bool {
            self.accounts.read().await.is_empty()
        }
    }

    #[async_trait]
    impl ProviderAccountStore for MemoryProviderAccountStore {
        async fn find_by_provider_user(
            &self,
            provider: IdentityProvider,
            provider_user_id: &ProviderUserId,
        ) -> StoreResult<Option<ProviderAccount>> {
            let accounts = self.accounts.read().await;
            Ok(accounts
                .get(&(provider, provider_user_id.clone()))
                .cloned())
        }

        async fn find_by_user_and_provider(
            &self,
            user_id: UserId,
            provider: IdentityProvider,
        ) -> StoreResult<Option<ProviderAccount>> {
            let accounts = self.accounts.read().await;
            Ok(accounts
                .values()
                .find(|a| a.user_id == user_id && a.provider == provider)
                .cloned())
        }

        async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<ProviderAccount>> {
            let accounts = self.accounts.read().await;
            let mut found: Vec<_> = accounts
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect();
            found.sort_by_key(|a| a.provider);
            Ok(found)
        }

        async fn save(&self, account: &ProviderAccount) -> StoreResult<()> {
            let mut accounts = self.accounts.write().await;

            let key = (account.provider, account.provider_user_id.clone());
            if accounts.contains_key(&key) {
                return Err(StoreError::Conflict(format!(
                    "{} identity {} is already linked",
                    account.provider, account.provider_user_id
                )));
            }
            if accounts
                .values()
                .any(|a| a.user_id == account.user_id && a.provider == account.provider)
            {
                return Err(StoreError::Conflict(format!(
                    "user {} already has a {} account",
                    account.user_id, account.provider
                )));
            }

            accounts.insert(key, account.clone());
            Ok(())
        }

        async fn delete(&self, user_id: UserId, provider: IdentityProvider) -> StoreResult<bool> {
            let mut accounts = self.accounts.write().await;
            let before = accounts.len();
            accounts.retain(|_, a| !(a.user_id == user_id && a.provider == provider));
            Ok(accounts.len() < before)
        }
    }
}
