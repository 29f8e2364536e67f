//! Local user accounts and their storage port.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

/// User identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Mint a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque password hash produced by a [`crate::PasswordHasher`].
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an encoded hash.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Borrow the encoded hash.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// A local user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,

    /// Primary email address
    pub email: String,

    /// Whether the email address has been proven
    pub email_verified: bool,

    /// Display name
    pub name: Option<String>,

    /// Avatar URL
    pub icon_url: Option<String>,

    /// Password hash; absent for accounts created through a provider
    #[serde(skip)]
    pub password_hash: Option<PasswordHash>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an unverified, passwordless user.
    pub fn new(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            email_verified: false,
            name: None,
            icon_url: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: mark the email verified.
    pub fn verified(mut self) -> Self {
        self.email_verified = true;
        self
    }

    /// Builder: set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the avatar URL.
    pub fn with_icon_url(mut self, url: Option<String>) -> Self {
        self.icon_url = url;
        self
    }

    /// Builder: set the password hash.
    pub fn with_password_hash(mut self, hash: PasswordHash) -> Self {
        self.password_hash = Some(hash);
        self
    }

    /// Check if the user can sign in with a password.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// User persistence port.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Find a user by exact email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a new user. Fails with a conflict when the email is taken.
    async fn create(&self, user: User) -> StoreResult<User>;

    /// Replace an existing user.
    async fn update(&self, user: User) -> StoreResult<User>;

    /// Remove a user. Returns whether one existed.
    async fn delete(&self, id: UserId) -> StoreResult<bool>;
}

#[cfg(feature = "memory")]
pub use memory::MemoryUserStore;

#[cfg(feature = "memory")]
mod memory {
    use std::sync::Arc;

    use async_trait::async_trait;
    use dashmap::mapref::entry::Entry;
    use dashmap::DashMap;

    use super::{User, UserId, UserStore};
    use crate::error::{StoreError, StoreResult};

    /// In-memory user store.
    ///
    /// Email uniqueness is enforced through the email index entry, so two
    /// concurrent creates for one address cannot both succeed.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryUserStore {
        users: Arc<DashMap<UserId, User>>,
        by_email: Arc<DashMap<String, UserId>>,
    }

    impl MemoryUserStore {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored users.
        pub fn len(&self) -> usize {
            self.users.len()
        }

        /// Check if the store is empty.
        pub fn is_empty(&self) -> bool {
            self.users.is_empty()
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
            Ok(self.users.get(&id).map(|r| r.value().clone()))
        }

        async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            Ok(self
                .by_email
                .get(email)
                .and_then(|id| self.users.get(id.value()).map(|r| r.value().clone())))
        }

        async fn create(&self, user: User) -> StoreResult<User> {
            match self.by_email.entry(user.email.clone()) {
                Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                    "email already registered: {}",
                    user.email
                ))),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                    self.users.insert(user.id, user.clone());
                    Ok(user)
                }
            }
        }

        async fn update(&self, user: User) -> StoreResult<User> {
            let previous_email = self
                .users
                .get(&user.id)
                .map(|r| r.value().email.clone())
                .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;

            if previous_email != user.email {
                match self.by_email.entry(user.email.clone()) {
                    Entry::Occupied(slot) if *slot.get() != user.id => {
                        return Err(StoreError::Conflict(format!(
                            "email already registered: {}",
                            user.email
                        )));
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(slot) => {
                        slot.insert(user.id);
                    }
                }
                self.by_email.remove(&previous_email);
            }

            self.users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn delete(&self, id: UserId) -> StoreResult<bool> {
            let Some((_, user)) = self.users.remove(&id) else {
                return Ok(false);
            };
            self.by_email.remove_if(&user.email, |_, owner| *owner == id);
            Ok(true)
        }
    }
}
