//! Artifact persistence port
//!
//! One generic trait covers every artifact kind. Backends decide how rows
//! are laid out; the engine only relies on the operations below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use identity_tokens::ArtifactId;

use crate::artifact::Artifact;
use crate::error::StoreResult;
use crate::user::UserId;

/// Storage for artifacts of type `A`.
#[async_trait]
pub trait ArtifactStore<A: Artifact>: Send + Sync {
    /// Find an artifact by id.
    async fn find_by_id(&self, id: &ArtifactId<A::Kind>) -> StoreResult<Option<A>>;

    /// Insert or replace an artifact.
    async fn save(&self, artifact: &A) -> StoreResult<()>;

    /// Replace an artifact only if it is still stored. Returns whether it
    /// was. The check and the write must be atomic, so an artifact deleted
    /// concurrently is never written back.
    async fn update(&self, artifact: &A) -> StoreResult<bool>;

    /// Delete an artifact. Deleting a missing id is not an error.
    async fn delete_by_id(&self, id: &ArtifactId<A::Kind>) -> StoreResult<()>;

    /// Delete every artifact bound to `owner`, returning how many were removed.
    async fn delete_by_owner(&self, owner: UserId) -> StoreResult<u64>;

    /// Delete every artifact expired at `now`, returning how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[cfg(feature = "memory")]
pub use memory::MemoryArtifactStore;

#[cfg(feature = "memory")]
mod memory {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use dashmap::DashMap;
    use identity_tokens::ArtifactId;

    use super::ArtifactStore;
    use crate::artifact::Artifact;
    use crate::error::StoreResult;
    use crate::user::UserId;

    /// In-memory artifact store.
    ///
    /// This is suitable for single-process deployments and testing.
    pub struct MemoryArtifactStore<A: Artifact> {
        artifacts: Arc<DashMap<ArtifactId<A::Kind>, A>>,
    }

    impl<A: Artifact> MemoryArtifactStore<A> {
        /// Create an empty store.
        pub fn new() -> Self {
            Self {
                artifacts: Arc::new(DashMap::new()),
            }
        }

        /// Number of stored artifacts.
        pub fn len(&self) -> usize {
            self.artifacts.len()
        }

        /// Check if the store is empty.
        pub fn is_empty(&self) -> bool {
            self.artifacts.is_empty()
        }

        /// Check whether an artifact with `id` is stored.
        pub fn contains(&self, id: &ArtifactId<A::Kind>) -> bool {
            self.artifacts.contains_key(id)
        }

        /// Snapshot of every artifact bound to `owner`.
        pub fn owned_by(&self, owner: UserId) -> Vec<A> {
            self.artifacts
                .iter()
                .filter(|entry| entry.value().owner_id() == Some(owner))
                .map(|entry| entry.value().clone())
                .collect()
        }
    }

    impl<A: Artifact> Default for MemoryArtifactStore<A> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<A: Artifact> Clone for MemoryArtifactStore<A> {
        fn clone(&self) -> Self {
            Self {
                artifacts: Arc::clone(&self.artifacts),
            }
        }
    }

    #[async_trait]
    impl<A: Artifact> ArtifactStore<A> for MemoryArtifactStore<A> {
        async fn find_by_id(&self, id: &ArtifactId<A::Kind>) -> StoreResult<Option<A>> {
            Ok(self.artifacts.get(id).map(|r| r.value().clone()))
        }

        async fn save(&self, artifact: &A) -> StoreResult<()> {
            self.artifacts
                .insert(artifact.id().clone(), artifact.clone());
            Ok(())
        }

        async fn update(&self, artifact: &A) -> StoreResult<bool> {
            match self.artifacts.get_mut(artifact.id()) {
                Some(mut stored) => {
                    *stored = artifact.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_by_id(&self, id: &ArtifactId<A::Kind>) -> StoreResult<()> {
            self.artifacts.remove(id);
            Ok(())
        }

        async fn delete_by_owner(&self, owner: UserId) -> StoreResult<u64> {
            let mut removed = 0;
            self.artifacts.retain(|_, artifact| {
                let keep = artifact.owner_id() != Some(owner);
                if !keep {
                    removed += 1;
                }
                keep
            });
            Ok(removed)
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
            let mut removed = 0;
            self.artifacts.retain(|_, artifact| {
                let keep = !artifact.is_expired_at(now);
                if !keep {
                    removed += 1;
                }
                keep
            });
            Ok(removed)
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::artifact::Session;
    use chrono::Duration;
    use identity_tokens::{Secret, SecretHasher, SessionId, Sha256SecretHasher};

    fn session(user_id: UserId, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::generate(),
            user_id,
            secret_hash: Sha256SecretHasher.hash(&Secret::new("s")),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_save_find_delete() {
        let store = MemoryArtifactStore::<Session>::new();
        let s = session(UserId::new(), Utc::now());

        store.save(&s).await.unwrap();
        assert_eq!(store.find_by_id(&s.id).await.unwrap().unwrap().user_id, s.user_id);

        store.delete_by_id(&s.id).await.unwrap();
        assert!(store.find_by_id(&s.id).await.unwrap().is_none());

        // idempotent
        store.delete_by_id(&s.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_does_not_resurrect() {
        let store = MemoryArtifactStore::<Session>::new();
        let mut s = session(UserId::new(), Utc::now());

        assert!(!store.update(&s).await.unwrap());
        assert!(store.is_empty());

        store.save(&s).await.unwrap();
        s.expires_at += Duration::seconds(5);
        assert!(store.update(&s).await.unwrap());
        assert_eq!(
            store.find_by_id(&s.id).await.unwrap().unwrap().expires_at,
            s.expires_at
        );

        store.delete_by_owner(s.user_id).await.unwrap();
        assert!(!store.update(&s).await.unwrap());
        assert!(!store.contains(&s.id));
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let store = MemoryArtifactStore::<Session>::new();
        let alice = UserId::new();
        let bob = UserId::new();
        for owner in [alice, alice, bob] {
            store.save(&session(owner, Utc::now())).await.unwrap();
        }

        assert_eq!(store.delete_by_owner(alice).await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.owned_by(bob).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let store = MemoryArtifactStore::<Session>::new();
        let now = Utc::now();
        let owner = UserId::new();
        store.save(&session(owner, now - Duration::seconds(1))).await.unwrap();
        store.save(&session(owner, now)).await.unwrap();
        let live = session(owner, now + Duration::seconds(1));
        store.save(&live).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 2);
        assert!(store.contains(&live.id));
    }
}
