//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::clock::{Clock, MockClock};
use crate::config::AuthConfig;
use crate::engine::ArtifactEngine;
use crate::error::AuthResult;
use crate::ports::{MemoryEmailGateway, PasswordHasher};
use crate::session::SessionLifecycle;
use crate::store::MemoryArtifactStore;
use crate::user::{MemoryUserStore, PasswordHash, User, UserStore};
use identity_tokens::Sha256SecretHasher;

/// Reversible stand-in for a real password hasher.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PlainPasswordHasher;

#[async_trait]
impl PasswordHasher for PlainPasswordHasher {
    async fn hash(&self, plaintext: &str) -> AuthResult<PasswordHash> {
        Ok(PasswordHash::new(format!("plain${plaintext}")))
    }

    async fn verify(&self, plaintext: &str, hash: &PasswordHash) -> AuthResult<bool> {
        Ok(hash.as_str() == format!("plain${plaintext}"))
    }
}

pub(crate) struct TestContext {
    pub users: MemoryUserStore,
    pub clock: MockClock,
    pub emails: MemoryEmailGateway,
    pub config: AuthConfig,
    pub sessions_store: MemoryArtifactStore<crate::artifact::Session>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            users: MemoryUserStore::new(),
            clock: MockClock::default(),
            emails: MemoryEmailGateway::new(),
            config: AuthConfig::default(),
            sessions_store: MemoryArtifactStore::new(),
        }
    }

    pub fn engine<A: Artifact>(&self, store: &MemoryArtifactStore<A>) -> ArtifactEngine<A> {
        ArtifactEngine::new(
            Arc::new(store.clone()),
            Arc::new(self.users.clone()),
            Arc::new(Sha256SecretHasher),
            Arc::new(self.clock.clone()),
        )
    }

    pub fn sessions(&self) -> SessionLifecycle {
        SessionLifecycle::new(self.engine(&self.sessions_store), &self.config)
    }

    pub async fn user_with_password(&self, email: &str, password: &str) -> User {
        let hash = PlainPasswordHasher.hash(password).await.unwrap();
        self.users
            .create(
                User::new(email, self.clock.now())
                    .verified()
                    .with_password_hash(hash),
            )
            .await
            .unwrap()
    }
}
