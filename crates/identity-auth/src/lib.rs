//! # Identity Auth
//!
//! Ephemeral credential engine for the identity service.
//!
//! ## Overview
//!
//! The identity-auth crate handles:
//! - **Artifacts**: the stored half of every short-lived credential
//! - **Validation**: one decode/lookup/verify/expiry/binding algorithm for all kinds
//! - **Sessions**: sliding expiration with id rotation
//! - **Flows**: password login, signup, email verification, password reset
//!
//! ## Features
//!
//! - `memory` (default): in-memory stores and a recording email gateway
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use identity_auth::{
//!     ArtifactEngine, AuthConfig, MemoryArtifactStore, MemoryUserStore, Session,
//!     SessionLifecycle, SystemClock, User, UserStore,
//! };
//! use identity_tokens::Sha256SecretHasher;
//!
//! # async fn example() -> identity_auth::AuthResult<()> {
//! let users = Arc::new(MemoryUserStore::new());
//! let engine = ArtifactEngine::new(
//!     Arc::new(MemoryArtifactStore::<Session>::new()),
//!     users.clone(),
//!     Arc::new(Sha256SecretHasher),
//!     Arc::new(SystemClock),
//! );
//! let sessions = SessionLifecycle::new(engine, &AuthConfig::from_env());
//!
//! let user = users.create(User::new("a@example.com", chrono::Utc::now())).await?;
//! let grant = sessions.grant(user).await?;
//!
//! let validated = sessions.validate(&grant.token).await?;
//! if let Some(rotated) = validated.refreshed {
//!     // hand the rotated token back to the client
//!     let _ = rotated;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cross-Crate Integration
//!
//! This crate integrates with:
//! - `identity-tokens`: ids, tokens, secret hashing and codes
//! - `identity-linking`: provider artifacts and the account-linking orchestrator

pub mod artifact;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod ports;
pub mod session;
pub mod store;
pub mod user;

#[cfg(all(test, feature = "memory"))]
mod testing;

pub use artifact::{
    Artifact, ArtifactSeed, Binding, CodeBearing, EmailVerificationRequest, PasswordResetSession,
    Session, SignupSession, VerifyOrder,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::AuthConfig;
pub use engine::{ArtifactEngine, Validated};
pub use error::{AuthError, AuthResult, InvalidReason, StoreError, StoreResult};
pub use flows::{EmailVerificationFlow, PasswordLogin, PasswordResetFlow, SignupFlow};
pub use ports::{EmailGateway, PasswordHasher};
pub use session::{SessionGrant, SessionLifecycle, ValidatedSession};
pub use store::ArtifactStore;
pub use user::{PasswordHash, User, UserId, UserStore};

#[cfg(feature = "memory")]
pub use ports::{MemoryEmailGateway, SentEmail};
#[cfg(feature = "memory")]
pub use store::MemoryArtifactStore;
#[cfg(feature = "memory")]
pub use user::MemoryUserStore;
