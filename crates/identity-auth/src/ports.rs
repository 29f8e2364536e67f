//! Outbound ports consumed by the credential flows.
//!
//! The concrete password-hashing algorithm and email transport live
//! outside this crate.

use async_trait::async_trait;

use crate::error::AuthResult;
use crate::user::PasswordHash;

/// Password hashing port.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password.
    async fn hash(&self, plaintext: &str) -> AuthResult<PasswordHash>;

    /// Check a plaintext password against a stored hash.
    async fn verify(&self, plaintext: &str, hash: &PasswordHash) -> AuthResult<bool>;
}

/// Outbound email port.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    /// Deliver a verification code to `address`.
    async fn send_verification_email(&self, address: &str, code: &str) -> AuthResult<()>;
}

#[cfg(feature = "memory")]
pub use memory::{MemoryEmailGateway, SentEmail};

#[cfg(feature = "memory")]
mod memory {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::RwLock;

    use super::EmailGateway;
    use crate::error::AuthResult;

    /// A message captured by [`MemoryEmailGateway`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        /// Recipient
        pub address: String,
        /// Verification code
        pub code: String,
    }

    /// Email gateway that records messages instead of sending them.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryEmailGateway {
        outbox: Arc<RwLock<Vec<SentEmail>>>,
    }

    impl MemoryEmailGateway {
        /// Create an empty outbox.
        pub fn new() -> Self {
            Self::default()
        }

        /// Every message sent so far, oldest first.
        pub async fn sent(&self) -> Vec<SentEmail> {
            self.outbox.read().await.clone()
        }

        /// The most recent code sent to `address`.
        pub async fn last_code_for(&self, address: &str) -> Option<String> {
            self.outbox
                .read()
                .await
                .iter()
                .rev()
                .find(|email| email.address == address)
                .map(|email| email.code.clone())
        }
    }

    #[async_trait]
    impl EmailGateway for MemoryEmailGateway {
        async fn send_verification_email(&self, address: &str, code: &str) -> AuthResult<()> {
            tracing::debug!(address = %address, "recording verification email");
            self.outbox.write().await.push(SentEmail {
                address: address.to_string(),
                code: code.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_gateway_records_messages() {
        let gateway = MemoryEmailGateway::new();
        gateway.send_verification_email("a@example.com", "11111111").await.unwrap();
        gateway.send_verification_email("b@example.com", "22222222").await.unwrap();
        gateway.send_verification_email("a@example.com", "33333333").await.unwrap();

        assert_eq!(gateway.sent().await.len(), 3);
        assert_eq!(
            gateway.last_code_for("a@example.com").await.as_deref(),
            Some("33333333")
        );
        assert!(gateway.last_code_for("c@example.com").await.is_none());
    }
}
