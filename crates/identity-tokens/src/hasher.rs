//! Secret generation, hashing and verification
//!
//! Secrets are 256 bits from the thread-local CSPRNG, encoded as unpadded
//! URL-safe base64 so they survive query strings and headers untouched.
//! Stores keep only the [`SecretHash`]; comparison is constant-time.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::key::{constant_time_eq, HmacKey};
use crate::token::Secret;

/// Entropy of a generated secret in bytes.
pub const SECRET_BYTES: usize = 32;

/// Stored hash of a token secret.
#[derive(Clone)]
pub struct SecretHash(Vec<u8>);

impl SecretHash {
    /// Wrap hash bytes loaded from storage.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the raw hash bytes for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Compare against another hash in constant time.
    pub fn matches(&self, other: &SecretHash) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretHash([REDACTED; {} bytes])", self.0.len())
    }
}

/// Generate a fresh random secret.
pub fn generate_secret() -> Secret {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    Secret::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Produces secrets and one-way hashes of them.
///
/// Implementations must be deterministic: hashing the same secret twice
/// yields equal hashes.
pub trait SecretHasher: Send + Sync {
    /// Generate a new random secret.
    fn generate_secret(&self) -> Secret {
        generate_secret()
    }

    /// Hash a secret for storage.
    fn hash(&self, secret: &Secret) -> SecretHash;

    /// Check a presented secret against a stored hash in constant time.
    fn verify(&self, secret: &Secret, stored: &SecretHash) -> bool {
        self.hash(secret).matches(stored)
    }
}

/// Plain SHA-256 hasher.
///
/// Adequate because secrets carry 256 bits of entropy; there is nothing
/// to brute-force.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256SecretHasher;

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &Secret) -> SecretHash {
        SecretHash(Sha256::digest(secret.expose().as_bytes()).to_vec())
    }
}

/// Keyed HMAC-SHA256 hasher.
///
/// A leaked artifact table is useless without the server-side key.
#[derive(Debug, Clone)]
pub struct HmacSecretHasher {
    key: HmacKey,
}

impl HmacSecretHasher {
    /// Create a hasher using the given key.
    pub fn new(key: HmacKey) -> Self {
        Self { key }
    }
}

impl SecretHasher for HmacSecretHasher {
    fn hash(&self, secret: &Secret) -> SecretHash {
        SecretHash(self.key.sign(secret.expose().as_bytes()).to_vec())
    }
}

impl<T: SecretHasher + ?Sized> SecretHasher for std::sync::Arc<T> {
    fn generate_secret(&self) -> Secret {
        (**self).generate_secret()
    }

    fn hash(&self, secret: &Secret) -> SecretHash {
        (**self).hash(secret)
    }

    fn verify(&self, secret: &Secret, stored: &SecretHash) -> bool {
        (**self).verify(secret, stored)
    }
}
