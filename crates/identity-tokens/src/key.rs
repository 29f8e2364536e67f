//! HMAC-SHA256 keys and constant-time comparison helpers
//!
//! [`HmacKey`] validates key material once at construction and keeps a
//! prepared MAC instance that is cloned per operation.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::KeyError;

type HmacSha256 = Hmac<Sha256>;

/// Output length of HMAC-SHA256 in bytes.
pub const SIGNATURE_LENGTH: usize = 32;

/// A validated HMAC-SHA256 key.
#[derive(Clone)]
pub struct HmacKey {
    mac: HmacSha256,
}

impl HmacKey {
    /// Minimum key length in bytes.
    pub const MIN_KEY_LENGTH: usize = 32;

    /// Create a key from raw material.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::TooShort`] when the material is shorter than
    /// [`HmacKey::MIN_KEY_LENGTH`].
    pub fn new(material: impl AsRef<[u8]>) -> Result<Self, KeyError> {
        let material = material.as_ref();
        if material.len() < Self::MIN_KEY_LENGTH {
            return Err(KeyError::TooShort {
                actual: material.len(),
                minimum: Self::MIN_KEY_LENGTH,
            });
        }

        let mac = HmacSha256::new_from_slice(material)
            .map_err(|e| KeyError::Rejected(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Generate a random key. Intended for development and tests.
    pub fn generate() -> Self {
        // One full SHA-256 block of key material.
        let mut material = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut material);
        Self {
            mac: HmacSha256::new(&material.into()),
        }
    }

    /// Compute the MAC of `data`.
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    /// Verify a MAC in constant time.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(signature).is_ok()
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacKey([REDACTED])")
    }
}

/// Compare two byte slices in constant time.
///
/// Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compare two strings in constant time.
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> HmacKey {
        HmacKey::new([7u8; 32]).unwrap()
    }

    #[test]
    fn test_key_too_short() {
        let err = HmacKey::new(b"short").unwrap_err();
        assert_eq!(
            err,
            KeyError::TooShort {
                actual: 5,
                minimum: 32
            }
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let key = test_key();
        let signature = key.sign(b"payload");
        assert!(key.verify(b"payload", &signature));
        assert!(!key.verify(b"payload2", &signature));
        assert!(!key.verify(b"payload", &signature[..16]));
    }

    #[test]
    fn test_signature_depends_on_key() {
        let other = HmacKey::new([8u8; 32]).unwrap();
        let signature = test_key().sign(b"payload");
        assert!(!other.verify(b"payload", &signature));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = HmacKey::generate();
        let b = HmacKey::generate();
        assert_ne!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_str_eq("", ""));
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", test_key()), "HmacKey([REDACTED])");
    }
}
