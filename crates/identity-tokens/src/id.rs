//! Typed artifact identifiers
//!
//! Every artifact kind gets its own identifier type. [`ArtifactId`] is
//! parameterized by a zero-sized kind marker, so an id minted for a
//! password reset cannot be passed where a session id is expected.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::TokenError;
use crate::token::TOKEN_SEPARATOR;

/// Marker trait for artifact kinds.
pub trait ArtifactKind: Send + Sync + 'static {
    /// Stable name used in logs and error context.
    const NAME: &'static str;
}

/// Kind markers, one per artifact type.
pub mod kind {
    macro_rules! artifact_kinds {
        ($($(#[$meta:meta])* $name:ident => $label:literal),* $(,)?) => {
            $(
                $(#[$meta])*
                #[derive(Debug)]
                pub enum $name {}

                impl super::ArtifactKind for $name {
                    const NAME: &'static str = $label;
                }
            )*
        };
    }

    artifact_kinds! {
        /// Long-lived login session
        Session => "session",
        /// Pre-account signup verification
        SignupSession => "signup_session",
        /// Email verification for an existing user
        EmailVerificationRequest => "email_verification_request",
        /// Password reset
        PasswordResetSession => "password_reset_session",
        /// Linking an external identity to an existing account by email
        AccountAssociationSession => "account_association_session",
        /// Starting a provider link from an authenticated session
        ProviderLinkRequest => "provider_link_request",
        /// One-shot grant to use an already linked provider connection
        ProviderConnectionTicket => "provider_connection_ticket",
    }
}

/// Opaque identifier of an artifact of kind `K`.
///
/// Generated ids are UUIDv7 in simple (hyphen-free) form, so they sort by
/// creation time and never contain the token separator.
pub struct ArtifactId<K: ArtifactKind> {
    value: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ArtifactKind> ArtifactId<K> {
    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        Self::from_trusted(Uuid::now_v7().simple().to_string())
    }

    /// Parse an identifier received from storage or a client.
    pub fn parse(value: impl Into<String>) -> Result<Self, TokenError> {
        let value = value.into();
        if value.is_empty() || value.contains(TOKEN_SEPARATOR) {
            return Err(TokenError::Malformed);
        }
        Ok(Self::from_trusted(value))
    }

    pub(crate) fn from_trusted(value: String) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume into the raw identifier.
    pub fn into_inner(self) -> String {
        self.value
    }
}

impl<K: ArtifactKind> Clone for ArtifactId<K> {
    fn clone(&self) -> Self {
        Self::from_trusted(self.value.clone())
    }
}

impl<K: ArtifactKind> PartialEq for ArtifactId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K: ArtifactKind> Eq for ArtifactId<K> {}

impl<K: ArtifactKind> PartialOrd for ArtifactId<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: ArtifactKind> Ord for ArtifactId<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K: ArtifactKind> Hash for ArtifactId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K: ArtifactKind> fmt::Debug for ArtifactId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", K::NAME, self.value)
    }
}

impl<K: ArtifactKind> fmt::Display for ArtifactId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<K: ArtifactKind> Serialize for ArtifactId<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, K: ArtifactKind> Deserialize<'de> for ArtifactId<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(value).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a login session.
pub type SessionId = ArtifactId<kind::Session>;
/// Identifier of a signup session.
pub type SignupSessionId = ArtifactId<kind::SignupSession>;
/// Identifier of an email verification request.
pub type EmailVerificationRequestId = ArtifactId<kind::EmailVerificationRequest>;
/// Identifier of a password reset session.
pub type PasswordResetSessionId = ArtifactId<kind::PasswordResetSession>;
/// Identifier of an account association session.
pub type AccountAssociationSessionId = ArtifactId<kind::AccountAssociationSession>;
/// Identifier of a provider link request.
pub type ProviderLinkRequestId = ArtifactId<kind::ProviderLinkRequest>;
/// Identifier of a provider connection ticket.
pub type ProviderConnectionTicketId = ArtifactId<kind::ProviderConnectionTicket>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_dot_free() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().contains('.'));
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_generated_ids_sort_by_creation() {
        let first = SignupSessionId::generate();
        let second = SignupSessionId::generate();
        assert!(first < second);
    }

    #[test]
    fn test_parse_rejects_empty_and_separator() {
        assert_eq!(SessionId::parse(""), Err(TokenError::Malformed));
        assert_eq!(SessionId::parse("abc.def"), Err(TokenError::Malformed));
        assert_eq!(SessionId::parse("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_debug_includes_kind() {
        let id = PasswordResetSessionId::parse("xyz").unwrap();
        assert_eq!(format!("{id:?}"), "password_reset_session:xyz");
        assert_eq!(id.to_string(), "xyz");
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = ProviderLinkRequestId::parse("link1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"link1\"");

        let back: ProviderLinkRequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let bad: Result<ProviderLinkRequestId, _> = serde_json::from_str("\"a.b\"");
        assert!(bad.is_err());
    }
}
