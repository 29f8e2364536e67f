//! Bearer token wire format
//!
//! A token is `<id>.<secret>`. The id locates the stored artifact and the
//! secret proves possession; only a hash of the secret is ever persisted.
//! Decoding splits on the first separator, so the secret part may itself
//! contain separators while the id part never does.

use std::fmt;
use std::marker::PhantomData;

use subtle::ConstantTimeEq;

use crate::error::TokenError;
use crate::id::{kind, ArtifactId, ArtifactKind};

/// Separator between the id and secret parts of a token.
pub const TOKEN_SEPARATOR: char = '.';

/// Plaintext secret half of a token.
///
/// The plaintext only lives long enough to be handed to the client or
/// hashed for comparison. `Debug` output is redacted.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wrap a plaintext secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Bearer token for an artifact of kind `K`.
pub struct Token<K: ArtifactKind> {
    value: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ArtifactKind> Token<K> {
    /// Encode an id and secret into a token.
    pub fn encode(id: &ArtifactId<K>, secret: &Secret) -> Self {
        Self::from_wire(format!(
            "{}{}{}",
            id.as_str(),
            TOKEN_SEPARATOR,
            secret.expose()
        ))
    }

    /// Wrap a token string received from a client. Nothing is checked
    /// until [`Token::decode`].
    pub fn from_wire(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _kind: PhantomData,
        }
    }

    /// Split the token into its id and secret.
    pub fn decode(&self) -> Result<(ArtifactId<K>, Secret), TokenError> {
        decode_token(&self.value)
    }

    /// Borrow the wire representation for transmission to the client.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume into the wire representation.
    pub fn into_string(self) -> String {
        self.value
    }
}

impl<K: ArtifactKind> Clone for Token<K> {
    fn clone(&self) -> Self {
        Self::from_wire(self.value.clone())
    }
}

impl<K: ArtifactKind> PartialEq for Token<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value.as_bytes().ct_eq(other.value.as_bytes()).into()
    }
}

impl<K: ArtifactKind> Eq for Token<K> {}

impl<K: ArtifactKind> fmt::Debug for Token<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token<{}>([REDACTED])", K::NAME)
    }
}

/// Encode an id and secret into a token.
pub fn encode_token<K: ArtifactKind>(id: &ArtifactId<K>, secret: &Secret) -> Token<K> {
    Token::encode(id, secret)
}

/// Decode a raw token string.
///
/// Fails unless the input contains a separator with at least one
/// character on each side of the first occurrence.
pub fn decode_token<K: ArtifactKind>(raw: &str) -> Result<(ArtifactId<K>, Secret), TokenError> {
    let dot = raw.find(TOKEN_SEPARATOR).ok_or(TokenError::Malformed)?;
    if dot == 0 || dot == raw.len() - TOKEN_SEPARATOR.len_utf8() {
        return Err(TokenError::Malformed);
    }

    let id = ArtifactId::from_trusted(raw[..dot].to_owned());
    let secret = Secret::new(&raw[dot + TOKEN_SEPARATOR.len_utf8()..]);
    Ok((id, secret))
}

/// Bearer token for a login session.
pub type SessionToken = Token<kind::Session>;
/// Bearer token for a signup session.
pub type SignupSessionToken = Token<kind::SignupSession>;
/// Bearer token for an email verification request.
pub type EmailVerificationToken = Token<kind::EmailVerificationRequest>;
/// Bearer token for a password reset session.
pub type PasswordResetToken = Token<kind::PasswordResetSession>;
/// Bearer token for an account association session.
pub type AccountAssociationToken = Token<kind::AccountAssociationSession>;
/// Bearer token for a provider link request.
pub type ProviderLinkRequestToken = Token<kind::ProviderLinkRequest>;
/// Bearer token for a provider connection ticket.
pub type ProviderConnectionTicketToken = Token<kind::ProviderConnectionTicket>;
