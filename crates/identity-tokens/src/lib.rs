//! # Identity Tokens
//!
//! Cryptographic building blocks for the identity service's ephemeral
//! credentials.
//!
//! ## Overview
//!
//! The identity-tokens crate handles:
//! - **Typed ids**: [`ArtifactId`] parameterized by artifact kind
//! - **Bearer tokens**: the `<id>.<secret>` wire format
//! - **Secret hashing**: random secrets, one-way hashes, constant-time checks
//! - **Signed state**: HMAC-signed, purpose-tagged OAuth `state` values
//! - **Verification codes**: short numeric codes sent by email
//!
//! ## Usage
//!
//! ### Issuing and decoding a token
//!
//! ```rust
//! use identity_tokens::{SecretHasher, SessionId, SessionToken, Sha256SecretHasher};
//!
//! let hasher = Sha256SecretHasher;
//! let id = SessionId::generate();
//! let secret = hasher.generate_secret();
//! let stored_hash = hasher.hash(&secret);
//!
//! let token = SessionToken::encode(&id, &secret);
//! let (decoded_id, presented) = token.decode().unwrap();
//! assert_eq!(decoded_id, id);
//! assert!(hasher.verify(&presented, &stored_hash));
//! ```
//!
//! ### Signing OAuth state
//!
//! ```rust
//! use identity_tokens::{HmacKey, SignedStateCodec};
//! use serde_json::{json, Value};
//!
//! let codec = SignedStateCodec::new(HmacKey::new([0u8; 32]).unwrap());
//! let state = codec.sign("oauth", &json!({ "clientType": "web" })).unwrap();
//! let payload: Value = codec.verify(&state, "oauth").unwrap();
//! assert_eq!(payload["clientType"], "web");
//! ```
//!
//! ## Cross-Crate Integration
//!
//! This crate integrates with:
//! - `identity-auth`: artifact storage, validation and session lifecycle
//! - `identity-linking`: OAuth state for federated sign-in and provider linking

pub mod code;
pub mod error;
pub mod hasher;
pub mod id;
pub mod key;
pub mod state;
pub mod token;

pub use code::{generate_numeric_code, verify_code, VerificationCode, DEFAULT_CODE_LENGTH};
pub use error::{KeyError, StateError, StateResult, TokenError};
pub use hasher::{
    generate_secret, HmacSecretHasher, SecretHash, SecretHasher, Sha256SecretHasher, SECRET_BYTES,
};
pub use id::{
    kind, AccountAssociationSessionId, ArtifactId, ArtifactKind, EmailVerificationRequestId,
    PasswordResetSessionId, ProviderConnectionTicketId, ProviderLinkRequestId, SessionId,
    SignupSessionId,
};
pub use key::{constant_time_eq, constant_time_str_eq, HmacKey};
pub use state::{ScopedStateSigner, SignedStateCodec};
pub use token::{
    decode_token, encode_token, AccountAssociationToken, EmailVerificationToken,
    PasswordResetToken, ProviderConnectionTicketToken, ProviderLinkRequestToken, Secret,
    SessionToken, SignupSessionToken, Token, TOKEN_SEPARATOR,
};
