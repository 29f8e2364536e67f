//! HMAC-signed OAuth state
//!
//! The `state` parameter of an OAuth round trip carries the caller's
//! context (client type, flow, user) through the provider and back, so the
//! server needs no storage for in-flight authorizations.
//!
//! Wire format: `base64url(json).hex(hmac_sha256(base64url(json)))`, where
//! the JSON object is the caller's payload plus a `purpose` tag and a
//! random `nonce`. The purpose tag binds a state to one flow: a state
//! minted for provider linking never verifies as a federated sign-in state.

use std::fmt;
use std::marker::PhantomData;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StateError, StateResult};
use crate::hasher::generate_secret;
use crate::key::HmacKey;

/// JSON field holding the purpose tag.
pub const PURPOSE_FIELD: &str = "purpose";

/// JSON field holding the random nonce.
pub const NONCE_FIELD: &str = "nonce";

const STATE_SEPARATOR: char = '.';

/// Signs and verifies state strings with a shared HMAC key.
#[derive(Debug, Clone)]
pub struct SignedStateCodec {
    key: HmacKey,
}

impl SignedStateCodec {
    /// Create a codec using the given key.
    pub fn new(key: HmacKey) -> Self {
        Self { key }
    }

    /// Sign `payload` for `purpose`.
    ///
    /// The payload must serialize to a JSON object that does not already
    /// use the reserved `purpose` or `nonce` fields.
    pub fn sign<P: Serialize>(&self, purpose: &str, payload: &P) -> StateResult<String> {
        let mut object = match serde_json::to_value(payload) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(StateError::EncodeFailed(
                    "payload must serialize to a JSON object".to_string(),
                ))
            }
            Err(e) => return Err(StateError::EncodeFailed(e.to_string())),
        };

        if object.contains_key(PURPOSE_FIELD) || object.contains_key(NONCE_FIELD) {
            return Err(StateError::EncodeFailed(format!(
                "payload uses reserved field `{PURPOSE_FIELD}` or `{NONCE_FIELD}`"
            )));
        }

        object.insert(PURPOSE_FIELD.to_string(), Value::String(purpose.to_string()));
        object.insert(
            NONCE_FIELD.to_string(),
            Value::String(generate_secret().expose().to_string()),
        );

        let json = serde_json::to_vec(&Value::Object(object))
            .map_err(|e| StateError::EncodeFailed(e.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let signature = hex::encode(self.key.sign(encoded.as_bytes()));

        Ok(format!("{encoded}{STATE_SEPARATOR}{signature}"))
    }

    /// Verify `state` and recover the payload signed for `expected_purpose`.
    ///
    /// Checks run in a fixed order: shape, signature, decoding, schema,
    /// purpose. Decoding failures after a valid signature report
    /// [`StateError::DecodeFailed`]; every other failure is
    /// [`StateError::Invalid`].
    pub fn verify<P: DeserializeOwned>(&self, state: &str, expected_purpose: &str) -> StateResult<P> {
        let dot = state
            .find(STATE_SEPARATOR)
            .filter(|&dot| dot > 0 && dot < state.len() - STATE_SEPARATOR.len_utf8())
            .ok_or(StateError::Invalid)?;
        let encoded = &state[..dot];
        let signature = &state[dot + STATE_SEPARATOR.len_utf8()..];

        let signature = hex::decode(signature).map_err(|_| StateError::Invalid)?;
        if !self.key.verify(encoded.as_bytes(), &signature) {
            tracing::debug!("state signature mismatch");
            return Err(StateError::Invalid);
        }

        let json = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            tracing::warn!(error = %e, "signed state payload is not valid base64url");
            StateError::DecodeFailed
        })?;
        let value: Value = serde_json::from_slice(&json).map_err(|e| {
            tracing::warn!(error = %e, "signed state payload is not valid JSON");
            StateError::DecodeFailed
        })?;

        let Value::Object(mut object) = value else {
            return Err(StateError::Invalid);
        };
        let purpose = match object.remove(PURPOSE_FIELD) {
            Some(Value::String(purpose)) => purpose,
            _ => return Err(StateError::Invalid),
        };
        if !matches!(object.remove(NONCE_FIELD), Some(Value::String(_))) {
            return Err(StateError::Invalid);
        }

        let payload: P = serde_json::from_value(Value::Object(object)).map_err(|e| {
            tracing::debug!(error = %e, "signed state payload failed schema check");
            StateError::Invalid
        })?;

        if purpose != expected_purpose {
            tracing::debug!(
                purpose = %purpose,
                expected = %expected_purpose,
                "signed state purpose mismatch"
            );
            return Err(StateError::Invalid);
        }

        Ok(payload)
    }
}

/// A [`SignedStateCodec`] bound to one purpose and payload type.
pub struct ScopedStateSigner<P> {
    codec: SignedStateCodec,
    purpose: &'static str,
    _payload: PhantomData<fn() -> P>,
}

impl<P: Serialize + DeserializeOwned> ScopedStateSigner<P> {
    /// Bind `codec` to `purpose`.
    pub fn new(codec: SignedStateCodec, purpose: &'static str) -> Self {
        Self {
            codec,
            purpose,
            _payload: PhantomData,
        }
    }

    /// Purpose tag this signer writes and accepts.
    pub fn purpose(&self) -> &'static str {
        self.purpose
    }

    /// Sign a payload.
    pub fn sign(&self, payload: &P) -> StateResult<String> {
        self.codec.sign(self.purpose, payload)
    }

    /// Verify a state string and recover its payload.
    pub fn verify(&self, state: &str) -> StateResult<P> {
        self.codec.verify(state, self.purpose)
    }
}

impl<P> Clone for ScopedStateSigner<P> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            purpose: self.purpose,
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for ScopedStateSigner<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStateSigner")
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}
