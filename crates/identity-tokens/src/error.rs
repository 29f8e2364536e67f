//! Error types for token, key and signed-state operations
//!
//! These errors are deliberately coarse. Callers map them onto
//! user-facing codes without learning which internal check failed.

use thiserror::Error;

/// Errors raised while decoding a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token is not of the form `<id>.<secret>` with both parts non-empty
    #[error("Malformed token")]
    Malformed,
}

impl TokenError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "TOKEN_MALFORMED",
        }
    }
}

/// Errors raised while constructing an HMAC key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key material is below the minimum accepted length
    #[error("HMAC key too short: got {actual} bytes, need at least {minimum}")]
    TooShort {
        /// Length of the rejected key
        actual: usize,
        /// Minimum accepted length
        minimum: usize,
    },

    /// The MAC implementation rejected the key
    #[error("HMAC key rejected: {0}")]
    Rejected(String),
}

/// Errors raised by the signed-state codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Shape, signature, schema or purpose check failed
    #[error("Invalid state")]
    Invalid,

    /// Signature was valid but the payload could not be decoded
    #[error("Failed to decode state payload")]
    DecodeFailed,

    /// Payload could not be encoded into a state string
    #[error("Failed to encode state payload: {0}")]
    EncodeFailed(String),
}

/// Result type for signed-state operations.
pub type StateResult<T> = Result<T, StateError>;

impl StateError {
    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, StateError::EncodeFailed(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StateError::Invalid | StateError::DecodeFailed => 400,
            StateError::EncodeFailed(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StateError::Invalid => "INVALID_STATE",
            StateError::DecodeFailed => "STATE_DECODE_FAILED",
            StateError::EncodeFailed(_) => "STATE_ENCODE_FAILED",
        }
    }
}
