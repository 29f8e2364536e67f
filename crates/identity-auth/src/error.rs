//! Error types for credential operations
//!
//! This module defines the errors raised while issuing, validating and
//! consuming ephemeral credentials, and the storage errors they wrap.

use thiserror::Error;

/// Storage port error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend failure (connection, serialization, ...)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A uniqueness constraint rejected the write
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// An update targeted a row that does not exist
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Backend(_) => "STORE_BACKEND_ERROR",
            StoreError::Conflict(_) => "STORE_CONFLICT",
            StoreError::NotFound(_) => "STORE_NOT_FOUND",
        }
    }
}

/// Why a credential was rejected as `INVALID`.
///
/// Collapsed into a single external code so callers cannot tell which
/// check failed; kept for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Token did not decode
    Malformed,
    /// No artifact with the token's id
    NotFound,
    /// Secret did not match the stored hash
    SecretMismatch,
    /// Bound owner no longer exists
    OwnerMissing,
    /// Owner's email changed since the artifact was issued
    BindingMismatch,
    /// Artifact belongs to a different user or provider than the caller
    WrongSubject,
}

impl InvalidReason {
    /// Stable name for structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed",
            InvalidReason::NotFound => "not_found",
            InvalidReason::SecretMismatch => "secret_mismatch",
            InvalidReason::OwnerMissing => "owner_missing",
            InvalidReason::BindingMismatch => "binding_mismatch",
            InvalidReason::WrongSubject => "wrong_subject",
        }
    }
}

/// Credential error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential is unknown, malformed, forged or no longer bound
    #[error("Invalid credential")]
    Invalid(InvalidReason),

    /// Credential was valid but has expired
    #[error("Credential has expired")]
    Expired,

    /// Verification code did not match
    #[error("Invalid verification code")]
    InvalidCode,

    /// Email/password login failed
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email already belongs to an account
    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    /// No account for the given email
    #[error("User not found")]
    UserNotFound,

    /// Step requires a previously verified email
    #[error("Email has not been verified")]
    EmailNotVerified,

    /// Email is already verified
    #[error("Email is already verified")]
    EmailAlreadyVerified,

    /// Email delivery failed
    #[error("Email delivery failed: {0}")]
    Delivery(String),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Reason behind an `INVALID` rejection, for logging.
    pub fn invalid_reason(&self) -> Option<InvalidReason> {
        match self {
            AuthError::Invalid(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Check if this error should be logged at error level.
    ///
    /// Rejections of bad or stale credentials are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Store(_)
                | AuthError::Delivery(_)
                | AuthError::ConfigError(_)
                | AuthError::Internal(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Invalid(_) | AuthError::Expired | AuthError::InvalidCredentials => 401,

            AuthError::InvalidCode | AuthError::EmailNotVerified => 400,
            AuthError::UserNotFound => 404,
            AuthError::EmailAlreadyRegistered | AuthError::EmailAlreadyVerified => 409,

            AuthError::Delivery(_) => 502,

            AuthError::Store(_) | AuthError::ConfigError(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Invalid(_) => "INVALID",
            AuthError::Expired => "EXPIRED",
            AuthError::InvalidCode => "INVALID_CODE",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthError::EmailAlreadyVerified => "EMAIL_ALREADY_VERIFIED",
            AuthError::Delivery(_) => "EMAIL_DELIVERY_FAILED",
            AuthError::Store(_) => "STORE_ERROR",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
