//! Error types for OAuth sign-in and account linking

use identity_auth::{AuthError, StoreError};
use identity_tokens::StateError;
use thiserror::Error;
use url::Url;

use crate::oauth::IdentityProvider;

/// OAuth provider gateway errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Provider rejected the code or the exchange request failed
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// User info request failed or returned an unusable identity
    #[error("Identity fetch failed: {0}")]
    IdentityFetch(String),

    /// Revocation request failed
    #[error("Token revocation failed: {0}")]
    Revocation(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Account linking error types.
///
/// Errors raised after the client redirect has been validated carry it, so
/// the caller can send the user agent back to the client with the code.
#[derive(Debug, Error)]
pub enum LinkingError {
    /// Credential or storage error from the engine
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// OAuth state failed verification
    #[error(transparent)]
    State(#[from] StateError),

    /// Client redirect is not under the client's base
    #[error("Invalid redirect URI")]
    InvalidRedirectUri,

    /// No gateway is registered for the provider
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(IdentityProvider),

    /// User declined at the provider
    #[error("Provider access denied")]
    ProviderAccessDenied {
        /// Validated client redirect
        redirect_url: Url,
    },

    /// Provider reported an error on callback
    #[error("Provider error: {error}")]
    ProviderError {
        /// Error string reported by the provider
        error: String,
        /// Validated client redirect
        redirect_url: Url,
    },

    /// Callback had no code or the exchange failed
    #[error("Token exchange failed")]
    TokenExchangeFailed {
        /// Validated client redirect
        redirect_url: Url,
    },

    /// Identity could not be fetched from the provider
    #[error("Identity fetch failed")]
    IdentityFetchFailed {
        /// Validated client redirect
        redirect_url: Url,
    },

    /// The user already has an account at this provider linked
    #[error("Provider is already linked")]
    ProviderAlreadyLinked {
        /// Validated client redirect, when raised from a callback
        redirect_url: Option<Url>,
    },

    /// The provider identity is linked to another user
    #[error("Provider account is linked to another user")]
    AccountLinkedElsewhere {
        /// Validated client redirect, when raised from a callback
        redirect_url: Option<Url>,
    },

    /// Signup-only flow for a provider identity that already has an account
    #[error("Account is already registered")]
    AccountAlreadyRegistered {
        /// Validated client redirect
        redirect_url: Url,
    },

    /// Login-only flow for a provider identity without an account
    #[error("Account not found")]
    AccountNotFound {
        /// Validated client redirect
        redirect_url: Url,
    },

    /// Unlink for a provider the user has not linked
    #[error("Provider is not linked")]
    ProviderNotLinked,

    /// Unlink would leave the user without any way to sign in
    #[error("Cannot remove the last login method")]
    LastLoginMethod,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for linking operations.
pub type LinkingResult<T> = Result<T, LinkingError>;

impl From<StoreError> for LinkingError {
    fn from(err: StoreError) -> Self {
        LinkingError::Auth(AuthError::Store(err))
    }
}

impl LinkingError {
    /// Validated client redirect carried by the error, if any.
    pub fn redirect_url(&self) -> Option<&Url> {
        match self {
            LinkingError::ProviderAccessDenied { redirect_url }
            | LinkingError::ProviderError { redirect_url, .. }
            | LinkingError::TokenExchangeFailed { redirect_url }
            | LinkingError::IdentityFetchFailed { redirect_url }
            | LinkingError::AccountAlreadyRegistered { redirect_url }
            | LinkingError::AccountNotFound { redirect_url } => Some(redirect_url),
            LinkingError::ProviderAlreadyLinked { redirect_url }
            | LinkingError::AccountLinkedElsewhere { redirect_url } => redirect_url.as_ref(),
            _ => None,
        }
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        match self {
            LinkingError::Auth(e) => e.is_server_error(),
            LinkingError::State(e) => e.is_server_error(),
            LinkingError::ConfigError(_) => true,
            _ => false,
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            LinkingError::Auth(e) => e.status_code(),
            LinkingError::State(e) => e.status_code(),

            LinkingError::InvalidRedirectUri | LinkingError::UnsupportedProvider(_) => 400,

            LinkingError::ProviderAccessDenied { .. } => 403,
            LinkingError::ProviderError { .. }
            | LinkingError::TokenExchangeFailed { .. }
            | LinkingError::IdentityFetchFailed { .. } => 502,

            LinkingError::ProviderAlreadyLinked { .. }
            | LinkingError::AccountLinkedElsewhere { .. }
            | LinkingError::AccountAlreadyRegistered { .. } => 409,

            LinkingError::AccountNotFound { .. } | LinkingError::ProviderNotLinked => 404,
            LinkingError::LastLoginMethod => 422,

            LinkingError::ConfigError(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LinkingError::Auth(e) => e.error_code(),
            LinkingError::State(e) => e.error_code(),
            LinkingError::InvalidRedirectUri => "INVALID_REDIRECT_URI",
            LinkingError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            LinkingError::ProviderAccessDenied { .. } => "PROVIDER_ACCESS_DENIED",
            LinkingError::ProviderError { .. } => "PROVIDER_ERROR",
            LinkingError::TokenExchangeFailed { .. } => "TOKEN_EXCHANGE_FAILED",
            LinkingError::IdentityFetchFailed { .. } => "IDENTITY_FETCH_FAILED",
            LinkingError::ProviderAlreadyLinked { .. } => "PROVIDER_ALREADY_LINKED",
            LinkingError::AccountLinkedElsewhere { .. } => "ACCOUNT_LINKED_ELSEWHERE",
            LinkingError::AccountAlreadyRegistered { .. } => "ACCOUNT_ALREADY_REGISTERED",
            LinkingError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LinkingError::ProviderNotLinked => "PROVIDER_NOT_LINKED",
            LinkingError::LastLoginMethod => "LAST_LOGIN_METHOD",
            LinkingError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect() -> Url {
        Url::parse("https://app.example.com/done").unwrap()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LinkingError::ProviderAccessDenied {
                redirect_url: redirect()
            }
            .error_code(),
            "PROVIDER_ACCESS_DENIED"
        );
        assert_eq!(
            LinkingError::AccountLinkedElsewhere { redirect_url: None }.error_code(),
            "ACCOUNT_LINKED_ELSEWHERE"
        );
        assert_eq!(
            LinkingError::UnsupportedProvider(IdentityProvider::Slack).to_string(),
            "Unsupported provider: slack"
        );
    }

    #[test]
    fn test_wrapped_errors_keep_their_codes() {
        let err: LinkingError = AuthError::Expired.into();
        assert_eq!(err.error_code(), "EXPIRED");
        assert_eq!(err.status_code(), 401);

        let err: LinkingError = StateError::Invalid.into();
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(!err.is_server_error());

        let err: LinkingError = StoreError::Backend("down".to_string()).into();
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_redirect_url_is_exposed() {
        let err = LinkingError::TokenExchangeFailed {
            redirect_url: redirect(),
        };
        assert_eq!(err.redirect_url(), Some(&redirect()));
        assert_eq!(
            LinkingError::ProviderAlreadyLinked { redirect_url: None }.redirect_url(),
            None
        );
        assert_eq!(LinkingError::InvalidRedirectUri.redirect_url(), None);
    }
}
