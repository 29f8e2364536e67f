//! Credential lifetimes and code settings.
//!
//! Loaded from environment variables with defaults matching the product's
//! credential policy.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Lifetimes of every artifact kind, in seconds, plus the code length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login session lifetime (default: 30 days).
    pub session_ttl_secs: u64,

    /// Trailing part of a session's life during which a successful
    /// validation rotates it (default: 15 days).
    pub session_refresh_window_secs: u64,

    /// Signup session lifetime (default: 10 minutes).
    pub signup_session_ttl_secs: u64,

    /// Email verification request lifetime (default: 10 minutes).
    pub email_verification_ttl_secs: u64,

    /// Password reset session lifetime (default: 10 minutes).
    pub password_reset_ttl_secs: u64,

    /// Account association session lifetime (default: 10 minutes).
    pub account_association_ttl_secs: u64,

    /// Provider link request lifetime (default: 3 minutes).
    pub provider_link_ttl_secs: u64,

    /// Provider connection ticket lifetime (default: 3 minutes).
    pub connection_ticket_ttl_secs: u64,

    /// Digits in emailed verification codes.
    pub code_length: usize,
}

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * DAY,
            session_refresh_window_secs: 15 * DAY,
            signup_session_ttl_secs: 10 * MINUTE,
            email_verification_ttl_secs: 10 * MINUTE,
            password_reset_ttl_secs: 10 * MINUTE,
            account_association_ttl_secs: 10 * MINUTE,
            provider_link_ttl_secs: 3 * MINUTE,
            connection_ticket_ttl_secs: 3 * MINUTE,
            code_length: identity_tokens::DEFAULT_CODE_LENGTH,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SESSION_TTL_SECS` (default: 2592000)
    /// - `SESSION_REFRESH_WINDOW_SECS` (default: 1296000)
    /// - `SIGNUP_SESSION_TTL_SECS` (default: 600)
    /// - `EMAIL_VERIFICATION_TTL_SECS` (default: 600)
    /// - `PASSWORD_RESET_TTL_SECS` (default: 600)
    /// - `ACCOUNT_ASSOCIATION_TTL_SECS` (default: 600)
    /// - `PROVIDER_LINK_TTL_SECS` (default: 180)
    /// - `CONNECTION_TICKET_TTL_SECS` (default: 180)
    /// - `VERIFICATION_CODE_LENGTH` (default: 8)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            session_ttl_secs: env_or("SESSION_TTL_SECS", default.session_ttl_secs),
            session_refresh_window_secs: env_or(
                "SESSION_REFRESH_WINDOW_SECS",
                default.session_refresh_window_secs,
            ),
            signup_session_ttl_secs: env_or(
                "SIGNUP_SESSION_TTL_SECS",
                default.signup_session_ttl_secs,
            ),
            email_verification_ttl_secs: env_or(
                "EMAIL_VERIFICATION_TTL_SECS",
                default.email_verification_ttl_secs,
            ),
            password_reset_ttl_secs: env_or(
                "PASSWORD_RESET_TTL_SECS",
                default.password_reset_ttl_secs,
            ),
            account_association_ttl_secs: env_or(
                "ACCOUNT_ASSOCIATION_TTL_SECS",
                default.account_association_ttl_secs,
            ),
            provider_link_ttl_secs: env_or("PROVIDER_LINK_TTL_SECS", default.provider_link_ttl_secs),
            connection_ticket_ttl_secs: env_or(
                "CONNECTION_TICKET_TTL_SECS",
                default.connection_ticket_ttl_secs,
            ),
            code_length: env_or("VERIFICATION_CODE_LENGTH", default.code_length),
        }
    }

    /// Builder: set the session lifetime and refresh window.
    pub fn with_session_ttl(mut self, ttl_secs: u64, refresh_window_secs: u64) -> Self {
        self.session_ttl_secs = ttl_secs;
        self.session_refresh_window_secs = refresh_window_secs;
        self
    }

    /// Builder: set the verification code length.
    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self
    }

    /// Session lifetime.
    pub fn session_ttl(&self) -> Duration {
        secs(self.session_ttl_secs)
    }

    /// Session refresh window.
    pub fn session_refresh_window(&self) -> Duration {
        secs(self.session_refresh_window_secs)
    }

    /// Signup session lifetime.
    pub fn signup_session_ttl(&self) -> Duration {
        secs(self.signup_session_ttl_secs)
    }

    /// Email verification request lifetime.
    pub fn email_verification_ttl(&self) -> Duration {
        secs(self.email_verification_ttl_secs)
    }

    /// Password reset session lifetime.
    pub fn password_reset_ttl(&self) -> Duration {
        secs(self.password_reset_ttl_secs)
    }

    /// Account association session lifetime.
    pub fn account_association_ttl(&self) -> Duration {
        secs(self.account_association_ttl_secs)
    }

    /// Provider link request lifetime.
    pub fn provider_link_ttl(&self) -> Duration {
        secs(self.provider_link_ttl_secs)
    }

    /// Provider connection ticket lifetime.
    pub fn connection_ticket_ttl(&self) -> Duration {
        secs(self.connection_ticket_ttl_secs)
    }

    /// Reject configurations that would make credentials unusable.
    pub fn validate(&self) -> AuthResult<()> {
        let spans = [
            ("SESSION_TTL_SECS", self.session_ttl_secs),
            ("SIGNUP_SESSION_TTL_SECS", self.signup_session_ttl_secs),
            ("EMAIL_VERIFICATION_TTL_SECS", self.email_verification_ttl_secs),
            ("PASSWORD_RESET_TTL_SECS", self.password_reset_ttl_secs),
            ("ACCOUNT_ASSOCIATION_TTL_SECS", self.account_association_ttl_secs),
            ("PROVIDER_LINK_TTL_SECS", self.provider_link_ttl_secs),
            ("CONNECTION_TICKET_TTL_SECS", self.connection_ticket_ttl_secs),
        ];
        if let Some((key, _)) = spans.iter().find(|(_, value)| *value == 0) {
            return Err(AuthError::ConfigError(format!("{key} must be positive")));
        }
        if self.session_refresh_window_secs >= self.session_ttl_secs {
            return Err(AuthError::ConfigError(
                "SESSION_REFRESH_WINDOW_SECS must be shorter than SESSION_TTL_SECS".to_string(),
            ));
        }
        if self.code_length == 0 {
            return Err(AuthError::ConfigError(
                "VERIFICATION_CODE_LENGTH must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
