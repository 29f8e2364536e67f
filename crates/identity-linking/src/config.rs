//! Account linking configuration.

use std::fmt;

use identity_tokens::{HmacKey, SignedStateCodec};

use crate::error::{LinkingError, LinkingResult};
use crate::redirect::ClientType;

/// Default web client origin.
pub const DEFAULT_WEB_BASE_URL: &str = "http://localhost:3000";

/// Default mobile client scheme.
pub const DEFAULT_MOBILE_SCHEME: &str = "identity-app://";

/// Settings for OAuth sign-in and linking.
#[derive(Clone)]
pub struct LinkingConfig {
    /// Key material for OAuth state signatures (at least 32 bytes).
    pub state_secret: String,

    /// Base URL of the web client; web redirects must stay on its origin.
    pub web_base_url: String,

    /// Custom scheme of the mobile client, e.g. `identity-app://`.
    pub mobile_scheme: String,
}

impl LinkingConfig {
    /// Create a configuration with the default client bases.
    pub fn new(state_secret: impl Into<String>) -> Self {
        Self {
            state_secret: state_secret.into(),
            web_base_url: DEFAULT_WEB_BASE_URL.to_string(),
            mobile_scheme: DEFAULT_MOBILE_SCHEME.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OAUTH_STATE_SECRET` (required)
    /// - `WEB_BASE_URL` (default: `http://localhost:3000`)
    /// - `MOBILE_SCHEME` (default: `identity-app://`)
    pub fn from_env() -> LinkingResult<Self> {
        let state_secret = std::env::var("OAUTH_STATE_SECRET")
            .map_err(|_| LinkingError::ConfigError("OAUTH_STATE_SECRET is not set".to_string()))?;

        let config = Self {
            state_secret,
            web_base_url: std::env::var("WEB_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_WEB_BASE_URL.to_string()),
            mobile_scheme: std::env::var("MOBILE_SCHEME")
                .unwrap_or_else(|_| DEFAULT_MOBILE_SCHEME.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder: set the web client base URL.
    pub fn with_web_base_url(mut self, url: impl Into<String>) -> Self {
        self.web_base_url = url.into();
        self
    }

    /// Builder: set the mobile client scheme.
    pub fn with_mobile_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.mobile_scheme = scheme.into();
        self
    }

    /// Base that redirects for `client` must stay under.
    pub fn client_base(&self, client: ClientType) -> &str {
        match client {
            ClientType::Web => &self.web_base_url,
            ClientType::Mobile => &self.mobile_scheme,
        }
    }

    /// Codec for OAuth state, keyed with `state_secret`.
    pub fn state_codec(&self) -> LinkingResult<SignedStateCodec> {
        let key = HmacKey::new(self.state_secret.as_bytes())
            .map_err(|e| LinkingError::ConfigError(format!("OAUTH_STATE_SECRET: {e}")))?;
        Ok(SignedStateCodec::new(key))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LinkingResult<()> {
        self.state_codec()?;

        for client in [ClientType::Web, ClientType::Mobile] {
            url::Url::parse(self.client_base(client)).map_err(|e| {
                LinkingError::ConfigError(format!("invalid {client} client base: {e}"))
            })?;
        }

        Ok(())
    }
}

impl fmt::Debug for LinkingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkingConfig")
            .field("state_secret", &"[REDACTED]")
            .field("web_base_url", &self.web_base_url)
            .field("mobile_scheme", &self.mobile_scheme)
            .finish()
    }
}
