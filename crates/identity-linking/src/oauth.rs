//! OAuth 2.0 provider support
//!
//! Provider identities, per-provider client configuration, PKCE and the
//! gateway port the linking orchestrator talks to. Supports Google,
//! Discord, GitHub, Microsoft, Apple and Slack.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{GatewayResult, LinkingError, LinkingResult};

/// Length of generated PKCE code verifiers (RFC 7636 allows 43..=128).
pub const CODE_VERIFIER_LENGTH: usize = 64;

/// Supported identity providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    /// Google OAuth
    Google,
    /// Discord OAuth
    Discord,
    /// GitHub OAuth
    GitHub,
    /// Microsoft OAuth (Azure AD)
    Microsoft,
    /// Apple Sign In
    Apple,
    /// Slack OAuth
    Slack,
}

impl IdentityProvider {
    /// Every supported provider.
    pub const ALL: [IdentityProvider; 6] = [
        IdentityProvider::Google,
        IdentityProvider::Discord,
        IdentityProvider::GitHub,
        IdentityProvider::Microsoft,
        IdentityProvider::Apple,
        IdentityProvider::Slack,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Google => "google",
            IdentityProvider::Discord => "discord",
            IdentityProvider::GitHub => "github",
            IdentityProvider::Microsoft => "microsoft",
            IdentityProvider::Apple => "apple",
            IdentityProvider::Slack => "slack",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(IdentityProvider::Google),
            "discord" => Some(IdentityProvider::Discord),
            "github" => Some(IdentityProvider::GitHub),
            "microsoft" | "azure" | "azuread" => Some(IdentityProvider::Microsoft),
            "apple" => Some(IdentityProvider::Apple),
            "slack" => Some(IdentityProvider::Slack),
            _ => None,
        }
    }

    /// Default authorization endpoint.
    pub fn auth_url(&self) -> &'static str {
        match self {
            IdentityProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            IdentityProvider::Discord => "https://discord.com/oauth2/authorize",
            IdentityProvider::GitHub => "https://github.com/login/oauth/authorize",
            IdentityProvider::Microsoft => {
                "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
            }
            IdentityProvider::Apple => "https://appleid.apple.com/auth/authorize",
            IdentityProvider::Slack => "https://slack.com/oauth/v2/authorize",
        }
    }

    /// Get default scopes for the provider.
    pub fn default_scopes(&self) -> Vec<&'static str> {
        match self {
            IdentityProvider::Google => vec!["openid", "email", "profile"],
            IdentityProvider::Discord => vec!["identify", "email"],
            IdentityProvider::GitHub => vec!["user:email", "read:user"],
            IdentityProvider::Microsoft => vec!["openid", "email", "profile", "User.Read"],
            IdentityProvider::Apple => vec!["name", "email"],
            IdentityProvider::Slack => vec!["users:read", "users:read.email"],
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's identifier at a provider (the `sub` claim or equivalent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderUserId(String);

impl ProviderUserId {
    /// Wrap a provider-issued identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PKCE code verifier.
///
/// Kept by the client between the authorization request and the callback;
/// only its S256 challenge is sent to the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Generate a random verifier.
    pub fn generate() -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_VERIFIER_LENGTH)
            .map(char::from)
            .collect();
        Self(value)
    }

    /// Wrap a verifier returned by the client on callback.
    pub fn from_client(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The verifier itself.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// S256 challenge: base64url(sha256(verifier)), unpadded.
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeVerifier([REDACTED])")
    }
}

/// OAuth provider configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Provider type
    pub provider: IdentityProvider,

    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Authorization URL (optional, uses the provider default)
    pub auth_url: Option<String>,

    /// Redirect URL registered with the provider
    pub redirect_url: String,

    /// Scopes to request
    pub scopes: Vec<String>,

    /// Additional authorization parameters
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

impl OAuthConfig {
    /// Create a new OAuth configuration.
    pub fn new(
        provider: IdentityProvider,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: None,
            redirect_url: redirect_url.into(),
            scopes: provider
                .default_scopes()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_params: HashMap::new(),
        }
    }

    /// Builder: override the requested scopes.
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: add an authorization parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Get the authorization URL.
    pub fn get_auth_url(&self) -> LinkingResult<Url> {
        let raw = self
            .auth_url
            .as_deref()
            .unwrap_or_else(|| self.provider.auth_url());
        Url::parse(raw)
            .map_err(|e| LinkingError::ConfigError(format!("invalid authorization URL: {e}")))
    }

    /// Build the provider authorization URL for an authorization code
    /// request with PKCE (S256).
    pub fn authorization_url(&self, state: &str, verifier: &CodeVerifier) -> LinkingResult<Url> {
        let mut url = self.get_auth_url()?;

        // sorted so the URL is stable
        let mut extra: Vec<_> = self.extra_params.iter().collect();
        extra.sort();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_url)
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state)
                .append_pair("code_challenge", &verifier.challenge())
                .append_pair("code_challenge_method", "S256");
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth token response from provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Expires in seconds
    pub expires_in: Option<i64>,

    /// Refresh token (if provided)
    pub refresh_token: Option<String>,

    /// ID token (for OIDC)
    pub id_token: Option<String>,

    /// Granted scopes
    pub scope: Option<String>,
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Identity returned by a provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider-specific user ID
    pub provider_user_id: ProviderUserId,

    /// Email address
    pub email: String,

    /// Display name
    pub name: Option<String>,

    /// Profile picture URL
    pub icon_url: Option<String>,
}

/// Port to an OAuth provider.
#[async_trait]
pub trait OAuthProviderGateway: Send + Sync {
    /// Provider served by this gateway.
    fn provider(&self) -> IdentityProvider;

    /// Build the URL the user agent is sent to.
    fn authorization_url(&self, state: &str, verifier: &CodeVerifier) -> LinkingResult<Url>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, verifier: &CodeVerifier)
        -> GatewayResult<OAuthTokens>;

    /// Fetch the user's identity with the exchanged tokens.
    async fn fetch_identity(&self, tokens: &OAuthTokens) -> GatewayResult<ProviderIdentity>;

    /// Revoke the exchanged tokens.
    async fn revoke_token(&self, tokens: &OAuthTokens) -> GatewayResult<()>;
}

/// Gateways by provider.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<IdentityProvider, Arc<dyn OAuthProviderGateway>>,
}

impl GatewayRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway under the provider it reports.
    pub fn register(&mut self, gateway: Arc<dyn OAuthProviderGateway>) {
        self.gateways.insert(gateway.provider(), gateway);
    }

    /// Builder form of [`GatewayRegistry::register`].
    pub fn with(mut self, gateway: Arc<dyn OAuthProviderGateway>) -> Self {
        self.register(gateway);
        self
    }

    /// Look up the gateway for `provider`.
    pub fn get(&self, provider: IdentityProvider) -> LinkingResult<&Arc<dyn OAuthProviderGateway>> {
        self.gateways
            .get(&provider)
            .ok_or(LinkingError::UnsupportedProvider(provider))
    }

    /// Registered providers, sorted.
    pub fn providers(&self) -> Vec<IdentityProvider> {
        let mut providers: Vec<_> = self.gateways.keys().copied().collect();
        providers.sort();
        providers
    }
}

impl fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
