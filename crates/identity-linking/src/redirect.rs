//! Client types and redirect validation.
//!
//! After the provider callback the user agent is sent back to the client
//! that started the flow. The redirect it asked for must stay under that
//! client's base: the web origin, or the mobile app's custom scheme.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Kind of client that started an OAuth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// Browser client served from the web origin
    Web,
    /// Native app reached through its custom URL scheme
    Mobile,
}

impl ClientType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Web => "web",
            ClientType::Mobile => "mobile",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(ClientType::Web),
            "mobile" => Some(ClientType::Mobile),
            _ => None,
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve `redirect_uri` against `base` and check it stays under it.
///
/// - `/path` is joined onto the base
/// - absolute URLs must use the base's scheme, and for http(s) also its
///   host and port
/// - protocol-relative `//host` is rejected
///
/// Returns `None` when the redirect is not acceptable.
pub fn validate_redirect_url(base: &str, redirect_uri: &str) -> Option<Url> {
    let base = Url::parse(base).ok()?;

    if redirect_uri.starts_with("//") {
        return None;
    }

    let candidate = if redirect_uri.starts_with('/') {
        base.join(redirect_uri).ok()?
    } else {
        Url::parse(redirect_uri).ok()?
    };

    if candidate.scheme() != base.scheme() {
        return None;
    }

    // joined paths are checked as well: "/\host" resolves to another host
    if matches!(base.scheme(), "http" | "https")
        && (candidate.host_str() != base.host_str()
            || candidate.port_or_known_default() != base.port_or_known_default())
    {
        return None;
    }

    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB: &str = "https://app.example.com";
    const MOBILE: &str = "identity-app://";

    #[test]
    fn test_relative_path_joins_base() {
        let url = validate_redirect_url(WEB, "/settings/connections?tab=1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://app.example.com/settings/connections?tab=1"
        );
        assert_eq!(
            validate_redirect_url(WEB, "/").unwrap().as_str(),
            "https://app.example.com/"
        );
    }

    #[test]
    fn test_same_origin_absolute_is_accepted() {
        let url = validate_redirect_url(WEB, "https://app.example.com/home").unwrap();
        assert_eq!(url.path(), "/home");
        assert!(validate_redirect_url(WEB, "https://app.example.com:443/home").is_some());
    }

    #[test]
    fn test_foreign_targets_are_rejected() {
        for uri in [
            "https://evil.example.com/",
            "http://app.example.com/",
            "https://app.example.com:8443/",
            "//evil.example.com/path",
            "/\\evil.example.com",
            "javascript:alert(1)",
            "settings",
            "",
        ] {
            assert!(validate_redirect_url(WEB, uri).is_none(), "accepted {uri:?}");
        }
    }

    #[test]
    fn test_mobile_scheme() {
        let url = validate_redirect_url(MOBILE, "identity-app://auth/done").unwrap();
        assert_eq!(url.scheme(), "identity-app");

        let joined = validate_redirect_url(MOBILE, "/auth/done").unwrap();
        assert_eq!(joined.scheme(), "identity-app");
        assert_eq!(joined.path(), "/auth/done");

        assert!(validate_redirect_url(MOBILE, "other-app://auth/done").is_none());
        assert!(validate_redirect_url(MOBILE, "https://app.example.com/").is_none());
    }

    #[test]
    fn test_invalid_base() {
        assert!(validate_redirect_url("not a url", "/").is_none());
    }

    #[test]
    fn test_client_type_serde() {
        assert_eq!(serde_json::to_string(&ClientType::Mobile).unwrap(), "\"mobile\"");
        assert_eq!(ClientType::parse("web"), Some(ClientType::Web));
        assert_eq!(ClientType::parse("desktop"), None);
    }
}
