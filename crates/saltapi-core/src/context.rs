//! Authentication context held by a session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// External-auth scheme names that are negotiated at the HTTP layer rather
/// than carried as a salt token.
pub const NEGOTIATED_SCHEMES: &[&str] = &["kerberos"];

/// Returns `true` if `eauth` names a negotiated-credential scheme.
#[must_use]
pub fn is_negotiated_scheme(eauth: &str) -> bool {
    NEGOTIATED_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(eauth))
}

/// How outbound requests are authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// Requests are sent without credentials.
    #[default]
    None,
    /// Requests carry an `X-Auth-Token` header.
    Token,
    /// Requests are signed by a negotiated-credential provider.
    Negotiated,
}

/// Authentication context returned by `/login`.
///
/// Everything except the token is opaque to this layer and is round-tripped
/// exactly as the service returned it. A context is never mutated after
/// construction; sessions swap whole snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// External-auth backend used for the login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eauth: Option<String>,
    /// Session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Granted permissions, as returned by the service.
    #[serde(default, rename = "perms")]
    pub permissions: Vec<Value>,
    /// Token issue time (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Token expiry (Unix epoch seconds).
    #[serde(default, rename = "expire", skip_serializing_if = "Option::is_none")]
    pub expiry: Option<f64>,
    /// Any other fields the service included.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthContext {
    /// The empty, unauthenticated context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A context carrying only a previously issued token.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// The token, if present and non-empty.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Scheme implied by this context.
    #[must_use]
    pub fn scheme(&self) -> AuthScheme {
        if self.eauth.as_deref().is_some_and(is_negotiated_scheme) {
            AuthScheme::Negotiated
        } else if self.token().is_some() {
            AuthScheme::Token
        } else {
            AuthScheme::None
        }
    }

    /// Returns `true` if this is the empty context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheme() == AuthScheme::None
    }
}

/// Per-call authentication override.
///
/// `None` defers to the session; the other variants make a single call
/// authenticate differently from the ambient session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthOverride {
    /// Use the session's context.
    #[default]
    None,
    /// Attach this token instead of the session's.
    Token(String),
    /// Use the negotiated-credential provider for this call only.
    Negotiated(String),
}

impl AuthOverride {
    /// Override implied by an `eauth` name sent with a call.
    #[must_use]
    pub fn for_eauth(eauth: &str) -> Self {
        if is_negotiated_scheme(eauth) {
            Self::Negotiated(eauth.to_owned())
        } else {
            Self::None
        }
    }
}

/// Resolved authentication for one outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Send without credentials.
    #[default]
    Anonymous,
    /// Set `X-Auth-Token`.
    Token(String),
    /// Ask the negotiated-credential provider to sign the request.
    Negotiated {
        /// Scheme name (e.g. `kerberos`).
        scheme: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_payload_roundtrip() {
        let raw = serde_json::json!({
            "eauth": "pam",
            "expire": 1_370_434_219.714_091,
            "perms": ["test.*", {"*": ["grains.items"]}],
            "start": 1_370_391_019.714_09,
            "token": "c02a6f4397b5496ba06b70ae5fd1f2ab75de9237",
            "user": "saltdev",
            "extra_field": 7
        });

        let ctx: AuthContext = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(ctx.token(), Some("c02a6f4397b5496ba06b70ae5fd1f2ab75de9237"));
        assert_eq!(ctx.permissions.len(), 2);
        assert_eq!(ctx.scheme(), AuthScheme::Token);
        assert_eq!(serde_json::to_value(&ctx).unwrap(), raw);
    }

    #[test]
    fn test_empty_context_has_no_scheme() {
        let ctx = AuthContext::empty();
        assert!(ctx.is_empty());
        assert_eq!(ctx.token(), None);

        let blank = AuthContext::from_token("");
        assert_eq!(blank.scheme(), AuthScheme::None);
    }

    #[test]
    fn test_kerberos_context_is_negotiated() {
        let ctx = AuthContext {
            eauth: Some("kerberos".into()),
            token: Some("abc".into()),
            ..AuthContext::default()
        };
        assert_eq!(ctx.scheme(), AuthScheme::Negotiated);
    }

    #[test]
    fn test_override_for_eauth() {
        assert_eq!(AuthOverride::for_eauth("pam"), AuthOverride::None);
        assert_eq!(
            AuthOverride::for_eauth("kerberos"),
            AuthOverride::Negotiated("kerberos".into())
        );
    }
}
