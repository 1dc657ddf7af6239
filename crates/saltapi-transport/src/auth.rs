//! Authentication strategy resolution.

use async_trait::async_trait;
use saltapi_core::{ApiError, AuthContext, AuthOverride, AuthScheme, AuthStrategy};
use url::Url;

/// Resolve how one request is authenticated.
///
/// Order: a per-call negotiated or token override; then a session whose
/// `eauth` is a negotiated scheme; then the session token; otherwise no
/// authentication. Pure: reads the snapshot, never mutates it.
#[must_use]
pub fn resolve(context: &AuthContext, call: &AuthOverride) -> AuthStrategy {
    match call {
        AuthOverride::Negotiated(scheme) => AuthStrategy::Negotiated {
            scheme: scheme.clone(),
        },
        AuthOverride::Token(token) if !token.is_empty() => AuthStrategy::Token(token.clone()),
        AuthOverride::Token(_) | AuthOverride::None => match context.scheme() {
            AuthScheme::Negotiated => AuthStrategy::Negotiated {
                scheme: context.eauth.clone().unwrap_or_default(),
            },
            AuthScheme::Token => context
                .token()
                .map_or(AuthStrategy::Anonymous, |t| AuthStrategy::Token(t.to_owned())),
            AuthScheme::None => AuthStrategy::Anonymous,
        },
    }
}

/// Provides negotiated credentials (e.g. SPNEGO/Kerberos) for a request.
///
/// Implementations return the full `Authorization` header value.
#[async_trait]
pub trait NegotiateProvider: Send + Sync {
    /// Produce the `Authorization` header for a request to `url`.
    async fn authorization(&self, scheme: &str, url: &Url) -> Result<String, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in(token: &str) -> AuthContext {
        AuthContext {
            eauth: Some("pam".into()),
            token: Some(token.into()),
            user: Some("saltdev".into()),
            ..AuthContext::default()
        }
    }

    #[test]
    fn test_empty_session_is_anonymous() {
        assert_eq!(
            resolve(&AuthContext::empty(), &AuthOverride::None),
            AuthStrategy::Anonymous
        );
    }

    #[test]
    fn test_session_token_is_used() {
        assert_eq!(
            resolve(&logged_in("abc"), &AuthOverride::None),
            AuthStrategy::Token("abc".into())
        );
    }

    #[test]
    fn test_negotiated_override_ignores_session_token() {
        assert_eq!(
            resolve(&logged_in("abc"), &AuthOverride::Negotiated("kerberos".into())),
            AuthStrategy::Negotiated {
                scheme: "kerberos".into()
            }
        );
    }

    #[test]
    fn test_token_override_wins_over_session() {
        assert_eq!(
            resolve(&logged_in("abc"), &AuthOverride::Token("xyz".into())),
            AuthStrategy::Token("xyz".into())
        );
        // An empty override token defers to the session.
        assert_eq!(
            resolve(&logged_in("abc"), &AuthOverride::Token(String::new())),
            AuthStrategy::Token("abc".into())
        );
    }

    #[test]
    fn test_kerberos_session_stays_negotiated() {
        let ctx = AuthContext {
            eauth: Some("kerberos".into()),
            token: Some("abc".into()),
            ..AuthContext::default()
        };
        assert_eq!(
            resolve(&ctx, &AuthOverride::None),
            AuthStrategy::Negotiated {
                scheme: "kerberos".into()
            }
        );
    }

    #[test]
    fn test_resolution_does_not_touch_context() {
        let ctx = logged_in("abc");
        let before = ctx.clone();
        let _ = resolve(&ctx, &AuthOverride::Negotiated("kerberos".into()));
        assert_eq!(ctx, before);
    }
}
