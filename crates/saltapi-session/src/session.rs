//! Session: owns the live authentication context.

use std::sync::{Arc, PoisonError, RwLock};

use saltapi_core::{
    ApiError, ApiRequest, ApiResponse, AuthContext, AuthOverride, ByteStream, Transport,
};
use saltapi_transport::resolve;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::envelope::first_return;

/// Login endpoint, relative to the service root.
pub const LOGIN_PATH: &str = "login";
/// Logout endpoint, relative to the service root.
pub const LOGOUT_PATH: &str = "logout";

/// Authenticated session over a transport.
///
/// The context is swapped as a whole snapshot; each call reads one
/// snapshot and never observes a half-updated context. Concurrent logins
/// race and the last to complete wins.
pub struct Session<T: Transport> {
    transport: T,
    auth: RwLock<Arc<AuthContext>>,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("scheme", &self.context().scheme())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Create an unauthenticated session.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_context(transport, AuthContext::empty())
    }

    /// Create a session seeded with an existing context (e.g. a cached token).
    #[must_use]
    pub fn with_context(transport: T, context: AuthContext) -> Self {
        Self {
            transport,
            auth: RwLock::new(Arc::new(context)),
        }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of the current context.
    #[must_use]
    pub fn context(&self) -> Arc<AuthContext> {
        Arc::clone(&self.auth.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns `true` if a non-empty context is live.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.context().is_empty()
    }

    fn replace(&self, context: AuthContext) {
        *self.auth.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(context);
    }

    /// Send a request, authenticated per the current snapshot and `call`.
    ///
    /// # Errors
    /// Propagates transport errors.
    pub async fn send(
        &self,
        request: ApiRequest,
        call: &AuthOverride,
    ) -> Result<ApiResponse, ApiError> {
        let auth = resolve(&self.context(), call);
        self.transport.send(request.auth(auth)).await
    }

    /// Like [`Session::send`] but returns the body as a stream.
    ///
    /// # Errors
    /// Propagates transport errors.
    pub async fn stream(
        &self,
        request: ApiRequest,
        call: &AuthOverride,
    ) -> Result<ByteStream, ApiError> {
        let auth = resolve(&self.context(), call);
        self.transport.stream(request.auth(auth)).await
    }

    /// Log in and replace the context with the one the service returns.
    ///
    /// A negotiated `eauth` authenticates this call with the negotiated
    /// provider instead of any existing token.
    ///
    /// # Errors
    /// Returns `AuthenticationDenied` on bad credentials (the existing
    /// context is kept), `ProtocolViolation` if the response has no
    /// context, or `DecodeFailure` if it is not JSON.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        eauth: &str,
    ) -> Result<AuthContext, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).body(json!({
            "username": username,
            "password": password,
            "eauth": eauth,
        }));

        let body: Value = self
            .send(request, &AuthOverride::for_eauth(eauth))
            .await?
            .json()?;
        let context: AuthContext =
            serde_json::from_value(first_return(body)?).map_err(ApiError::DecodeFailure)?;

        info!(user = ?context.user, scheme = ?context.scheme(), "logged in");
        self.replace(context.clone());
        Ok(context)
    }

    /// Log out. The local context is cleared whatever the outcome.
    ///
    /// # Errors
    /// Returns the transport error, if any, after clearing the context.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .send(ApiRequest::post(LOGOUT_PATH), &AuthOverride::None)
            .await;
        self.replace(AuthContext::empty());

        let response = result?;
        if let Err(e) = response.json::<Value>() {
            warn!("logout response was not JSON: {e}");
        }
        info!("logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use saltapi_core::{AuthScheme, AuthStrategy, Method};

    use super::*;
    use crate::testing::FakeTransport;

    fn login_body(token: &str) -> Value {
        json!({"return": [{
            "eauth": "pam",
            "expire": 1_370_434_219.714_091,
            "perms": ["test.*"],
            "start": 1_370_391_019.714_09,
            "token": token,
            "user": "saltdev"
        }]})
    }

    #[tokio::test]
    async fn test_login_replaces_context() {
        let session = Session::new(FakeTransport::new().respond_json(login_body("abc")));
        assert!(!session.is_authenticated());

        let ctx = session.login("saltdev", "saltdev", "pam").await.unwrap();
        assert_eq!(ctx.token(), Some("abc"));
        assert_eq!(ctx.permissions, vec![json!("test.*")]);
        assert!(session.is_authenticated());
        assert_eq!(*session.context(), ctx);

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, LOGIN_PATH);
        assert_eq!(
            requests[0].body,
            Some(json!({"username": "saltdev", "password": "saltdev", "eauth": "pam"}))
        );
        assert_eq!(requests[0].auth, AuthStrategy::Anonymous);
    }

    #[tokio::test]
    async fn test_token_attached_after_login() {
        let session = Session::new(
            FakeTransport::new()
                .respond_json(login_body("abc"))
                .respond_json(json!({"return": [{}]})),
        );
        session.login("saltdev", "saltdev", "pam").await.unwrap();
        session
            .send(ApiRequest::get("minions"), &AuthOverride::None)
            .await
            .unwrap();

        let requests = session.transport().requests();
        assert_eq!(requests[1].auth, AuthStrategy::Token("abc".into()));
    }

    #[tokio::test]
    async fn test_last_login_wins() {
        let session = Session::new(
            FakeTransport::new()
                .respond_json(login_body("first"))
                .respond_json(login_body("second")),
        );
        session.login("a", "a", "pam").await.unwrap();
        session.login("b", "b", "pam").await.unwrap();
        assert_eq!(session.context().token(), Some("second"));
    }

    #[tokio::test]
    async fn test_denied_login_keeps_context() {
        let session = Session::with_context(
            FakeTransport::new().respond(401, ""),
            AuthContext::from_token("old"),
        );
        assert!(matches!(
            session.login("saltdev", "wrong", "pam").await,
            Err(ApiError::AuthenticationDenied)
        ));
        assert_eq!(session.context().token(), Some("old"));
    }

    #[tokio::test]
    async fn test_login_with_empty_return_is_violation() {
        let session = Session::new(FakeTransport::new().respond_json(json!({"return": []})));
        assert!(matches!(
            session.login("saltdev", "saltdev", "pam").await,
            Err(ApiError::ProtocolViolation(_))
        ));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_kerberos_login_uses_negotiated_override() {
        let session = Session::with_context(
            FakeTransport::new().respond_json(json!({"return": [{
                "eauth": "kerberos", "token": "krb", "user": "alice", "perms": []
            }]})),
            AuthContext::from_token("stale"),
        );
        let ctx = session.login("alice", "", "kerberos").await.unwrap();
        assert_eq!(ctx.scheme(), AuthScheme::Negotiated);
        assert_eq!(
            session.transport().requests()[0].auth,
            AuthStrategy::Negotiated {
                scheme: "kerberos".into()
            }
        );
    }

    #[tokio::test]
    async fn test_logout_clears_context() {
        let session = Session::with_context(
            FakeTransport::new().respond_json(json!({"return": "Welcome"})),
            AuthContext::from_token("abc"),
        );
        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(session.transport().requests()[0].path, LOGOUT_PATH);
        assert_eq!(
            session.transport().requests()[0].auth,
            AuthStrategy::Token("abc".into())
        );
    }

    #[tokio::test]
    async fn test_logout_clears_context_even_on_failure() {
        let session = Session::with_context(
            FakeTransport::new().respond(500, ""),
            AuthContext::from_token("abc"),
        );
        assert!(matches!(session.logout().await, Err(ApiError::ServerError)));
        assert!(!session.is_authenticated());

        let session = Session::with_context(
            FakeTransport::new().respond(200, ""),
            AuthContext::from_token("abc"),
        );
        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
    }
}
