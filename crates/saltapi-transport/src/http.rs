//! reqwest-backed transport.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{
    Client, RequestBuilder, Response,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use saltapi_core::{
    ApiError, ApiRequest, ApiResponse, AuthStrategy, ByteStream, Method, Transport,
    traits::classify_status,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    auth::NegotiateProvider,
    config::ClientConfig,
    protocol::{AUTH_TOKEN_HEADER, DEFAULT_HEADERS, ServiceRoot},
};

/// HTTP transport sharing one connection pool and cookie jar across calls.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    root: ServiceRoot,
    negotiator: Option<Arc<dyn NegotiateProvider>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("root", &self.root.as_url().as_str())
            .field("negotiator", &self.negotiator.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    /// Returns `MalformedEndpoint` if the service root is invalid, or
    /// `Connection` if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let root = ServiceRoot::parse(&config.api_url)?;

        let mut builder = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.ignore_ssl_errors)
            .connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.read_timeout_duration() {
            builder = builder.read_timeout(timeout);
        }
        if config.ignore_ssl_errors {
            warn!(root = %root.as_url(), "certificate validation disabled");
        }

        let client = builder
            .build()
            .map_err(|e| ApiError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            root,
            negotiator: None,
        })
    }

    /// Attach a negotiated-credential provider.
    #[must_use]
    pub fn with_negotiator(mut self, negotiator: Arc<dyn NegotiateProvider>) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    /// The validated service root.
    #[must_use]
    pub const fn root(&self) -> &ServiceRoot {
        &self.root
    }

    async fn build(&self, request: &ApiRequest) -> Result<(Url, RequestBuilder), ApiError> {
        let url = self.root.join(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in DEFAULT_HEADERS {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(format!("bad header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::InvalidRequest(format!("bad header value: {e}")))?;
            headers.insert(name, value);
        }

        match &request.auth {
            AuthStrategy::Anonymous => {}
            AuthStrategy::Token(token) => {
                if !headers.contains_key(AUTH_TOKEN_HEADER) {
                    let mut value = HeaderValue::from_str(token).map_err(|e| {
                        ApiError::InvalidRequest(format!("token is not a valid header: {e}"))
                    })?;
                    value.set_sensitive(true);
                    headers.insert(AUTH_TOKEN_HEADER, value);
                }
            }
            AuthStrategy::Negotiated { scheme } => match &self.negotiator {
                Some(negotiator) => {
                    let credential = negotiator.authorization(scheme, &url).await?;
                    let mut value = HeaderValue::from_str(&credential).map_err(|e| {
                        ApiError::InvalidRequest(format!("negotiated credential is not a valid header: {e}"))
                    })?;
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                None => {
                    warn!(%scheme, "negotiated auth requested but no provider configured; sending unauthenticated");
                }
            },
        }

        let mut builder = self.client.request(method, url.clone()).headers(headers);
        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| ApiError::InvalidRequest(format!("unencodable body: {e}")))?;
            builder = builder.body(bytes);
        }
        Ok((url, builder))
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let (url, builder) = self.build(request).await?;
        let method = request.method;

        debug!(%method, %url, "sending salt-api request");
        let response = builder.send().await.map_err(|e| {
            debug!(%method, %url, error = %e, "salt-api request failed");
            ApiError::Connection(e.to_string())
        })?;

        let status = response.status().as_u16();
        debug!(%method, %url, status, "received salt-api response");
        classify_status(status)?;
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.execute(&request).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Connection(format!("failed to read response body: {e}")))?;
        Ok(ApiResponse { status, body })
    }

    async fn stream(&self, request: ApiRequest) -> Result<ByteStream, ApiError> {
        let response = self.execute(&request).await?;
        Ok(response
            .bytes_stream()
            .map_err(|e| ApiError::Connection(e.to_string()))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&ClientConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_default_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Accept", "application/json"))
            .and(header("Content-Type", "application/json"))
            .and(header("X-Requested-With", "XMLHttpRequest"))
            .and(body_json(json!([{"client": "local"}])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"return": [{}]})))
            .expect(1)
            .mount(&server)
            .await;

        let resp = transport(&server)
            .await
            .send(ApiRequest::post("").body(json!([{"client": "local"}])))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.json::<serde_json::Value>().unwrap(), json!({"return": [{}]}));
    }

    #[tokio::test]
    async fn test_caller_headers_win() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stats"))
            .and(header("Accept", "application/x-yaml"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        transport(&server)
            .await
            .send(ApiRequest::get("stats").header("Accept", "application/x-yaml"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_header_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/minions"))
            .and(header(AUTH_TOKEN_HEADER, "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"return": []})))
            .expect(1)
            .mount(&server)
            .await;

        transport(&server)
            .await
            .send(ApiRequest::get("minions").auth(AuthStrategy::Token("abc".into())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let transport = transport(&server).await;
        assert!(matches!(
            transport.send(ApiRequest::get("denied")).await,
            Err(ApiError::AuthenticationDenied)
        ));
        assert!(matches!(
            transport.send(ApiRequest::get("broken")).await,
            Err(ApiError::ServerError)
        ));

        let resp = transport.send(ApiRequest::get("missing")).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(matches!(
            resp.json::<serde_json::Value>(),
            Err(ApiError::DecodeFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_caller_header_is_invalid_request() {
        let server = MockServer::start().await;
        let transport = transport(&server).await;

        assert!(matches!(
            transport
                .send(ApiRequest::get("stats").header("Bad Header", "1"))
                .await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            transport
                .send(ApiRequest::get("stats").header("X-Note", "line\nbreak"))
                .await,
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absolute_path_replaces_root_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::new(format!("{}/api/", server.uri()));
        let transport = HttpTransport::new(&config).unwrap();
        transport.send(ApiRequest::post("/login")).await.unwrap();
        transport.send(ApiRequest::post("login")).await.unwrap();
    }

    struct FixedNegotiator;

    #[async_trait]
    impl NegotiateProvider for FixedNegotiator {
        async fn authorization(&self, scheme: &str, _url: &Url) -> Result<String, ApiError> {
            assert_eq!(scheme, "kerberos", "unexpected scheme");
            Ok("Negotiate dG9rZW4=".to_owned())
        }
    }

    #[tokio::test]
    async fn test_negotiated_auth_uses_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("Authorization", "Negotiate dG9rZW4="))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(&server)
            .await
            .with_negotiator(Arc::new(FixedNegotiator));
        transport
            .send(ApiRequest::post("login").auth(AuthStrategy::Negotiated {
                scheme: "kerberos".into(),
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stream_yields_body_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: {}\n\n"))
            .mount(&server)
            .await;

        let stream = transport(&server)
            .await
            .stream(ApiRequest::get("events"))
            .await
            .unwrap();
        let chunks: Vec<_> = stream.try_collect().await.unwrap();
        let body: Vec<u8> = chunks.concat();
        assert_eq!(body, b"data: {}\n\n");
    }

    #[test]
    fn test_malformed_endpoint() {
        assert!(matches!(
            HttpTransport::new(&ClientConfig::new("localhost:8000")),
            Err(ApiError::MalformedEndpoint(_))
        ));
    }
}
