//! Dispatcher: one entry point per execution kind.

use std::sync::Arc;

use saltapi_core::{
    ApiError, ApiRequest, AuthContext, AuthOverride, ClientKind, ExecutionRequest, JobHandle,
    LocalCall, MasterCall, Transport, traits::encode_body,
};
use saltapi_transport::{ClientConfig, EventStream, HttpTransport, NegotiateProvider, resolve};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    batch::BatchResults,
    envelope::{first_return, returns},
    session::Session,
};

/// Root endpoint that accepts execution batches.
pub const RUN_PATH: &str = "";
/// Endpoint for sessionless execution with inline credentials.
pub const UNSESSIONED_RUN_PATH: &str = "run";
/// Server-push event feed.
pub const EVENTS_PATH: &str = "events";

/// Override implied by the first inline credentials with a negotiated `eauth`.
fn inline_override(requests: &[ExecutionRequest]) -> AuthOverride {
    requests
        .iter()
        .filter_map(|r| r.credentials.as_ref()?.eauth())
        .map(AuthOverride::for_eauth)
        .find(|o| *o != AuthOverride::None)
        .unwrap_or_default()
}

/// High-level salt-api client.
///
/// Builds execution requests, routes them through the session and unwraps
/// the `{"return": [...]}` envelope.
#[derive(Debug)]
pub struct Client<T: Transport = HttpTransport> {
    session: Session<T>,
}

impl Client<HttpTransport> {
    /// Connect using `config`. A cached token in the config seeds the session.
    ///
    /// # Errors
    /// Returns `MalformedEndpoint` if `api_url` is not an absolute http(s)
    /// URL, or `Connection` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::seeded(transport, config))
    }

    /// Like [`Client::new`], with a provider for negotiated schemes.
    ///
    /// # Errors
    /// Same as [`Client::new`].
    pub fn with_negotiator(
        config: &ClientConfig,
        negotiator: Arc<dyn NegotiateProvider>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config)?.with_negotiator(negotiator);
        Ok(Self::seeded(transport, config))
    }

    fn seeded(transport: HttpTransport, config: &ClientConfig) -> Self {
        let context = config
            .token
            .as_deref()
            .map_or_else(AuthContext::empty, AuthContext::from_token);
        Self::with_context(transport, context)
    }
}

impl<T: Transport> Client<T> {
    /// Wrap an existing transport with an empty session.
    #[must_use]
    pub fn with_transport(transport: T) -> Self {
        Self {
            session: Session::new(transport),
        }
    }

    /// Wrap an existing transport with a seeded session.
    #[must_use]
    pub fn with_context(transport: T, context: AuthContext) -> Self {
        Self {
            session: Session::with_context(transport, context),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session<T> {
        &self.session
    }

    /// See [`Session::login`].
    ///
    /// # Errors
    /// See [`Session::login`].
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        eauth: &str,
    ) -> Result<AuthContext, ApiError> {
        self.session.login(username, password, eauth).await
    }

    /// See [`Session::logout`].
    ///
    /// # Errors
    /// See [`Session::logout`].
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.logout().await
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// POST a caller-built list of requests and return the whole envelope.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip_all, fields(count = requests.len()))]
    pub async fn run(&self, requests: &[ExecutionRequest]) -> Result<Value, ApiError> {
        let body = encode_body(requests)?;
        self.session
            .send(ApiRequest::post(RUN_PATH).body(body), &AuthOverride::None)
            .await?
            .json()
    }

    /// POST to the sessionless endpoint. The live session is ignored; each
    /// request carries its own credentials, or `call` supplies auth. With no
    /// explicit override, inline credentials naming a negotiated `eauth`
    /// select the negotiated provider.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip_all, fields(count = requests.len()))]
    pub async fn run_unsessioned(
        &self,
        requests: &[ExecutionRequest],
        call: &AuthOverride,
    ) -> Result<Value, ApiError> {
        let body = encode_body(requests)?;
        let call = match call {
            AuthOverride::None => inline_override(requests),
            explicit => explicit.clone(),
        };
        let auth = resolve(&AuthContext::empty(), &call);
        self.session
            .transport()
            .send(ApiRequest::post(UNSESSIONED_RUN_PATH).body(body).auth(auth))
            .await?
            .json()
    }

    async fn dispatch(&self, request: ExecutionRequest) -> Result<Value, ApiError> {
        debug!(client = ?request.client, fun = ?request.fun, "dispatching");
        let body = request.into_batch()?;
        self.session
            .send(ApiRequest::post(RUN_PATH).body(body), &AuthOverride::None)
            .await?
            .json()
    }

    async fn dispatch_one(&self, request: ExecutionRequest) -> Result<Value, ApiError> {
        first_return(self.dispatch(request).await?)
    }

    /// Run on the fleet and wait for the results.
    ///
    /// # Errors
    /// `ProtocolViolation` if the result list is empty or malformed, plus
    /// transport errors.
    #[instrument(skip_all, fields(tgt = %call.tgt, fun = %call.fun))]
    pub async fn local(&self, call: LocalCall) -> Result<Value, ApiError> {
        self.dispatch_one(call.build(ClientKind::Local)).await
    }

    /// Start a fleet job without waiting; poll it with [`Client::job`].
    ///
    /// # Errors
    /// `ProtocolViolation` if the response carries no `jid`, plus
    /// transport errors.
    #[instrument(skip_all, fields(tgt = %call.tgt, fun = %call.fun))]
    pub async fn local_async(&self, call: LocalCall) -> Result<JobHandle, ApiError> {
        let accepted = self.dispatch_one(call.build(ClientKind::LocalAsync)).await?;
        let jid = accepted
            .get("jid")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::ProtocolViolation(format!("no `jid` in {accepted}")))?;
        debug!(jid, "job accepted");
        Ok(JobHandle::new(jid))
    }

    /// Run on the fleet in stages of `batch` (default `50%`).
    ///
    /// # Errors
    /// `ProtocolViolation` if the envelope is malformed, plus transport
    /// errors.
    #[instrument(skip_all, fields(tgt = %call.tgt, fun = %call.fun))]
    pub async fn local_batch(
        &self,
        call: LocalCall,
        batch: Option<String>,
    ) -> Result<BatchResults, ApiError> {
        let stages = returns(self.dispatch(call.build_batch(batch)).await?)?;
        Ok(BatchResults::new(stages))
    }

    /// Run a runner function on the master.
    ///
    /// # Errors
    /// Same as [`Client::local`].
    #[instrument(skip_all, fields(fun = %call.fun))]
    pub async fn runner(&self, call: MasterCall) -> Result<Value, ApiError> {
        self.dispatch_one(call.build(ClientKind::Runner)).await
    }

    /// Run a wheel function on the master.
    ///
    /// # Errors
    /// Same as [`Client::local`].
    #[instrument(skip_all, fields(fun = %call.fun))]
    pub async fn wheel(&self, call: MasterCall) -> Result<Value, ApiError> {
        self.dispatch_one(call.build(ClientKind::Wheel)).await
    }

    /// Open the event feed with the session's current authentication.
    ///
    /// The stream ends when the connection closes and is not reconnected.
    /// Dropping it releases the connection.
    ///
    /// # Errors
    /// Transport errors raised while opening the stream.
    #[instrument(skip(self))]
    pub async fn events(&self) -> Result<EventStream, ApiError> {
        let request = ApiRequest::get(EVENTS_PATH).header("Accept", "text/event-stream");
        let body = self.session.stream(request, &AuthOverride::None).await?;
        Ok(EventStream::spawn(body))
    }
}
