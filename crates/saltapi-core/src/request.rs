//! Execution request shapes.
//!
//! Every optional field is skipped when unset: the service distinguishes an
//! absent key from an explicit `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::traits::{ApiError, encode_body};

/// Default batch size for staged fleet calls.
pub const DEFAULT_BATCH: &str = "50%";

/// Which salt client interface handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Synchronous fleet execution.
    Local,
    /// Fire-and-forget fleet execution returning a job id.
    LocalAsync,
    /// Staged fleet execution.
    LocalBatch,
    /// Master-side runner function.
    Runner,
    /// Master-side administrative (wheel) function.
    Wheel,
    /// Sessionless execution.
    Run,
}

impl ClientKind {
    /// Returns `true` for kinds that address fleet members.
    #[must_use]
    pub const fn targets_fleet(self) -> bool {
        matches!(self, Self::Local | Self::LocalAsync | Self::LocalBatch)
    }
}

/// How the target selector is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Glob,
    Pcre,
    List,
    Grain,
    GrainPcre,
    Pillar,
    PillarPcre,
    Nodegroup,
    Range,
    Compound,
    Ipcidr,
}

/// Inline credentials for sessionless calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Username, password and external-auth backend.
    Password {
        username: String,
        password: String,
        eauth: String,
    },
    /// A previously issued token.
    Token { token: String },
}

impl Credentials {
    /// The external-auth backend named by these credentials.
    #[must_use]
    pub fn eauth(&self) -> Option<&str> {
        match self {
            Self::Password { eauth, .. } => Some(eauth),
            Self::Token { .. } => None,
        }
    }
}

/// One unit of work sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub client: ClientKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fun: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwarg: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt_type: Option<TargetType>,
    /// Remote-side timeout hint in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Batch size, either a count (`"10"`) or a percentage (`"25%"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    /// Returner to store results with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret: Option<String>,
    #[serde(flatten)]
    pub credentials: Option<Credentials>,
}

impl ExecutionRequest {
    /// Create a bare request of the given kind.
    #[must_use]
    pub const fn new(client: ClientKind) -> Self {
        Self {
            client,
            tgt: None,
            fun: None,
            arg: None,
            kwarg: None,
            tgt_type: None,
            timeout: None,
            batch: None,
            ret: None,
            credentials: None,
        }
    }

    /// Attach inline credentials (sessionless calls).
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Serialize as a one-element batch, the shape the service expects.
    ///
    /// # Errors
    /// Returns `InvalidRequest` if a value cannot be represented as JSON.
    pub fn into_batch(self) -> Result<Value, ApiError> {
        encode_body(&[self])
    }
}

/// Builder for fleet calls (`local`, `local_async`, `local_batch`).
#[derive(Debug, Clone)]
pub struct LocalCall {
    pub tgt: String,
    pub fun: String,
    pub arg: Option<Vec<Value>>,
    pub kwarg: Option<Map<String, Value>>,
    pub tgt_type: TargetType,
    pub timeout: Option<u64>,
    pub ret: Option<String>,
}

impl LocalCall {
    /// Call `fun` on the members matched by `tgt`.
    #[must_use]
    pub fn new<T: Into<String>, F: Into<String>>(tgt: T, fun: F) -> Self {
        Self {
            tgt: tgt.into(),
            fun: fun.into(),
            arg: None,
            kwarg: None,
            tgt_type: TargetType::default(),
            timeout: None,
            ret: None,
        }
    }

    /// Set positional arguments.
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.arg = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Add a keyword argument.
    #[must_use]
    pub fn kwarg<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.kwarg
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the target match mode.
    #[must_use]
    pub fn tgt_type(mut self, tgt_type: TargetType) -> Self {
        self.tgt_type = tgt_type;
        self
    }

    /// Set the remote-side timeout hint.
    #[must_use]
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// Store results with the named returner.
    #[must_use]
    pub fn ret<S: Into<String>>(mut self, returner: S) -> Self {
        self.ret = Some(returner.into());
        self
    }

    /// Build the request for the given fleet kind.
    #[must_use]
    pub fn build(self, client: ClientKind) -> ExecutionRequest {
        debug_assert!(client.targets_fleet(), "LocalCall built for non-fleet kind");
        ExecutionRequest {
            tgt: Some(self.tgt),
            fun: Some(self.fun),
            arg: self.arg,
            kwarg: self.kwarg,
            tgt_type: Some(self.tgt_type),
            timeout: self.timeout,
            ret: self.ret,
            ..ExecutionRequest::new(client)
        }
    }

    /// Build a staged request; `batch` defaults to [`DEFAULT_BATCH`].
    #[must_use]
    pub fn build_batch(self, batch: Option<String>) -> ExecutionRequest {
        // The remote timeout hint does not apply to staged calls.
        ExecutionRequest {
            timeout: None,
            batch: Some(batch.unwrap_or_else(|| DEFAULT_BATCH.to_owned())),
            ..self.build(ClientKind::LocalBatch)
        }
    }
}

/// Builder for master-side calls (`runner`, `wheel`).
#[derive(Debug, Clone)]
pub struct MasterCall {
    pub fun: String,
    pub arg: Option<Vec<Value>>,
    pub kwarg: Option<Map<String, Value>>,
}

impl MasterCall {
    /// Call master-side function `fun`.
    #[must_use]
    pub fn new<F: Into<String>>(fun: F) -> Self {
        Self {
            fun: fun.into(),
            arg: None,
            kwarg: None,
        }
    }

    /// Set positional arguments.
    #[must_use]
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.arg = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Add a keyword argument.
    #[must_use]
    pub fn kwarg<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.kwarg
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Build the request for the given master-side kind.
    #[must_use]
    pub fn build(self, client: ClientKind) -> ExecutionRequest {
        ExecutionRequest {
            fun: Some(self.fun),
            arg: self.arg,
            kwarg: self.kwarg,
            ..ExecutionRequest::new(client)
        }
    }
}
