//! Resource listings and auxiliary endpoints.
//!
//! Thin wrappers over the transport: they add paths, not semantics.

use bytes::Bytes;
use saltapi_core::{
    ApiError, ApiRequest, AuthOverride, Credentials, JobHandle, Transport, traits::encode_body,
};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::dispatch::Client;

/// Options for [`Client::key_gen`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyGenOptions {
    /// Key size in bits; the service rounds anything below 2048 up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keysize: Option<u32>,
    /// Overwrite a previously accepted key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    #[serde(flatten)]
    pub credentials: Option<Credentials>,
}

#[derive(Serialize)]
struct KeyGenForm<'a> {
    mid: &'a str,
    #[serde(flatten)]
    options: &'a KeyGenOptions,
}

fn resource_path(base: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{base}/{}", id.trim_start_matches('/')),
        None => base.to_owned(),
    }
}

impl<T: Transport> Client<T> {
    async fn get_json(&self, path: String) -> Result<Value, ApiError> {
        self.session()
            .send(ApiRequest::get(path), &AuthOverride::None)
            .await?
            .json()
    }

    /// List fleet members, or describe one.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip(self))]
    pub async fn minions(&self, id: Option<&str>) -> Result<Value, ApiError> {
        self.get_json(resource_path("minions", id)).await
    }

    /// List recent jobs, or look one up by id.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip(self))]
    pub async fn jobs(&self, jid: Option<&str>) -> Result<Value, ApiError> {
        self.get_json(resource_path("jobs", jid)).await
    }

    /// Poll an async job. Every call is a fresh lookup; a job the service has
    /// already expired comes back in whatever shape the service returns.
    ///
    /// # Errors
    /// Same as [`Client::jobs`].
    pub async fn job(&self, handle: &JobHandle) -> Result<Value, ApiError> {
        self.jobs(Some(handle.job_id())).await
    }

    /// List accepted/pending keys, or show one member's key.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip(self))]
    pub async fn keys(&self, id: Option<&str>) -> Result<Value, ApiError> {
        self.get_json(resource_path("keys", id)).await
    }

    /// Service statistics.
    ///
    /// # Errors
    /// Transport errors, or `DecodeFailure` if the body is not JSON.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<Value, ApiError> {
        self.get_json("stats".to_owned()).await
    }

    /// Fire a webhook event. The response body is ignored.
    ///
    /// # Errors
    /// Transport errors.
    #[instrument(skip(self, body))]
    pub async fn hook(&self, path: &str, body: Value) -> Result<(), ApiError> {
        self.session()
            .send(
                ApiRequest::post(resource_path("hook", Some(path))).body(body),
                &AuthOverride::None,
            )
            .await?;
        Ok(())
    }

    /// Generate and accept a key pair for `mid`; returns the tar archive
    /// exactly as served.
    ///
    /// # Errors
    /// Transport errors.
    #[instrument(skip(self, options))]
    pub async fn key_gen(&self, mid: &str, options: &KeyGenOptions) -> Result<Bytes, ApiError> {
        let form = encode_body(&KeyGenForm { mid, options })?;
        let response = self
            .session()
            .send(
                ApiRequest::post("keys")
                    .body(form)
                    .header("Accept", "application/x-tar"),
                &AuthOverride::None,
            )
            .await?;
        Ok(response.bytes())
    }
}
