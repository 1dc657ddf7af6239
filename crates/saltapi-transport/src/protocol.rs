//! Wire conventions: default headers and service-root URL handling.

use saltapi_core::ApiError;
use url::Url;

/// Header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Headers sent with every request; caller-supplied headers win.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("Content-Type", "application/json"),
    ("X-Requested-With", "XMLHttpRequest"),
];

/// Validated service root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoot {
    url: Url,
}

impl ServiceRoot {
    /// Parse and validate a service root.
    ///
    /// A missing trailing slash is added so that bare paths resolve
    /// beneath the root rather than replacing its last segment.
    ///
    /// # Errors
    /// Returns `MalformedEndpoint` unless `api_url` is an absolute
    /// `http`/`https` URL with a host.
    pub fn parse(api_url: &str) -> Result<Self, ApiError> {
        let mut url = Url::parse(api_url.trim())
            .map_err(|e| ApiError::MalformedEndpoint(format!("{api_url}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::MalformedEndpoint(format!(
                "{api_url}: missing http(s) protocol"
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ApiError::MalformedEndpoint(format!("{api_url}: missing host")));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_fragment(None);

        Ok(Self { url })
    }

    /// The root URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.url
    }

    /// Resolve `path` against the root with standard relative-URL rules.
    ///
    /// `/login` replaces the root's path; `login` is appended to it.
    ///
    /// # Errors
    /// Returns `MalformedEndpoint` if `path` cannot be joined.
    pub fn join(&self, path: &str) -> Result<Url, ApiError> {
        self.url
            .join(path)
            .map_err(|e| ApiError::MalformedEndpoint(format!("{path}: {e}")))
    }
}
