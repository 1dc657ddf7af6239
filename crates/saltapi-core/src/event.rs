//! Fleet events from the server-push feed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One fleet activity notification.
///
/// ```json
/// {"tag": "salt/run/20170731163229231910/new",
///  "data": {"_stamp": "2017-07-31T20:32:29.691100", "fun": "runner.manage.status",
///           "fun_args": [], "jid": "20170731163229231910", "user": "astro73"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEvent {
    /// Event tag, a `/`-separated path.
    pub tag: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl FleetEvent {
    /// Returns `true` if the tag starts with `prefix`.
    #[must_use]
    pub fn matches(&self, prefix: &str) -> bool {
        self.tag.starts_with(prefix)
    }

    /// The job id carried by the payload, if any.
    #[must_use]
    pub fn jid(&self) -> Option<&str> {
        self.data.get("jid").and_then(Value::as_str)
    }
}
