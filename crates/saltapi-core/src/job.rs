//! Handle to an asynchronously dispatched job.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Job identifier returned by an async dispatch.
///
/// Carries no state beyond the id; every poll is a fresh lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle {
    job_id: String,
}

impl JobHandle {
    /// Wrap a job id.
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }

    /// The job id.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id)
    }
}
