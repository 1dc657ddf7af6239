//! Staged results of a batched dispatch.

use std::iter::FusedIterator;

use futures::Stream;
use serde_json::Value;

/// Per-stage results in the order the service returned them.
///
/// Single pass: once exhausted it keeps returning `None`. Re-running the
/// stages needs a new dispatch.
#[derive(Debug)]
pub struct BatchResults {
    stages: std::vec::IntoIter<Value>,
}

impl BatchResults {
    pub(crate) fn new(stages: Vec<Value>) -> Self {
        Self {
            stages: stages.into_iter(),
        }
    }

    /// Consume the remaining stages as a stream.
    pub fn into_stream(self) -> impl Stream<Item = Value> + Send + Unpin {
        futures::stream::iter(self)
    }
}

impl Iterator for BatchResults {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.stages.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stages.size_hint()
    }
}

impl ExactSizeIterator for BatchResults {}

impl FusedIterator for BatchResults {}
