//! Error taxonomy for the harness.
//!
//! Most code propagates `anyhow::Result` with context attached, the same way the
//! loaders and workers do. The variants below mark the conditions callers need to
//! tell apart (fatal load/probe failures versus genuine scheduler defects) and can
//! be recovered with `err.downcast_ref::<HarnessError>()`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Source data is missing, truncated or smaller than its declared record count.
    #[error("failed to load dataset from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// CPU or memory sampling is unavailable.
    #[error("resource probe failed: {0}")]
    Probe(String),

    /// The worker pool did not drain within the bounded termination wait.
    #[error("{strategy} did not terminate within {waited:?}; workers are hung")]
    TerminationTimeout {
        strategy: &'static str,
        waited: Duration,
    },

    /// A worker's transform step failed or panicked.
    #[error("transform failed on batch {batch} (worker {worker})")]
    TransformFailure {
        batch: usize,
        worker: String,
        #[source]
        source: anyhow::Error,
    },

    /// The pool drained without error but some batches never came back.
    #[error("scheduler drained {received} of {expected} batches")]
    IncompleteDrain { expected: usize, received: usize },

    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),
}

impl HarnessError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
