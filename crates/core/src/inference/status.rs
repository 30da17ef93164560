use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::inference::error::InferenceError;
use crate::inference::verdict::InferenceResult;

/// The latest known classification outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum InferenceStatus {
    /// Nothing has completed yet.
    Pending,
    NoFace,
    Verdict(InferenceResult),
    Error(InferenceError),
}

impl fmt::Display for InferenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceStatus::Pending => write!(f, "N/A"),
            InferenceStatus::NoFace => write!(f, "No Face"),
            InferenceStatus::Verdict(r) => write!(f, "{} ({:.2})", r.label, r.confidence),
            InferenceStatus::Error(_) => write!(f, "Error during inference"),
        }
    }
}

/// A published status together with its publication number.
///
/// `generation` starts at 0 for the initial [`InferenceStatus::Pending`] and
/// increases by one per publish, so readers can tell fresh results apart.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub status: InferenceStatus,
    pub generation: u64,
}

/// Shared cell holding the last published [`InferenceStatus`].
///
/// Cloning yields another handle to the same cell. Writes replace the whole
/// snapshot under the lock, so readers never see a torn value.
#[derive(Clone, Debug)]
pub struct StatusSink {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusSnapshot {
                status: InferenceStatus::Pending,
                generation: 0,
            })),
        }
    }

    pub fn publish(&self, status: InferenceStatus) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.generation += 1;
        guard.status = status;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current(&self) -> InferenceStatus {
        self.snapshot().status
    }

    pub fn generation(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }
}

impl Default for StatusSink {
    fn default() -> Self {
        Self::new()
    }
}
