//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

use cadence_core::error::EngineError;

/// Errors from reading or writing a state snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file is not valid state JSON.
    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot was written by a newer format.
    #[error("snapshot {path} has format version {found}, this build reads up to {supported}")]
    UnsupportedFormat {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    /// Another process saved the snapshot since this store loaded it.
    #[error("snapshot {path} moved to generation {found} since it was loaded at {expected}")]
    Stale {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    /// Another process held the commit lock for too long.
    #[error("timed out waiting for commit lock {path}")]
    Locked { path: PathBuf },
}

impl StoreError {
    /// Whether reloading and re-applying the change may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Stale { .. } | StoreError::Locked { .. })
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e.to_string())
    }
}
