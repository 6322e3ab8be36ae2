//! Reconciler process errors.

use entity_store::StoreError;
use thiserror::Error;

/// Errors that stop the reconciler process.
///
/// Per-claim failures are not errors at this level; they are written to the
/// output stream and processing continues.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
