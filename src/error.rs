use std::path::PathBuf;

use thiserror::Error;

use crate::model::ValidationError;

/// Result alias used throughout the crate.
pub(crate) type Result<T> = std::result::Result<T, IntakeError>;

/// Canonical error surface for the intake pipeline.
///
/// Validation failures never reach storage. Storage failures abort the
/// submission. Mirror failures (`MissingCredentials`, `RemoteService`) are
/// isolated by the ledger store so they can never undo or block a local
/// append that already succeeded.
#[derive(Debug, Error)]
pub(crate) enum IntakeError {
    #[error("I/O error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Ledger is corrupt at line {line}: {reason}")]
    CorruptLedger { line: usize, reason: String },

    #[error("Credential material missing or unreadable at {}; run 'intakeledger auth' once", .path.display())]
    MissingCredentials { path: PathBuf },

    #[error("Remote service error: {reason}")]
    RemoteService { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<std::io::Error> for IntakeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }
}

impl IntakeError {
    pub(crate) fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Mirror-side failures are reported informationally, never propagated
    /// out of an append.
    pub(crate) fn is_mirror_side(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials { .. } | Self::RemoteService { .. }
        )
    }
}
