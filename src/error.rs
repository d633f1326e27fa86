// src/error.rs
use std::path::PathBuf;

/// Everything that can go wrong in a sync run.
///
/// `SourceFormat`, `SourceRead` and `RootMissing` are fatal and abort the run
/// before any page is touched. `MalformedPage` and `Io` on a page are caught
/// per item by the batch runner.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source {source_name} is missing required column(s): {}", missing.join(", "))]
    SourceFormat {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("could not read source {source_name}: {message}")]
    SourceRead {
        source_name: String,
        message: String,
    },

    #[error("site root not found: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("malformed page {}: {reason}", path.display())]
    MalformedPage { path: PathBuf, reason: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize report: {0}")]
    Report(#[from] serde_json::Error),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedPage { path: path.into(), reason: reason.into() }
    }

    /// Fatal errors end the run without a report.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceFormat { .. } | Self::SourceRead { .. } | Self::RootMissing(_)
        )
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
