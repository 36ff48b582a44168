//! Error and warning types for ctxpack.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::clipboard::ClipboardError;
use crate::extract::ExtractError;
use crate::filter::FilterError;
use crate::settings::SettingsError;

/// Top-level error type for ctxpack operations.
#[derive(Debug, thiserror::Error)]
pub enum CtxError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Map an error to its exit code.
pub fn exit_code(error: &CtxError) -> i32 {
    match error {
        CtxError::Extract(ExtractError::EmptySelection { .. }) => 3,
        CtxError::Extract(ExtractError::Cancelled) => 130,
        CtxError::Filter(_) => 2,
        CtxError::Settings(_) => 4,
        CtxError::Clipboard(_) => 5,
        CtxError::Io(_) => 1,
        CtxError::Json(_) => 1,
    }
}

/// A soft problem recorded during an extraction.
///
/// Warnings never abort the call; they travel with the result so the
/// host can surface them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The walk produced no included file.
    NoMatchingFiles,
    /// A path or directory entry could not be read.
    UnreadableEntry { path: PathBuf, reason: String },
    /// A file's bytes are not text.
    DecodeFailure { path: PathBuf },
    /// A selected root resolved to a path already walked.
    DuplicateRoot { path: PathBuf },
}

impl Warning {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Warning::UnreadableEntry {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoMatchingFiles => write!(f, "no files match the selected file types"),
            Warning::UnreadableEntry { path, reason } => {
                write!(f, "unreadable: {}: {}", path.display(), reason)
            }
            Warning::DecodeFailure { path } => {
                write!(f, "skipped binary file: {}", path.display())
            }
            Warning::DuplicateRoot { path } => {
                write!(f, "skipped duplicate selection: {}", path.display())
            }
        }
    }
}
