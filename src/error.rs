//! Error types for the event sorter

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for event sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the event sorter
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Permission denied for {path}: {source}")]
    Permission { path: PathBuf, source: io::Error },

    #[error("IO error on {path}: {source}")]
    PathIo { path: PathBuf, source: io::Error },

    #[error("Failed to move {from} to {to}: {message}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to extract video metadata from {path}: {message}")]
    VideoMetadata { path: PathBuf, message: String },

    #[error("Capture time {timestamp} of {path} is outside the accepted range")]
    TimestampOutOfRange { path: PathBuf, timestamp: String },

    #[error("FFprobe not found. Please install FFmpeg and ensure ffprobe is in PATH")]
    FfprobeNotFound,

    #[error("File hash computation failed for {path}: {message}")]
    HashComputation { path: PathBuf, message: String },

    #[error("{path} is not a media folder: {reason}")]
    NotMediaFolder { path: PathBuf, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Coarse classification used by the reporting and abort policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Unreadable or unwritable path
    Permission,
    /// Move, copy, delete or read failure
    Io,
    /// Structural precondition violated
    Validation,
    /// Embedded metadata could not be extracted; always recovered
    Metadata,
}

impl ErrorKind {
    /// Critical errors stop the pipeline unless continue mode is enabled
    pub fn is_critical(self) -> bool {
        !matches!(self, ErrorKind::Metadata)
    }
}

impl Error {
    /// Wrap an IO error that happened on a specific path, separating
    /// permission problems from other IO failures
    pub fn io_at(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Error::Permission {
                path: path.to_path_buf(),
                source,
            }
        } else {
            Error::PathIo {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            Error::Permission { .. } => ErrorKind::Permission,
            Error::WalkDir(e)
                if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::PermissionDenied) =>
            {
                ErrorKind::Permission
            }
            Error::Io(_)
            | Error::PathIo { .. }
            | Error::Move { .. }
            | Error::HashComputation { .. }
            | Error::Serialization(_)
            | Error::WalkDir(_)
            | Error::Prompt(_) => ErrorKind::Io,
            Error::ExifRead { .. }
            | Error::VideoMetadata { .. }
            | Error::TimestampOutOfRange { .. }
            | Error::FfprobeNotFound => ErrorKind::Metadata,
            Error::NotMediaFolder { .. } | Error::Validation(_) | Error::Config(_) => {
                ErrorKind::Validation
            }
        }
    }

    /// Path the error refers to, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Permission { path, .. }
            | Error::PathIo { path, .. }
            | Error::ExifRead { path, .. }
            | Error::VideoMetadata { path, .. }
            | Error::TimestampOutOfRange { path, .. }
            | Error::HashComputation { path, .. }
            | Error::NotMediaFolder { path, .. } => Some(path),
            Error::Move { from, .. } => Some(from),
            Error::WalkDir(e) => e.path(),
            _ => None,
        }
    }
}

/// Structured error entry returned to the caller instead of being printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl From<&Error> for ErrorRecord {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            path: error.path().map(Path::to_path_buf),
            message: error.to_string(),
        }
    }
}

impl From<Error> for ErrorRecord {
    fn from(error: Error) -> Self {
        Self::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_classified() {
        let err = Error::io_at(
            Path::new("/locked"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.path(), Some(Path::new("/locked")));

        let err = Error::io_at(
            Path::new("/gone"),
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_metadata_errors_are_not_critical() {
        let err = Error::ExifRead {
            path: PathBuf::from("a.jpg"),
            message: "no exif".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Metadata);
        assert!(!err.kind().is_critical());
        assert!(ErrorKind::Validation.is_critical());
    }

    #[test]
    fn test_error_record_from_error() {
        let err = Error::NotMediaFolder {
            path: PathBuf::from("/x"),
            reason: "contains notes.txt".into(),
        };
        let record = ErrorRecord::from(&err);
        assert_eq!(record.kind, ErrorKind::Validation);
        assert_eq!(record.path, Some(PathBuf::from("/x")));
        assert!(record.message.contains("notes.txt"));
    }
}
