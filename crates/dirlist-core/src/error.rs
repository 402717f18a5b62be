//! Error types for listing operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read one directory or container.
///
/// The scan job never aborts on these; a failing directory simply
/// contributes no entries.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Cannot read {path}: permission denied")]
    PermissionDenied { path: PathBuf },

    #[error("Cannot read {path}: no such file or directory")]
    NotFound { path: PathBuf },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Listed path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Extension is not one of the supported container formats.
    #[error("Not a container: {path}")]
    NotAContainer { path: PathBuf },

    /// Container could be opened but not decoded.
    #[error("Corrupt container {path}: {message}")]
    CorruptContainer { path: PathBuf, message: String },
}

impl ScanError {
    /// Attach a path to an I/O error, keeping the common kinds apart.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::CorruptContainer {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Path the error refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::NotADirectory { path }
            | Self::NotAContainer { path }
            | Self::CorruptContainer { path, .. } => path,
        }
    }
}

/// Errors surfaced by the file list facade.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Invalid list configuration: {message}")]
    InvalidConfig { message: String },

    /// No job scheduler could start the read job.
    #[error("Failed to start read job: {message}")]
    JobStart { message: String },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds() {
        let err = ScanError::io(
            "/srv/private",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
        assert_eq!(err.path(), &PathBuf::from("/srv/private"));

        let err = ScanError::io("/srv/gone", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, ScanError::NotFound { .. }));

        let err = ScanError::io("/srv/odd", io::Error::other("boom"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_list_error_wraps_scan_error() {
        let err: ListError = ScanError::corrupt("/data/pack.zip", "bad header").into();
        assert_eq!(err.to_string(), "Corrupt container /data/pack.zip: bad header");
    }
}
