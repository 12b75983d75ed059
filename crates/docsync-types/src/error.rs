//! Error types and handling for DocuSync
//!
//! This module provides the error taxonomy shared by every stage of the
//! reconciliation engine. Errors are split by how far they propagate:
//! root-level failures stop the operation in progress, entry-level and
//! action-level failures are recorded and the operation continues.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - the current item failed, the operation continues
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - the operation cannot make progress at all
    Critical,
}

/// Main error type for DocuSync operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// A root does not exist, is not a readable directory, or vanished mid-run
    #[error("Root unavailable: {path}: {message}")]
    RootUnavailable {
        /// Path of the root
        path: PathBuf,
        /// Underlying reason
        message: String,
    },

    /// A single entry could not be stat'd, read or hashed
    #[error("Entry unreadable: {path}: {message}")]
    EntryUnreadable {
        /// Path of the entry
        path: PathBuf,
        /// Underlying reason
        message: String,
    },

    /// Post-copy hash differs from the expected source hash
    #[error("Verification mismatch for {path}: expected {expected}, got {actual}")]
    VerificationMismatch {
        /// Path that was verified
        path: PathBuf,
        /// Expected content hash (hex)
        expected: String,
        /// Actual content hash (hex)
        actual: String,
    },

    /// A non-overwriting action found its destination already occupied
    #[error("Destination already exists: {path}")]
    DestinationExists {
        /// Occupied destination path
        path: PathBuf,
    },

    /// A path could not be expressed relative to its root
    #[error("Invalid path: {message}")]
    InvalidPath {
        /// Description of the problem
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Root-level availability errors
    Root,
    /// Entry-level read errors
    Entry,
    /// Verification errors
    Verification,
    /// I/O related errors
    Io,
    /// Configuration errors
    Config,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RootUnavailable { .. } => ErrorKind::Root,
            Self::EntryUnreadable { .. } => ErrorKind::Entry,
            Self::VerificationMismatch { .. } => ErrorKind::Verification,
            Self::DestinationExists { .. } | Self::InvalidPath { .. } | Self::Io { .. } => {
                ErrorKind::Io
            }
            Self::Config { .. } => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RootUnavailable { .. } => ErrorSeverity::Critical,
            Self::EntryUnreadable { .. } => ErrorSeverity::Low,
            Self::VerificationMismatch { .. } => ErrorSeverity::Medium,
            Self::DestinationExists { .. } => ErrorSeverity::Medium,
            Self::InvalidPath { .. } => ErrorSeverity::Medium,
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::Config { .. } => ErrorSeverity::High,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Check if the operation can continue past this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RootUnavailable { .. } | Self::Config { .. } | Self::Cancelled => false,
            Self::EntryUnreadable { .. }
            | Self::VerificationMismatch { .. }
            | Self::DestinationExists { .. }
            | Self::InvalidPath { .. }
            | Self::Io { .. }
            | Self::Other { .. } => true,
        }
    }

    /// Check if this error must stop the whole operation
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Create a new root-unavailable error
    pub fn root_unavailable<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::RootUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new entry-unreadable error
    pub fn entry_unreadable<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::EntryUnreadable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid-path error
    pub fn invalid_path<S: Into<String>>(message: S) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_recoverable_errors_are_never_critical(message in ".*") {
            let errors = vec![
                Error::entry_unreadable("/a", message.clone()),
                Error::Io { message: message.clone() },
                Error::invalid_path(message.clone()),
                Error::other(message.clone()),
            ];

            for error in errors {
                prop_assert!(error.is_recoverable());
                prop_assert!(error.severity() < ErrorSeverity::Critical);
            }
        }
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[test]
    fn test_root_unavailable_is_fatal() {
        let error = Error::root_unavailable("/mnt/usb", "No such file or directory");

        assert_eq!(error.kind(), ErrorKind::Root);
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert!(error.is_fatal());
        assert!(error.to_string().contains("/mnt/usb"));
    }

    #[test]
    fn test_verification_mismatch_is_recoverable() {
        let error = Error::VerificationMismatch {
            path: PathBuf::from("/b/report.pdf"),
            expected: "00ff".to_string(),
            actual: "ff00".to_string(),
        };

        assert_eq!(error.kind(), ErrorKind::Verification);
        assert!(error.is_recoverable());
        assert!(error.to_string().contains("expected 00ff"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "test file");
        let error = Error::from(io_error);

        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.to_string().contains("test file"));
    }

    #[test]
    fn test_cancelled_error() {
        let error = Error::Cancelled;

        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert!(!error.is_recoverable());
    }
}
