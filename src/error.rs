//! Error types for Strata
//!
//! Provides a unified error type for all operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for Strata operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while opening, mapping or reading a data file
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Load-time Errors
    // -------------------------------------------------------------------------
    /// The persisted access-mode marker disagrees with the configured mode.
    /// Fatal: boundaries computed under one mode are not meaningful under another.
    #[error(
        "Cannot deserialize segment bounds: access mode was changed (stored {stored:?}, configured {configured:?})"
    )]
    AccessModeMismatch { stored: String, configured: String },

    #[error("Corrupted file {} at offset {offset}: {reason}", path.display())]
    Corruption {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Protocol Misuse
    // -------------------------------------------------------------------------
    #[error("Position {position} is out of bounds for length {length}")]
    PositionOutOfBounds { position: u64, length: u64 },

    #[error("Segmented file {} has been cleaned up", path.display())]
    Closed { path: PathBuf },

    #[error("Empty segment returned at position {position}")]
    StalledSegment { position: u64 },
}

impl StrataError {
    /// Wrap an I/O failure with the path it happened on
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        StrataError::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corruption(path: &Path, offset: u64, reason: impl Into<String>) -> Self {
        StrataError::Corruption {
            path: path.to_path_buf(),
            offset,
            reason: reason.into(),
        }
    }

    pub fn closed(path: &Path) -> Self {
        StrataError::Closed {
            path: path.to_path_buf(),
        }
    }

    /// True for errors that make the whole file unreadable under the current config
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StrataError::AccessModeMismatch { .. } | StrataError::Corruption { .. }
        )
    }
}
