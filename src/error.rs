//! Error types for HDF4 read operations.

use thiserror::Error;

/// All errors that can occur when reading an HDF4 file.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying file handle.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A requested section violates the variable's shape or the range rules.
    #[error("Invalid section: {reason}")]
    InvalidSection { reason: String },

    /// A byte source ended before the read demand was met.
    #[error("Byte source ended at offset {offset}, {needed} more bytes needed")]
    Truncated { offset: u64, needed: u64 },

    /// Compression scheme or storage combination the reader does not handle.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The read was cancelled through its cancellation token.
    #[error("Read cancelled")]
    Cancelled,

    /// Invariant violation; never expected on well-formed files.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The file's directory structure is malformed.
    #[error("Invalid file structure: {0}")]
    InvalidFileStructure(String),

    /// Requested variable does not exist in the directory.
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Typed access with the wrong element type or array kind.
    #[error("Type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },
}

impl Error {
    pub(crate) fn invalid_section(reason: impl Into<String>) -> Self {
        Error::InvalidSection {
            reason: reason.into(),
        }
    }
}
