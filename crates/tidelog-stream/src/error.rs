use std::io;

use tidelog_types::{BucketName, Sequence};

/// Errors produced by log stream backends.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// I/O error during WAL or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A WAL record before the tail failed its checksum or could not be decoded.
    #[error("corrupt WAL record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// A recovered entry does not continue its bucket's sequence.
    #[error("sequence mismatch in bucket {bucket}: expected {expected}, found {found}")]
    SequenceMismatch {
        bucket: BucketName,
        expected: Sequence,
        found: Sequence,
    },

    /// The stream has been shut down and cannot serve requests.
    #[error("log stream is shut down")]
    Shutdown,

    /// Failure reported by a remote or wrapped stream implementation.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Convenience alias used throughout the stream crate.
pub type StreamResult<T> = std::result::Result<T, StreamError>;
