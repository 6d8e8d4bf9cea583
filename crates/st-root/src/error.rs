//! Error types for ROOT container I/O.

use thiserror::Error;

/// Errors raised while reading or writing a ROOT file.
#[derive(Error, Debug)]
pub enum RootError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the `root` magic, or is too short to hold a header.
    #[error("not a ROOT file (bad magic or truncated header)")]
    BadMagic,

    /// A read ran past the end of the buffer.
    #[error("buffer underflow at offset {offset}: need {need} bytes, have {have}")]
    BufferUnderflow {
        /// Position of the failed read.
        offset: usize,
        /// Bytes requested.
        need: usize,
        /// Bytes remaining.
        have: usize,
    },

    /// Compressed payload could not be inflated.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Payload could not be deflated.
    #[error("compression error: {0}")]
    Compression(String),

    /// A streamed object did not have the expected layout.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// No key with the given name in the directory.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The key holds a class this reader does not decode.
    #[error("unsupported class: {0}")]
    UnsupportedClass(String),

    /// The object cannot be represented in the output format.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RootError>;
