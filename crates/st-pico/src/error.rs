//! Error types for pico production and reading.

use thiserror::Error;

/// Errors raised by pico records, makers and the chain.
#[derive(Error, Debug)]
pub enum PicoError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ROOT container error
    #[error("ROOT error: {0}")]
    Root(#[from] st_root::RootError),

    /// A MuDst JSON line could not be parsed.
    #[error("MuDst line {line}: {source}")]
    Json {
        /// 1-based line number in the input.
        line: usize,
        /// Parser error.
        source: serde_json::Error,
    },

    /// Configuration file error
    #[error("config error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    /// Index outside a fixed-size array.
    #[error("{name}: index {index} out of range (size {len})")]
    IndexOutOfRange {
        /// Array name.
        name: String,
        /// Requested index.
        index: usize,
        /// Array size.
        len: usize,
    },

    /// A maker was driven out of order or found the event context incomplete.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Invalid configuration or record contents.
    #[error("validation error: {0}")]
    Validation(String),

    /// A maker in a chain failed.
    #[error("maker '{maker}' failed: {source}")]
    Maker {
        /// Name of the failing maker.
        maker: String,
        /// Underlying error.
        source: Box<PicoError>,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PicoError>;
