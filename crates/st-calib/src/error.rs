//! Error types for calibration filling and extraction.

use thiserror::Error;

/// Calibration error type.
#[derive(Error, Debug)]
pub enum CalibError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ROOT container error (a missing histogram is `KeyNotFound`).
    #[error("ROOT error: {0}")]
    Root(#[from] st_root::RootError),

    /// Pico record or maker error
    #[error(transparent)]
    Pico(#[from] st_pico::PicoError),

    /// Recipe or config parse error
    #[error("config error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    /// A table value cannot be written as a C literal.
    #[error("{table}{index:?} is {value}, not a finite number")]
    NonFinite {
        /// Table name.
        table: String,
        /// Position in the table.
        index: Vec<usize>,
        /// Offending value.
        value: f64,
    },

    /// A histogram does not reach the last bin a table needs.
    #[error("histogram '{histogram}' has {have} bins, table needs bin {need}")]
    TooFewBins {
        /// Histogram name.
        histogram: String,
        /// Highest bin read.
        need: usize,
        /// Bins present.
        have: usize,
    },

    /// Table shape or index mismatch.
    #[error("shape error: {0}")]
    Shape(String),

    /// No built-in recipe of that name.
    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalibError>;

impl From<CalibError> for st_pico::PicoError {
    fn from(e: CalibError) -> Self {
        match e {
            CalibError::Io(e) => Self::Io(e),
            CalibError::Root(e) => Self::Root(e),
            CalibError::Pico(e) => e,
            CalibError::Config(e) => Self::Config(e),
            other => Self::Validation(other.to_string()),
        }
    }
}
