use thiserror::Error;

/// Error taxonomy for the capture -> analyze -> transmit pipeline.
///
/// `Configuration` and `InvalidGrid` are raised before the real-time loop
/// starts. `Acquisition` terminates the loop. `Transmission` is contained per
/// frame by the runtime and never escapes an iteration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{rows}x{cols} grid does not fit a {width}x{height} frame (each cell needs at least one pixel)")]
    InvalidGrid {
        rows: u32,
        cols: u32,
        width: u32,
        height: u32,
    },

    #[error("frame acquisition failed: {0}")]
    Acquisition(String),

    #[error("bundle transmission failed: {0}")]
    Transmission(#[source] std::io::Error),

    #[error("osc codec error: {0}")]
    Codec(String),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn acquisition(what: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Error::Acquisition(format!("{}: {}", what, err))
    }

    /// Whether the real-time loop may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Transmission(_))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
