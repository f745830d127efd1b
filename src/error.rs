//! Error types for mediagraph.

use thiserror::Error;

/// Result type alias using mediagraph's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for filter, plugin and memory operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A read could not be satisfied yet; more data may still arrive.
    ///
    /// Only produced while headers are being parsed. Plugins are expected to
    /// retry the read later.
    #[error("not enough data")]
    NotEnoughData,

    /// The stream is exhausted.
    #[error("end of stream")]
    EndOfStream,

    /// The operation is not valid in the current state.
    #[error("operation not valid in the current state")]
    WrongState,

    /// No plugin claims the stream, or downstream refused the format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A caller supplied an invalid argument.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A pushed buffer does not start where the buffered window ends.
    #[error("non-contiguous push: expected offset {expected}, got {actual}")]
    NonContiguousPush {
        /// Offset immediately after the last buffered byte.
        expected: u64,
        /// Offset supplied by the caller.
        actual: u64,
    },

    /// Memory allocation failed.
    #[error("memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Unclassified failure reported by a plugin or port.
    #[error("unknown error: {0}")]
    Unknown(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse, copyable classification of an [`Error`].
///
/// Carried by events, which must be cheap to clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotEnoughData`].
    NotEnoughData,
    /// See [`Error::EndOfStream`].
    EndOfStream,
    /// See [`Error::WrongState`].
    WrongState,
    /// See [`Error::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`Error::InvalidParameter`] and [`Error::NonContiguousPush`].
    InvalidParameter,
    /// See [`Error::AllocationFailed`].
    NoMemory,
    /// Anything else.
    Unknown,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotEnoughData => ErrorKind::NotEnoughData,
            Error::EndOfStream => ErrorKind::EndOfStream,
            Error::WrongState => ErrorKind::WrongState,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::InvalidParameter(_) | Error::NonContiguousPush { .. } => {
                ErrorKind::InvalidParameter
            }
            Error::AllocationFailed(_) => ErrorKind::NoMemory,
            Error::Unknown(_) | Error::Io(_) => ErrorKind::Unknown,
        }
    }

    /// Returns true for [`Error::EndOfStream`].
    pub fn is_eos(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Returns true for errors a plugin may recover from by retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NotEnoughData)
    }
}
