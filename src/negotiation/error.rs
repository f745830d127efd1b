//! Negotiation error types.

use crate::error::Error;
use thiserror::Error;

/// Error while setting up an output port.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The peer refused every format the stream can be delivered in.
    #[error("port {port}: peer refused caps for {mime}")]
    Refused {
        /// Output port name.
        port: String,
        /// Mime type of the stream.
        mime: String,
    },

    /// The peer answered with caps of another media kind.
    #[error("port {port}: peer answered with mismatching caps")]
    KindMismatch {
        /// Output port name.
        port: String,
    },

    /// None of the plugin's bitstream layouts is accepted by the peer.
    #[error("port {port}: no common bitstream format")]
    NoBitstreamFormat {
        /// Output port name.
        port: String,
    },

    /// The peer could not be configured with the negotiated parameters.
    #[error("port {port}: configuration rejected")]
    ConfigureFailed {
        /// Output port name.
        port: String,
    },
}

impl From<NegotiationError> for Error {
    fn from(err: NegotiationError) -> Self {
        Error::UnsupportedFormat(err.to_string())
    }
}
