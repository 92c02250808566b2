//! Error types for APDU framing

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for core APDU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or parsing APDUs
#[derive(Debug, Error)]
pub enum Error {
    /// Command data does not fit short framing
    #[error("Command data too large: {len} bytes (max {max})")]
    DataTooLarge {
        /// Offending data length
        len: usize,
        /// Largest length short framing can carry
        max: usize,
    },

    /// Le must be encoded on exactly one byte
    #[error("Le must be exactly 1 byte, got {0}")]
    InvalidLe(usize),

    /// Le was set on a command framed without an Le slot
    #[error("Le is not present in this command")]
    LeNotPresent,

    /// Raw command bytes do not describe a short APDU
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Raw response is shorter than a status word or longer than 258 bytes
    #[error("Invalid response length: {0} (expected 2..=258)")]
    InvalidResponseLength(usize),

    /// Error raised by the transport
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Create a data too large error against the short APDU limit
    pub const fn data_too_large(len: usize) -> Self {
        Self::DataTooLarge {
            len,
            max: crate::command::MAX_DATA_LENGTH,
        }
    }
}
