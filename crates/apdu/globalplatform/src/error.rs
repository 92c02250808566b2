//! Error types for GlobalPlatform operations

use nexum_apdu_core::StatusWord;
use thiserror::Error;

use crate::crypto::KeyType;
use crate::session::SessionState;
use crate::tlv::TlvError;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// APDU framing or transport errors
    #[error(transparent)]
    Core(#[from] nexum_apdu_core::Error),

    /// BER-TLV encoding errors
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(&'static str),

    /// Wrong data length
    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which input was rejected
        field: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A required session input was never provided
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Response from the card cannot be used
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),

    /// Data does not have the expected structure
    #[error("Invalid data format: {0}")]
    InvalidFormat(&'static str),

    /// Unsupported SCP version
    #[error("Unsupported SCP version: {0:#04x}")]
    UnsupportedScpVersion(u8),

    /// Key type without a defined check value computation
    #[error("Unsupported key type: {0:?}")]
    UnsupportedKeyType(KeyType),

    /// Key version outside 0 and 1..=0x7F
    #[error("Invalid key version: {0:#04x}")]
    InvalidKeyVersion(u8),

    /// Byte that does not code a known security level
    #[error("Invalid security level: {0:#04x}")]
    InvalidSecurityLevel(u8),

    /// Card cryptogram did not verify
    #[error(
        "Card cryptogram mismatch: expected {}, received {}",
        hex::encode_upper(.expected),
        hex::encode_upper(.received)
    )]
    CardCryptogramMismatch {
        /// Cryptogram computed by the host
        expected: [u8; 8],
        /// Cryptogram sent by the card
        received: [u8; 8],
    },

    /// Secure channel not established
    #[error("Secure channel not established")]
    NotEstablished,

    /// Operation not allowed in the current session state
    #[error("Session is {actual:?}, operation requires {expected:?}")]
    SessionState {
        /// State the operation requires
        expected: SessionState,
        /// State the session is in
        actual: SessionState,
    },

    /// Secured command data would not fit a short APDU
    #[error("Secured command data too large: {len} bytes (max {max})")]
    SecuredDataTooLarge {
        /// Length of the secured data field
        len: usize,
        /// Largest length short framing can carry
        max: usize,
    },

    /// Response indicates an error condition
    #[error("Card returned error status: {0}")]
    CardStatus(StatusWord),
}

/// Broad classification of [`Error`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied an input of the wrong size or range
    Validation,
    /// Bytes do not follow the expected encoding
    Encoding,
    /// The card or the session did not behave as the protocol requires
    Protocol,
    /// Mode, version or key type outside what is implemented
    UnsupportedMode,
    /// The transport failed to move bytes
    Transport,
}

impl Error {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(nexum_apdu_core::Error::Transport(_)) => ErrorKind::Transport,
            Self::Core(
                nexum_apdu_core::Error::InvalidCommandLength(_)
                | nexum_apdu_core::Error::InvalidResponseLength(_),
            )
            | Self::Tlv(_)
            | Self::InvalidFormat(_) => ErrorKind::Encoding,
            Self::Core(_)
            | Self::Crypto(_)
            | Self::InvalidLength { .. }
            | Self::MissingField(_)
            | Self::InvalidKeyVersion(_)
            | Self::InvalidSecurityLevel(_)
            | Self::SecuredDataTooLarge { .. } => ErrorKind::Validation,
            Self::InvalidResponse(_)
            | Self::CardCryptogramMismatch { .. }
            | Self::NotEstablished
            | Self::SessionState { .. }
            | Self::CardStatus(_) => ErrorKind::Protocol,
            Self::UnsupportedScpVersion(_) | Self::UnsupportedKeyType(_) => {
                ErrorKind::UnsupportedMode
            }
        }
    }

    /// Check that `data` is exactly `expected` bytes long
    pub(crate) fn check_length(
        field: &'static str,
        data: &[u8],
        expected: usize,
    ) -> Result<()> {
        if data.len() == expected {
            Ok(())
        } else {
            Err(Self::InvalidLength {
                field,
                expected,
                actual: data.len(),
            })
        }
    }
}
