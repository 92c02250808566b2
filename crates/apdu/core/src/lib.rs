//! Core types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-4.
//!
//! ## Overview
//!
//! - [`Command`] models a short command APDU in one of the four framing cases
//!   (1, 2S, 3S, 4S) and serializes it byte-for-byte.
//! - [`Response`] splits a raw response into payload and [`StatusWord`], and
//!   maps status words onto the named [`Status`] table.
//! - [`CardTransport`] is the seam to whatever moves bytes to a card.
//!
//! Extended length framing is not supported: every constructor and mutator
//! rejects command data longer than 255 bytes.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod transport;

mod error;
pub use error::{Error, Result};

pub use command::{Command, MAX_DATA_LENGTH};
pub use response::status::{Status, StatusWord};
pub use response::{MAX_RESPONSE_LENGTH, Response};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Error, Response, Result,
        response::status::{Status, StatusWord},
        transport::{CardTransport, TransportError},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::case1(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xA4);
        assert_eq!(cmd.p1(), 0x04);
        assert_eq!(cmd.p2(), 0x00);

        let resp = Response::from_bytes(&[0x01, 0x02, 0x03, 0x90, 0x00]).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03][..]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
