//! APDU response definitions
//!
//! A response is the card's answer to a command: an optional payload followed
//! by the two status bytes SW1 SW2.

pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{Error, Result};
use status::{Status, StatusWord};

/// Largest raw response short framing can carry (256 payload bytes plus SW)
pub const MAX_RESPONSE_LENGTH: usize = 258;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Response {
    /// Response payload data, empty when the card returned only a status word
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self::new(payload, status::common::SUCCESS)
    }

    /// Parse response from raw bytes (payload followed by SW1 SW2)
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 || raw.len() > MAX_RESPONSE_LENGTH {
            return Err(Error::InvalidResponseLength(raw.len()));
        }

        let (payload, sw) = raw.split_at(raw.len() - 2);
        let status = StatusWord::new(sw[0], sw[1]);

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Response payload, without the status word
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Status word as a tuple (SW1, SW2)
    pub const fn status_tuple(&self) -> (u8, u8) {
        (self.status.sw1, self.status.sw2)
    }

    /// Named status plus SW2 when SW2 carries information
    pub const fn status_with_info(&self) -> (Status, Option<u8>) {
        self.status.status_with_info()
    }

    /// Check if the response indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Serialize back to raw bytes: payload followed by SW1 SW2
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.payload.len() + 2);
        buffer.put_slice(&self.payload);
        buffer.put_u8(self.status.sw1);
        buffer.put_u8(self.status.sw2);
        buffer.freeze()
    }

    /// Consume the response, returning its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(data: Bytes) -> Result<Self> {
        Self::from_bytes(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_parse_status_only() {
        let resp = Response::from_bytes(&hex!("9000")).unwrap();
        assert!(resp.payload().is_empty());
        assert!(resp.is_success());
        assert_eq!(resp.status_with_info(), (Status::Success, None));
    }

    #[test]
    fn test_parse_with_payload() {
        let resp = Response::from_bytes(&hex!("0102036985")).unwrap();
        assert_eq!(resp.payload(), &hex!("010203"));
        assert!(!resp.is_success());
        assert_eq!(resp.status_tuple(), (0x69, 0x85));
        assert_eq!(resp.status().status(), Status::ConditionsOfUseNotSatisfied);
    }

    #[test]
    fn test_parse_more_data() {
        let resp = Response::from_bytes(&hex!("6110")).unwrap();
        assert_eq!(resp.status_with_info(), (Status::DataAvailable, Some(0x10)));
    }

    #[test]
    fn test_length_bounds() {
        assert!(matches!(
            Response::from_bytes(&[]),
            Err(Error::InvalidResponseLength(0))
        ));
        assert!(matches!(
            Response::from_bytes(&[0x90]),
            Err(Error::InvalidResponseLength(1))
        ));

        let mut max = vec![0xAA; 256];
        max.extend_from_slice(&[0x90, 0x00]);
        let resp = Response::from_bytes(&max).unwrap();
        assert_eq!(resp.payload().len(), 256);

        max.insert(0, 0xAA);
        assert!(matches!(
            Response::from_bytes(&max),
            Err(Error::InvalidResponseLength(259))
        ));
    }

    #[test]
    fn test_to_bytes() {
        let raw = hex!("E30E4F05A0000000019F700107C501009000");
        let resp = Response::try_from(&raw[..]).unwrap();
        assert_eq!(resp.to_bytes().as_ref(), raw);

        let resp = Response::new(Bytes::new(), 0x6A86u16);
        assert_eq!(resp.to_bytes().as_ref(), hex!("6A86"));
    }
}
