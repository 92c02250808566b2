//! Application privileges as coded in the registry
//!
//! Privileges are carried in one to three bytes. The first byte is always
//! present; the second and third are only emitted when one of their bits is
//! set.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::{Error, Result};

/// Privilege bit set, stored as the three coding bytes packed big-endian
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Privileges(u32);

impl Privileges {
    /// Security Domain
    pub const SECURITY_DOMAIN: Self = Self::byte1(0x80);
    /// Security Domain with DAP Verification
    pub const DAP_VERIFICATION: Self = Self::byte1(0xC0);
    /// Security Domain with Mandated DAP Verification
    pub const MANDATED_DAP_VERIFICATION: Self = Self::byte1(0xC1);
    /// Security Domain with Delegated Management
    pub const DELEGATED_MANAGEMENT: Self = Self::byte1(0xA0);
    /// Card Lock
    pub const CARD_LOCK: Self = Self::byte1(0x10);
    /// Card Terminate
    pub const CARD_TERMINATE: Self = Self::byte1(0x08);
    /// Card Reset
    pub const CARD_RESET: Self = Self::byte1(0x04);
    /// CVM Management
    pub const CVM_MANAGEMENT: Self = Self::byte1(0x02);

    /// Trusted Path
    pub const TRUSTED_PATH: Self = Self::byte2(0x80);
    /// Authorized Management
    pub const AUTHORIZED_MANAGEMENT: Self = Self::byte2(0x40);
    /// Token Management
    pub const TOKEN_MANAGEMENT: Self = Self::byte2(0x20);
    /// Global Delete
    pub const GLOBAL_DELETE: Self = Self::byte2(0x10);
    /// Global Lock
    pub const GLOBAL_LOCK: Self = Self::byte2(0x08);
    /// Global Registry
    pub const GLOBAL_REGISTRY: Self = Self::byte2(0x04);
    /// Final Application
    pub const FINAL_APPLICATION: Self = Self::byte2(0x02);
    /// Global Service
    pub const GLOBAL_SERVICE: Self = Self::byte2(0x01);

    /// Receipt Generation
    pub const RECEIPT_GENERATION: Self = Self::byte3(0x80);
    /// Ciphered Load File Data Block
    pub const CIPHERED_LOAD_FILE_DATA_BLOCK: Self = Self::byte3(0x40);
    /// Contactless Activation
    pub const CONTACTLESS_ACTIVATION: Self = Self::byte3(0x20);
    /// Contactless Self-Activation
    pub const CONTACTLESS_SELF_ACTIVATION: Self = Self::byte3(0x10);

    const fn byte1(bits: u8) -> Self {
        Self((bits as u32) << 16)
    }

    const fn byte2(bits: u8) -> Self {
        Self((bits as u32) << 8)
    }

    const fn byte3(bits: u8) -> Self {
        Self(bits as u32)
    }

    /// No privileges
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check whether every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse the one to three byte coding from a registry entry
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [b1] => Ok(Self::byte1(*b1)),
            [b1, b2] => Ok(Self(Self::byte1(*b1).0 | Self::byte2(*b2).0)),
            [b1, b2, b3] => Ok(Self(
                Self::byte1(*b1).0 | Self::byte2(*b2).0 | Self::byte3(*b3).0,
            )),
            _ => Err(Error::InvalidFormat("privileges must be 1 to 3 bytes")),
        }
    }

    /// Encode as one to three bytes, trailing zero bytes omitted
    pub fn to_bytes(&self) -> Vec<u8> {
        let [_, b1, b2, b3] = self.0.to_be_bytes();
        let mut bytes = vec![b1];
        if b2 != 0 || b3 != 0 {
            bytes.push(b2);
        }
        if b3 != 0 {
            bytes.push(b3);
        }
        bytes
    }
}

impl BitOr for Privileges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}
