//! Static card keys and derived SCP02 session keys

use std::fmt;

use crate::{
    Error, Result,
    crypto::{Scp02Key, SequenceCounter, SessionKeyType, derive_session_key},
};

/// Length of every SCP02 key
pub const KEY_LENGTH: usize = 16;

/// Static keys shared with the card (ENC, MAC, DEK)
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct StaticKeys {
    enc: Scp02Key,
    mac: Scp02Key,
    dek: Scp02Key,
}

impl StaticKeys {
    /// Create a key set from its three keys
    pub const fn new(enc: Scp02Key, mac: Scp02Key, dek: Scp02Key) -> Self {
        Self { enc, mac, dek }
    }

    /// Create a key set where all keys are the same
    pub const fn from_single_key(key: Scp02Key) -> Self {
        Self::new(key, key, key)
    }

    /// Create a key set from slices, each of which must be 16 bytes
    pub fn from_slices(enc: &[u8], mac: &[u8], dek: &[u8]) -> Result<Self> {
        Ok(Self::new(
            key_from_slice("ENC key", enc)?,
            key_from_slice("MAC key", mac)?,
            key_from_slice("DEK key", dek)?,
        ))
    }

    /// Get the encryption key
    pub const fn enc(&self) -> &Scp02Key {
        &self.enc
    }

    /// Get the MAC key
    pub const fn mac(&self) -> &Scp02Key {
        &self.mac
    }

    /// Get the data encryption key
    pub const fn dek(&self) -> &Scp02Key {
        &self.dek
    }

    /// Derive the session keys for the given sequence counter
    ///
    /// S-ENC comes from the ENC key, C-MAC and R-MAC from the MAC key and the
    /// session DEK from the DEK key.
    pub fn derive(&self, sequence_counter: &SequenceCounter) -> Result<SessionKeys> {
        Ok(SessionKeys {
            enc: derive_session_key(&self.enc, SessionKeyType::SEnc, sequence_counter)?,
            c_mac: derive_session_key(&self.mac, SessionKeyType::CMac, sequence_counter)?,
            r_mac: derive_session_key(&self.mac, SessionKeyType::RMac, sequence_counter)?,
            dek: derive_session_key(&self.dek, SessionKeyType::Dek, sequence_counter)?,
        })
    }
}

impl fmt::Debug for StaticKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeys").finish_non_exhaustive()
    }
}

/// Session keys in use on an established channel
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "zeroize", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct SessionKeys {
    enc: Scp02Key,
    c_mac: Scp02Key,
    r_mac: Scp02Key,
    dek: Scp02Key,
}

impl SessionKeys {
    /// Create session keys from already derived values
    pub const fn new(enc: Scp02Key, c_mac: Scp02Key, r_mac: Scp02Key, dek: Scp02Key) -> Self {
        Self {
            enc,
            c_mac,
            r_mac,
            dek,
        }
    }

    /// Session encryption key (S-ENC)
    pub const fn enc(&self) -> &Scp02Key {
        &self.enc
    }

    /// Command MAC key (C-MAC)
    pub const fn c_mac(&self) -> &Scp02Key {
        &self.c_mac
    }

    /// Response MAC key (R-MAC)
    pub const fn r_mac(&self) -> &Scp02Key {
        &self.r_mac
    }

    /// Session data encryption key
    pub const fn dek(&self) -> &Scp02Key {
        &self.dek
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// Keys handed to a session: either card keys to derive from, or session keys
/// that were derived elsewhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySet {
    /// Static card keys, derived on establishment
    Static(StaticKeys),
    /// Session keys used as they are
    Session(SessionKeys),
}

impl From<StaticKeys> for KeySet {
    fn from(keys: StaticKeys) -> Self {
        Self::Static(keys)
    }
}

impl From<SessionKeys> for KeySet {
    fn from(keys: SessionKeys) -> Self {
        Self::Session(keys)
    }
}

fn key_from_slice(field: &'static str, key: &[u8]) -> Result<Scp02Key> {
    Error::check_length(field, key, KEY_LENGTH)?;
    let mut out = [0u8; KEY_LENGTH];
    out.copy_from_slice(key);
    Ok(out)
}
