//! Cryptographic operations for GlobalPlatform SCP02 protocol
//!
//! This module provides implementations of the cryptographic operations
//! required for the SCP02 protocol, including key derivation, MAC calculation,
//! cryptogram generation and key check values.
//!
//! All DES based operations work on 8 byte blocks without implicit padding:
//! callers pad with [`pad`] where the protocol asks for it.

use aes::{Aes128, Aes192, Aes256};
use cipher::{
    Block, BlockCipher, BlockEncrypt, BlockEncryptMut, BlockSizeUser, InnerIvInit, Key, KeyInit,
    block_padding::{Iso7816, NoPadding, Padding},
    consts::U8,
    generic_array::GenericArray,
};
use des::{Des, TdesEde3};

use crate::{Error, Result};

/// DES block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// Two-key triple DES key
pub type Scp02Key = [u8; 16];
/// Sequence counter from INITIALIZE UPDATE
pub type SequenceCounter = [u8; 2];
/// Card challenge from INITIALIZE UPDATE
pub type CardChallenge = [u8; 6];
/// Host challenge sent with INITIALIZE UPDATE
pub type HostChallenge = [u8; 8];
/// Card or host cryptogram
pub type Cryptogram = [u8; 8];
/// Command MAC
pub type Scp02Mac = [u8; 8];

/// Block chaining mode for [`des_encrypt`] and [`tdes_encrypt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Electronic codebook
    Ecb,
    /// Cipher block chaining with the given IV
    Cbc([u8; BLOCK_SIZE]),
}

impl BlockMode {
    /// CBC with an all-zero IV
    pub const fn cbc_zero_iv() -> Self {
        Self::Cbc([0; BLOCK_SIZE])
    }
}

/// Purpose of an SCP02 session key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKeyType {
    /// Command MAC key
    CMac,
    /// Response MAC key
    RMac,
    /// Session encryption key
    SEnc,
    /// Data encryption key
    Dek,
}

impl SessionKeyType {
    /// Derivation constant placed after the leading `0x01`
    pub const fn purpose(self) -> u8 {
        match self {
            Self::CMac => 0x01,
            Self::RMac => 0x02,
            Self::SEnc => 0x82,
            Self::Dek => 0x81,
        }
    }
}

/// Which side's cryptogram to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptogramType {
    /// Sent by the card in the INITIALIZE UPDATE response
    Card,
    /// Sent by the host in EXTERNAL AUTHENTICATE
    Host,
}

/// GlobalPlatform key type coding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyType {
    /// DES, mode implicitly known
    Des = 0x80,
    /// Triple DES in CBC mode
    TripleDesCbc = 0x82,
    /// DES in ECB mode
    DesEcb = 0x83,
    /// DES in CBC mode
    DesCbc = 0x84,
    /// AES
    Aes = 0x88,
    /// HMAC-SHA1
    HmacSha1 = 0x90,
    /// HMAC-SHA1-160
    HmacSha1_160 = 0x91,
    /// RSA public key, public exponent e
    RsaPublicE = 0xA0,
    /// RSA public key, modulus N
    RsaPublicN = 0xA1,
    /// RSA private key, modulus N
    RsaPrivateN = 0xA2,
    /// RSA private key, private exponent d
    RsaPrivateD = 0xA3,
}

impl KeyType {
    /// Whether the key belongs to the DES family
    pub const fn is_des(self) -> bool {
        matches!(
            self,
            Self::Des | Self::TripleDesCbc | Self::DesEcb | Self::DesCbc
        )
    }
}

impl TryFrom<u8> for KeyType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x80 => Self::Des,
            0x82 => Self::TripleDesCbc,
            0x83 => Self::DesEcb,
            0x84 => Self::DesCbc,
            0x88 => Self::Aes,
            0x90 => Self::HmacSha1,
            0x91 => Self::HmacSha1_160,
            0xA0 => Self::RsaPublicE,
            0xA1 => Self::RsaPublicN,
            0xA2 => Self::RsaPrivateN,
            0xA3 => Self::RsaPrivateD,
            _ => return Err(Error::InvalidFormat("unknown key type coding")),
        })
    }
}

/// Apply ISO/IEC 7816-4 padding: `0x80` then zeros up to the next block
/// boundary. Always adds at least one byte.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let tail = data.len() % BLOCK_SIZE;
    let full = data.len() - tail;

    let mut last = Block::<Des>::default();
    last[..tail].copy_from_slice(&data[full..]);
    Iso7816::pad(&mut last, tail);

    let mut padded = Vec::with_capacity(full + BLOCK_SIZE);
    padded.extend_from_slice(&data[..full]);
    padded.extend_from_slice(&last);
    padded
}

/// Length of `pad(data)` for data of length `len`
pub const fn padded_len(len: usize) -> usize {
    (len / BLOCK_SIZE + 1) * BLOCK_SIZE
}

fn encrypt_blocks<C>(cipher: C, data: &[u8], mode: BlockMode) -> Result<Vec<u8>>
where
    C: BlockEncrypt + BlockCipher + BlockSizeUser<BlockSize = U8>,
{
    if data.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto("data is not a multiple of the block size"));
    }

    let mut buffer = data.to_vec();
    match mode {
        BlockMode::Ecb => {
            for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
                cipher.encrypt_block(GenericArray::from_mut_slice(block));
            }
        }
        BlockMode::Cbc(iv) => {
            let len = buffer.len();
            cbc::Encryptor::<C>::inner_iv_init(cipher, &GenericArray::from(iv))
                .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
                .map_err(|_| Error::Crypto("CBC encryption failed"))?;
        }
    }
    Ok(buffer)
}

/// Single DES encryption with an 8 byte key
pub fn des_encrypt(data: &[u8], key: &[u8], mode: BlockMode) -> Result<Vec<u8>> {
    let cipher =
        Des::new_from_slice(key).map_err(|_| Error::InvalidLength {
            field: "DES key",
            expected: 8,
            actual: key.len(),
        })?;
    encrypt_blocks(cipher, data, mode)
}

/// Triple DES encryption with a 16 byte (two-key) or 24 byte (three-key) key
pub fn tdes_encrypt(data: &[u8], key: &[u8], mode: BlockMode) -> Result<Vec<u8>> {
    let cipher = match key.len() {
        16 => TdesEde3::new(&resize_key(key)),
        24 => TdesEde3::new(Key::<TdesEde3>::from_slice(key)),
        actual => {
            return Err(Error::InvalidLength {
                field: "triple DES key",
                expected: 16,
                actual,
            });
        }
    };
    encrypt_blocks(cipher, data, mode)
}

/// Resize a 16-byte two-key triple DES key to 24 bytes by repeating the
/// first 8 bytes. `key` must be 16 bytes.
fn resize_key(key: &[u8]) -> Key<TdesEde3> {
    let mut result = Key::<TdesEde3>::default();
    result[..16].copy_from_slice(key);
    result[16..24].copy_from_slice(&key[..8]);
    result
}

fn last_block(data: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
    data.len()
        .checked_sub(BLOCK_SIZE)
        .and_then(|start| data[start..].try_into().ok())
        .ok_or(Error::Crypto("no block to take"))
}

/// MAC algorithm 1 (ISO/IEC 9797-1): full triple DES CBC with a zero IV,
/// keeping the final block. `data` must already be padded.
pub fn mac_algorithm1(data: &[u8], key: &Scp02Key) -> Result<Scp02Mac> {
    if data.is_empty() {
        return Err(Error::Crypto("MAC input is empty"));
    }
    let encrypted = tdes_encrypt(data, key, BlockMode::cbc_zero_iv())?;
    last_block(&encrypted)
}

/// MAC algorithm 3 (ISO/IEC 9797-1, retail MAC)
///
/// Single DES CBC with the first half of the key over every block but the
/// last, starting from `icv`, then triple DES over the last block chained on
/// the previous output. `data` must already be padded.
///
/// # Arguments
///
/// * `data` - Padded MAC input
/// * `key` - The MAC key (16 bytes)
/// * `icv` - Initial chaining vector
///
/// # Returns
///
/// The MAC value (8 bytes)
pub fn mac_algorithm3(data: &[u8], key: &Scp02Key, icv: &[u8; BLOCK_SIZE]) -> Result<Scp02Mac> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto("MAC input is not padded to the block size"));
    }

    let (head, last) = data.split_at(data.len() - BLOCK_SIZE);
    let mut chain = *icv;
    if !head.is_empty() {
        let encrypted = des_encrypt(head, &key[..8], BlockMode::Cbc(chain))?;
        chain = last_block(&encrypted)?;
    }

    let encrypted = tdes_encrypt(last, key, BlockMode::Cbc(chain))?;
    last_block(&encrypted)
}

/// Encrypt an ICV (Initial Chaining Vector) for SCP02
///
/// The previous C-MAC is encrypted with single DES ECB under the first half
/// of the C-MAC session key.
pub fn encrypt_icv(mac_key: &Scp02Key, icv: &[u8; BLOCK_SIZE]) -> Result<[u8; BLOCK_SIZE]> {
    let encrypted = des_encrypt(icv, &mac_key[..8], BlockMode::Ecb)?;
    last_block(&encrypted)
}

/// Derive a session key from a static card key
///
/// The derivation data is `01 || purpose || sequence counter || 00 * 12`,
/// encrypted with triple DES CBC under a zero IV.
///
/// # Arguments
///
/// * `static_key` - The card key (16 bytes)
/// * `key_type` - Which session key to derive
/// * `seq` - The sequence counter (2 bytes)
///
/// # Returns
///
/// The derived key (16 bytes)
pub fn derive_session_key(
    static_key: &Scp02Key,
    key_type: SessionKeyType,
    seq: &SequenceCounter,
) -> Result<Scp02Key> {
    let mut derivation = [0u8; 16];
    derivation[0] = 0x01;
    derivation[1] = key_type.purpose();
    derivation[2..4].copy_from_slice(seq);

    let encrypted = tdes_encrypt(&derivation, static_key, BlockMode::cbc_zero_iv())?;
    encrypted
        .try_into()
        .map_err(|_| Error::Crypto("derived key has the wrong size"))
}

/// Calculate a card or host cryptogram with the S-ENC session key
///
/// The card cryptogram covers `host challenge || sequence counter || card
/// challenge`, the host cryptogram `sequence counter || card challenge ||
/// host challenge`. Both are padded to 24 bytes and run through MAC
/// algorithm 1.
pub fn calculate_cryptogram(
    enc_key: &Scp02Key,
    sequence_counter: &SequenceCounter,
    card_challenge: &CardChallenge,
    host_challenge: &HostChallenge,
    cryptogram_type: CryptogramType,
) -> Result<Cryptogram> {
    let mut data = Vec::with_capacity(16);
    match cryptogram_type {
        CryptogramType::Card => {
            data.extend_from_slice(host_challenge);
            data.extend_from_slice(sequence_counter);
            data.extend_from_slice(card_challenge);
        }
        CryptogramType::Host => {
            data.extend_from_slice(sequence_counter);
            data.extend_from_slice(card_challenge);
            data.extend_from_slice(host_challenge);
        }
    }
    mac_algorithm1(&pad(&data), enc_key)
}

/// Compute the three byte key check value
///
/// DES family keys encrypt eight `0x00` bytes, AES keys encrypt sixteen
/// `0x01` bytes, both in ECB mode; the check value is the first three bytes.
pub fn key_check_value(key_type: KeyType, key: &[u8]) -> Result<[u8; 3]> {
    let encrypted = if key_type.is_des() {
        let block = [0x00; BLOCK_SIZE];
        match key.len() {
            8 => des_encrypt(&block, key, BlockMode::Ecb)?,
            _ => tdes_encrypt(&block, key, BlockMode::Ecb)?,
        }
    } else if key_type == KeyType::Aes {
        let mut block = GenericArray::from([0x01; 16]);
        match key.len() {
            16 => Aes128::new(GenericArray::from_slice(key)).encrypt_block(&mut block),
            24 => Aes192::new(GenericArray::from_slice(key)).encrypt_block(&mut block),
            32 => Aes256::new(GenericArray::from_slice(key)).encrypt_block(&mut block),
            actual => {
                return Err(Error::InvalidLength {
                    field: "AES key",
                    expected: 16,
                    actual,
                });
            }
        }
        block.to_vec()
    } else {
        return Err(Error::UnsupportedKeyType(key_type));
    };

    let mut kcv = [0u8; 3];
    kcv.copy_from_slice(&encrypted[..3]);
    Ok(kcv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const CARD_KEY: Scp02Key = hex!("404142434445464748494a4b4c4d4e4f");

    #[test]
    fn test_pad() {
        assert_eq!(pad(&[]), hex!("8000000000000000"));
        assert_eq!(pad(&[0x11; 7]), hex!("1111111111111180"));
        assert_eq!(pad(&[0x11; 8]), hex!("11111111111111118000000000000000"));
        assert_eq!(pad(&[0x11; 9]).len(), 16);
        assert_eq!(pad(&[0x11; 9])[9], 0x80);

        for len in [0, 7, 8, 9, 255] {
            assert_eq!(pad(&vec![0; len]).len(), padded_len(len));
        }
    }

    #[test]
    fn test_derive_key() {
        let enc_key =
            derive_session_key(&CARD_KEY, SessionKeyType::SEnc, &hex!("0065")).unwrap();
        assert_eq!(enc_key, hex!("85e72aaf47874218a202bf5ef891dd21"));
    }

    #[test]
    fn test_derive_all_session_keys() {
        let seq = hex!("0000");
        let cases = [
            (SessionKeyType::SEnc, hex!("010B0371D78377B801F2D62AFC671D95")),
            (SessionKeyType::CMac, hex!("D1C28C601652A4770D67AD82D2D2E1C4")),
            (SessionKeyType::RMac, hex!("FFAEC7EC7FAD69F9FBFF093BF2F79C45")),
            (SessionKeyType::Dek, hex!("E11987EE331B417A5D67D760692F89D4")),
        ];
        for (key_type, expected) in cases {
            assert_eq!(
                derive_session_key(&CARD_KEY, key_type, &seq).unwrap(),
                expected,
                "{key_type:?}"
            );
        }
    }

    #[test]
    fn test_card_cryptogram() {
        let enc_key = hex!("16b5867ff50be7239c2bf1245b83a362");
        let result = calculate_cryptogram(
            &enc_key,
            &hex!("0072"),
            &hex!("84f64a7d6465"),
            &hex!("32da078d7aac1cff"),
            CryptogramType::Card,
        )
        .unwrap();
        assert_eq!(result, hex!("05c4bb8a86014e22"));
    }

    #[test]
    fn test_mac_algorithm3() {
        let key = hex!("5b02e75ad63190aece0622936f11abab");
        let data = pad(&hex!("8482010010810b098a8fbb88da"));
        let result = mac_algorithm3(&data, &key, &[0; 8]).unwrap();
        assert_eq!(result, hex!("5271d7174a5a166a"));
    }

    #[test]
    fn test_mac_requires_padding() {
        let key = hex!("5b02e75ad63190aece0622936f11abab");
        assert!(matches!(
            mac_algorithm3(&[0x01; 7], &key, &[0; 8]),
            Err(Error::Crypto(_))
        ));
        assert!(matches!(
            mac_algorithm3(&[], &key, &[0; 8]),
            Err(Error::Crypto(_))
        ));
        assert!(matches!(mac_algorithm1(&[0x01; 9], &key), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_mac_algorithm1_single_block_matches_algorithm3() {
        // With one block both algorithms reduce to triple DES of the block
        let data = pad(&hex!("0102030405"));
        assert_eq!(
            mac_algorithm1(&data, &CARD_KEY).unwrap(),
            mac_algorithm3(&data, &CARD_KEY, &[0; 8]).unwrap()
        );
    }

    #[test]
    fn test_encrypt_icv() {
        let mac_key = hex!("2983ba77d709c2daa1e6000abccac951");
        let icv = hex!("8f9b0df681c1d3ec");
        let expected = des_encrypt(&icv, &mac_key[..8], BlockMode::Ecb).unwrap();
        assert_eq!(encrypt_icv(&mac_key, &icv).unwrap().as_slice(), expected);
        assert_ne!(encrypt_icv(&mac_key, &icv).unwrap(), icv);
    }

    #[test]
    fn test_block_modes() {
        // A two-key triple DES key with equal halves degenerates to single DES
        let key = hex!("01234567890abcdef01234567890abcd");
        let single = hex!("0123456789abcdef");
        let mut doubled = [0u8; 16];
        doubled[..8].copy_from_slice(&single);
        doubled[8..].copy_from_slice(&single);

        let data = hex!("00112233445566778899aabbccddeeff");
        assert_eq!(
            tdes_encrypt(&data, &doubled, BlockMode::Ecb).unwrap(),
            des_encrypt(&data, &single, BlockMode::Ecb).unwrap()
        );
        assert_eq!(
            tdes_encrypt(&data, &doubled, BlockMode::cbc_zero_iv()).unwrap(),
            des_encrypt(&data, &single, BlockMode::cbc_zero_iv()).unwrap()
        );

        // CBC of the first block equals ECB of the first block under a zero IV
        let ecb = tdes_encrypt(&data, &key, BlockMode::Ecb).unwrap();
        let cbc = tdes_encrypt(&data, &key, BlockMode::cbc_zero_iv()).unwrap();
        assert_eq!(ecb[..8], cbc[..8]);
        assert_ne!(ecb[8..], cbc[8..]);

        assert!(tdes_encrypt(&data[..7], &key, BlockMode::Ecb).is_err());
        assert!(tdes_encrypt(&data, &key[..10], BlockMode::Ecb).is_err());
        assert!(des_encrypt(&data, &key, BlockMode::Ecb).is_err());
    }

    #[test]
    fn test_key_check_value() {
        assert_eq!(key_check_value(KeyType::Des, &CARD_KEY).unwrap(), hex!("8BAF47"));
        assert_eq!(
            key_check_value(KeyType::TripleDesCbc, &CARD_KEY).unwrap(),
            hex!("8BAF47")
        );

        let aes = key_check_value(KeyType::Aes, &CARD_KEY).unwrap();
        assert_eq!(aes.len(), 3);
        assert!(key_check_value(KeyType::Aes, &CARD_KEY[..10]).is_err());

        assert!(matches!(
            key_check_value(KeyType::HmacSha1, &CARD_KEY),
            Err(Error::UnsupportedKeyType(KeyType::HmacSha1))
        ));
    }

    #[test]
    fn test_key_type_coding() {
        assert_eq!(KeyType::try_from(0x88).unwrap(), KeyType::Aes);
        assert_eq!(KeyType::Des as u8, 0x80);
        assert!(KeyType::try_from(0x00).is_err());
    }
}
