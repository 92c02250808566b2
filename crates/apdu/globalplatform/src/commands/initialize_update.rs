//! INITIALIZE UPDATE command for GlobalPlatform
//!
//! This command is used to start a secure channel session.

use nexum_apdu_core::{Command, Response};

use crate::{
    Error, Result,
    constants::{HOST_CHALLENGE_LENGTH, INITIALIZE_UPDATE_RESPONSE_LENGTH, cla, ins, scp},
    crypto::{CardChallenge, Cryptogram, HostChallenge, SequenceCounter},
};

/// INITIALIZE UPDATE command for GlobalPlatform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeUpdateCommand {
    key_version: u8,
    host_challenge: HostChallenge,
}

impl InitializeUpdateCommand {
    /// Create a new INITIALIZE UPDATE command with a host challenge
    ///
    /// Key version `0` selects the first available key set; otherwise the
    /// version must lie in `1..=0x7F`.
    pub const fn new(key_version: u8, host_challenge: HostChallenge) -> Result<Self> {
        if key_version > 0x7F {
            return Err(Error::InvalidKeyVersion(key_version));
        }
        Ok(Self {
            key_version,
            host_challenge,
        })
    }

    /// Create a new INITIALIZE UPDATE command with random host challenge
    pub fn with_random_challenge(key_version: u8) -> Result<Self> {
        let mut challenge = [0u8; HOST_CHALLENGE_LENGTH];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut challenge);
        Self::new(key_version, challenge)
    }

    /// Key version number sent in P1
    pub const fn key_version(&self) -> u8 {
        self.key_version
    }

    /// Host challenge sent as command data
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }

    /// Build the case 4 APDU
    pub fn to_command(&self) -> Result<Command> {
        Ok(Command::case4s(
            cla::GP,
            ins::INITIALIZE_UPDATE,
            self.key_version,
            0x00,
            self.host_challenge.to_vec(),
            0x00,
        )?)
    }
}

/// Successful INITIALIZE UPDATE response data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    key_diversification_data: [u8; 10],
    key_info: [u8; 2],
    sequence_counter: SequenceCounter,
    card_challenge: CardChallenge,
    card_cryptogram: Cryptogram,
}

impl InitializeUpdateResponse {
    /// Parse a card response, failing on any status other than 9000
    pub fn parse(response: &Response) -> Result<Self> {
        if !response.is_success() {
            return Err(Error::CardStatus(response.status()));
        }
        Self::from_data(response.payload())
    }

    /// Parse the 28 data bytes of a response, status word excluded
    pub fn from_data(data: &[u8]) -> Result<Self> {
        Error::check_length(
            "INITIALIZE UPDATE response",
            data,
            INITIALIZE_UPDATE_RESPONSE_LENGTH,
        )?;

        let mut parsed = Self {
            key_diversification_data: [0; 10],
            key_info: [0; 2],
            sequence_counter: [0; 2],
            card_challenge: [0; 6],
            card_cryptogram: [0; 8],
        };
        parsed.key_diversification_data.copy_from_slice(&data[0..10]);
        parsed.key_info.copy_from_slice(&data[10..12]);
        parsed.sequence_counter.copy_from_slice(&data[12..14]);
        parsed.card_challenge.copy_from_slice(&data[14..20]);
        parsed.card_cryptogram.copy_from_slice(&data[20..28]);

        if parsed.scp_version() != scp::SCP02 {
            return Err(Error::UnsupportedScpVersion(parsed.scp_version()));
        }

        Ok(parsed)
    }

    /// Key diversification data
    pub const fn key_diversification_data(&self) -> &[u8; 10] {
        &self.key_diversification_data
    }

    /// Key information (key version, SCP identifier)
    pub const fn key_info(&self) -> &[u8; 2] {
        &self.key_info
    }

    /// Get the key version number
    pub const fn key_version_number(&self) -> u8 {
        self.key_info[0]
    }

    /// Get the SCP version
    pub const fn scp_version(&self) -> u8 {
        self.key_info[1]
    }

    /// Get the sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        &self.sequence_counter
    }

    /// Get the card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        &self.card_challenge
    }

    /// Get the card cryptogram
    pub const fn card_cryptogram(&self) -> &Cryptogram {
        &self.card_cryptogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_initialize_update_command() {
        let cmd = InitializeUpdateCommand::new(0x00, hex!("0102030405060708"))
            .unwrap()
            .to_command()
            .unwrap();

        assert_eq!(cmd.class(), cla::GP);
        assert_eq!(cmd.instruction(), ins::INITIALIZE_UPDATE);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("8050000008010203040506070800"));

        let cmd = InitializeUpdateCommand::new(0x20, [0; 8]).unwrap();
        assert_eq!(cmd.to_command().unwrap().p1(), 0x20);
    }

    #[test]
    fn test_key_version_range() {
        assert!(InitializeUpdateCommand::new(0x7F, [0; 8]).is_ok());
        assert!(matches!(
            InitializeUpdateCommand::new(0x80, [0; 8]),
            Err(Error::InvalidKeyVersion(0x80))
        ));
    }

    #[test]
    fn test_random_challenge() {
        let a = InitializeUpdateCommand::with_random_challenge(0).unwrap();
        let b = InitializeUpdateCommand::with_random_challenge(0).unwrap();
        assert_ne!(a.host_challenge(), b.host_challenge());
    }

    #[test]
    fn test_initialize_update_response() {
        let response = Response::from_bytes(&hex!(
            "000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce49000"
        ))
        .unwrap();
        let parsed = InitializeUpdateResponse::parse(&response).unwrap();

        assert_eq!(parsed.key_diversification_data(), &hex!("00000265018303953662"));
        assert_eq!(parsed.key_info(), &hex!("2002"));
        assert_eq!(parsed.key_version_number(), 0x20);
        assert_eq!(parsed.scp_version(), 0x02);
        assert_eq!(parsed.sequence_counter(), &hex!("000D"));
        assert_eq!(parsed.card_challenge(), &hex!("E9C62BA1C4C8"));
        assert_eq!(parsed.card_cryptogram(), &hex!("E55FCB91B6654CE4"));
    }

    #[test]
    fn test_initialize_update_errors() {
        let response = Response::from_bytes(&hex!("6982")).unwrap();
        assert!(matches!(
            InitializeUpdateResponse::parse(&response),
            Err(Error::CardStatus(sw)) if sw.to_u16() == 0x6982
        ));

        // SCP03 key info
        let data = hex!("000002650183039536622003000de9c62ba1c4c8e55fcb91b6654ce4");
        assert!(matches!(
            InitializeUpdateResponse::from_data(&data),
            Err(Error::UnsupportedScpVersion(0x03))
        ));

        assert!(matches!(
            InitializeUpdateResponse::from_data(&data[..27]),
            Err(Error::InvalidLength { expected: 28, actual: 27, .. })
        ));
    }
}
