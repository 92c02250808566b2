//! Session management for SCP02 secure channel
//!
//! A [`Scp02Session`] is configured once through [`Scp02SessionBuilder`],
//! established by verifying the card cryptogram, and then secures outbound
//! commands in transmission order. The running C-MAC is owned by the session
//! and chained from one secured command to the next.

use nexum_apdu_core::{Command, MAX_DATA_LENGTH, Response};
use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    commands::{ExternalAuthenticateCommand, InitializeUpdateResponse},
    constants::{HOST_CHALLENGE_LENGTH, INITIALIZE_UPDATE_RESPONSE_LENGTH, cla, ins},
    crypto::{
        BlockMode, CardChallenge, Cryptogram, CryptogramType, HostChallenge, Scp02Mac,
        SequenceCounter, calculate_cryptogram, encrypt_icv, mac_algorithm3, pad, padded_len,
        tdes_encrypt,
    },
    keys::{KeySet, SessionKeys},
};

const MAC_LENGTH: usize = 8;

/// Security level negotiated with EXTERNAL AUTHENTICATE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SecurityLevel {
    /// Authentication only, commands are sent in plain
    #[default]
    Authenticated = 0x00,
    /// Command MAC
    CMac = 0x01,
    /// Command encryption and command MAC
    CDecryption = 0x03,
    /// Response MAC
    RMac = 0x10,
    /// Command MAC and response MAC
    CMacRMac = 0x11,
    /// Command encryption, command MAC and response MAC
    CDecryptionCMacRMac = 0x13,
}

impl SecurityLevel {
    /// Byte sent as P1 of EXTERNAL AUTHENTICATE
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Whether commands carry a C-MAC
    pub const fn has_c_mac(self) -> bool {
        self.bits() & 0x01 != 0
    }

    /// Whether command data is encrypted
    pub const fn has_c_decryption(self) -> bool {
        self.bits() & 0x02 != 0
    }

    /// Whether responses carry an R-MAC
    pub const fn has_r_mac(self) -> bool {
        self.bits() & 0x10 != 0
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x00 => Self::Authenticated,
            0x01 => Self::CMac,
            0x03 => Self::CDecryption,
            0x10 => Self::RMac,
            0x11 => Self::CMacRMac,
            0x13 => Self::CDecryptionCMacRMac,
            _ => return Err(Error::InvalidSecurityLevel(value)),
        })
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Inputs accepted, cryptograms not yet checked
    Configured,
    /// Card authenticated, commands can be secured
    Established,
    /// Establishment failed, the session cannot be used
    Failed,
}

/// Order of MAC computation and data encryption when both apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtectionOrder {
    /// MAC the plain data, then encrypt the data and append the MAC
    #[default]
    MacThenEncrypt,
    /// Encrypt the data, then MAC the encrypted data
    EncryptThenMac,
}

/// Collects the inputs of a session and validates them together
#[derive(Debug, Default)]
pub struct Scp02SessionBuilder {
    security_level: Option<SecurityLevel>,
    keys: Option<KeySet>,
    host_challenge: Option<Vec<u8>>,
    initialize_update_response: Option<Vec<u8>>,
    protection_order: ProtectionOrder,
}

impl Scp02SessionBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the security level
    pub const fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Set static card keys or precomputed session keys
    pub fn keys(mut self, keys: impl Into<KeySet>) -> Self {
        self.keys = Some(keys.into());
        self
    }

    /// Set the host challenge sent with INITIALIZE UPDATE
    pub fn host_challenge(mut self, challenge: impl AsRef<[u8]>) -> Self {
        self.host_challenge = Some(challenge.as_ref().to_vec());
        self
    }

    /// Set the raw INITIALIZE UPDATE response, with or without its status word
    pub fn initialize_update_response(mut self, response: impl AsRef<[u8]>) -> Self {
        self.initialize_update_response = Some(response.as_ref().to_vec());
        self
    }

    /// Set the protection order used when both C-MAC and encryption apply
    pub const fn protection_order(mut self, order: ProtectionOrder) -> Self {
        self.protection_order = order;
        self
    }

    /// Validate every input and create a session in the configured state
    pub fn build(self) -> Result<Scp02Session> {
        let security_level = self
            .security_level
            .ok_or(Error::MissingField("security level"))?;
        let keys = self.keys.ok_or(Error::MissingField("keys"))?;
        let host_challenge = self
            .host_challenge
            .ok_or(Error::MissingField("host challenge"))?;
        let raw_response = self
            .initialize_update_response
            .ok_or(Error::MissingField("INITIALIZE UPDATE response"))?;

        Error::check_length("host challenge", &host_challenge, HOST_CHALLENGE_LENGTH)?;
        let mut challenge = [0u8; HOST_CHALLENGE_LENGTH];
        challenge.copy_from_slice(&host_challenge);

        let response = if raw_response.len() == INITIALIZE_UPDATE_RESPONSE_LENGTH {
            InitializeUpdateResponse::from_data(&raw_response)?
        } else {
            let response = Response::from_bytes(&raw_response)?;
            if !response.is_success() {
                return Err(Error::InvalidResponse(
                    "INITIALIZE UPDATE did not complete successfully",
                ));
            }
            InitializeUpdateResponse::from_data(response.payload())?
        };

        debug!(
            security_level = ?security_level,
            key_version = response.key_version_number(),
            sequence_counter = %hex::encode_upper(response.sequence_counter()),
            "SCP02 session configured"
        );

        Ok(Scp02Session {
            security_level,
            keys,
            host_challenge: challenge,
            response,
            protection_order: self.protection_order,
            host_cryptogram: None,
            c_mac: [0; MAC_LENGTH],
            state: SessionState::Configured,
        })
    }
}

/// SCP02 secure channel session
///
/// Not `Clone`: the running C-MAC must advance along a single chain.
#[derive(Debug)]
pub struct Scp02Session {
    security_level: SecurityLevel,
    keys: KeySet,
    host_challenge: HostChallenge,
    response: InitializeUpdateResponse,
    protection_order: ProtectionOrder,
    host_cryptogram: Option<Cryptogram>,
    c_mac: Scp02Mac,
    state: SessionState,
}

impl Scp02Session {
    /// Start building a session
    pub fn builder() -> Scp02SessionBuilder {
        Scp02SessionBuilder::new()
    }

    /// Derive the session keys if needed and authenticate the card
    ///
    /// On a card cryptogram mismatch the session moves to
    /// [`SessionState::Failed`] and cannot be used again.
    pub fn establish(&mut self) -> Result<()> {
        if self.state != SessionState::Configured {
            return Err(Error::SessionState {
                expected: SessionState::Configured,
                actual: self.state,
            });
        }

        let session_keys = match &self.keys {
            KeySet::Static(keys) => keys.derive(self.response.sequence_counter())?,
            KeySet::Session(keys) => keys.clone(),
        };

        let expected = self.cryptogram(&session_keys, CryptogramType::Card)?;
        let received = *self.response.card_cryptogram();
        if expected != received {
            warn!(
                expected = %hex::encode_upper(expected),
                received = %hex::encode_upper(received),
                "Card cryptogram mismatch"
            );
            self.state = SessionState::Failed;
            return Err(Error::CardCryptogramMismatch { expected, received });
        }

        self.host_cryptogram = Some(self.cryptogram(&session_keys, CryptogramType::Host)?);
        self.keys = KeySet::Session(session_keys);
        self.state = SessionState::Established;

        debug!(security_level = ?self.security_level, "SCP02 session established");
        Ok(())
    }

    /// Attempt [`establish`](Self::establish), reporting only whether it succeeded
    pub fn try_establish(&mut self) -> bool {
        self.establish().is_ok()
    }

    fn cryptogram(&self, keys: &SessionKeys, kind: CryptogramType) -> Result<Cryptogram> {
        calculate_cryptogram(
            keys.enc(),
            self.response.sequence_counter(),
            self.response.card_challenge(),
            &self.host_challenge,
            kind,
        )
    }

    /// Build the EXTERNAL AUTHENTICATE command for this session
    ///
    /// The returned command is plain; pass it through [`secure`](Self::secure)
    /// before sending.
    pub fn external_authenticate(&self) -> Result<Command> {
        let host_cryptogram = self.host_cryptogram.ok_or(Error::NotEstablished)?;
        ExternalAuthenticateCommand::new(self.security_level, host_cryptogram).to_command()
    }

    /// Wrap a command for transmission
    ///
    /// Only GlobalPlatform class commands without secure messaging are
    /// wrapped: `80`-`83` on the basic and first logical channels, `C0`-`CF`
    /// on further channels. Every other class, including ISO interindustry
    /// classes and commands already carrying a MAC, passes through unchanged.
    /// Every secured command updates the running
    /// C-MAC, so commands must be secured exactly once and in the order they
    /// are sent.
    pub fn secure(&mut self, command: &Command) -> Result<Command> {
        if self.state != SessionState::Established {
            return Err(Error::NotEstablished);
        }

        let Some(secure_class) = secure_messaging_class(command.class()) else {
            return Ok(command.clone());
        };

        let instruction = command.instruction();
        let mac = self.security_level.has_c_mac() || instruction == ins::EXTERNAL_AUTHENTICATE;
        let encrypt =
            self.security_level.has_c_decryption() && instruction != ins::EXTERNAL_AUTHENTICATE;
        if !mac && !encrypt {
            return Ok(command.clone());
        }

        let data = command.data();
        let body_len = if encrypt { padded_len(data.len()) } else { data.len() };
        let secured_len = body_len + if mac { MAC_LENGTH } else { 0 };
        if secured_len > MAX_DATA_LENGTH {
            return Err(Error::SecuredDataTooLarge {
                len: secured_len,
                max: MAX_DATA_LENGTH,
            });
        }

        let keys = self.session_keys().ok_or(Error::NotEstablished)?;
        let header = [secure_class, instruction, command.p1(), command.p2()];

        let (mut secured_data, new_mac) = match (mac, self.protection_order) {
            (false, _) => (encrypt_data(keys, data)?, None),
            (true, ProtectionOrder::MacThenEncrypt) => {
                let mac_value = self.compute_mac(keys, &header, data)?;
                let body = if encrypt {
                    encrypt_data(keys, data)?
                } else {
                    data.to_vec()
                };
                (body, Some(mac_value))
            }
            (true, ProtectionOrder::EncryptThenMac) => {
                let body = if encrypt {
                    encrypt_data(keys, data)?
                } else {
                    data.to_vec()
                };
                let mac_value = self.compute_mac(keys, &header, &body)?;
                (body, Some(mac_value))
            }
        };

        let mut secured = command.clone();
        if let Some(mac_value) = new_mac {
            secured_data.extend_from_slice(&mac_value);
            secured.set_class(secure_class);
        }
        secured.set_data(secured_data)?;

        if let Some(mac_value) = new_mac {
            self.c_mac = mac_value;
        }

        trace!(command = %command, secured = %secured, "Secured command");
        Ok(secured)
    }

    /// Secure a sequence of commands in order
    pub fn secure_all<'a, I>(&mut self, commands: I) -> Result<Vec<Command>>
    where
        I: IntoIterator<Item = &'a Command>,
    {
        commands
            .into_iter()
            .map(|command| self.secure(command))
            .collect()
    }

    /// MAC over `header || Lc + 8 || data`, chained on the previous C-MAC
    fn compute_mac(&self, keys: &SessionKeys, header: &[u8; 4], data: &[u8]) -> Result<Scp02Mac> {
        let icv = if self.c_mac == [0; MAC_LENGTH] {
            [0; MAC_LENGTH]
        } else {
            encrypt_icv(keys.c_mac(), &self.c_mac)?
        };

        let mut input = Vec::with_capacity(header.len() + 1 + data.len());
        input.extend_from_slice(header);
        // Bounded by the size check in `secure`
        input.push((data.len() + MAC_LENGTH) as u8);
        input.extend_from_slice(data);

        mac_algorithm3(&pad(&input), keys.c_mac(), &icv)
    }

    /// Current state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is established
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Negotiated security level
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Protection order applied when both C-MAC and encryption are active
    pub const fn protection_order(&self) -> ProtectionOrder {
        self.protection_order
    }

    /// Session keys, available once established or when supplied directly
    pub const fn session_keys(&self) -> Option<&SessionKeys> {
        match &self.keys {
            KeySet::Session(keys) => Some(keys),
            KeySet::Static(_) => None,
        }
    }

    /// Host cryptogram, available once established
    pub const fn host_cryptogram(&self) -> Option<&Cryptogram> {
        self.host_cryptogram.as_ref()
    }

    /// Running C-MAC, all zeros before the first secured command
    pub const fn c_mac(&self) -> &Scp02Mac {
        &self.c_mac
    }

    /// Host challenge
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }

    /// Card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        self.response.card_challenge()
    }

    /// Sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        self.response.sequence_counter()
    }

    /// Parsed INITIALIZE UPDATE response
    pub const fn initialize_update_response(&self) -> &InitializeUpdateResponse {
        &self.response
    }
}

/// Class byte announcing secure messaging, or `None` when the command is not
/// a plain GlobalPlatform class command
const fn secure_messaging_class(class: u8) -> Option<u8> {
    match class {
        // First coding: channel in bits 1-2, SM indicator in bit 3
        0x80..=0x83 => Some(class | cla::SECURE_MESSAGING_FIRST),
        // Further coding: channel in bits 1-4, SM indicator in bit 6
        0xC0..=0xCF => Some(class | cla::SECURE_MESSAGING_FURTHER),
        _ => None,
    }
}

fn encrypt_data(keys: &SessionKeys, data: &[u8]) -> Result<Vec<u8>> {
    tdes_encrypt(&pad(data), keys.enc(), BlockMode::cbc_zero_iv())
}
