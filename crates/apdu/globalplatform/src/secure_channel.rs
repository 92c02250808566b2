//! Secure channel opening over a card transport
//!
//! [`open_secure_channel`] runs the INITIALIZE UPDATE and EXTERNAL
//! AUTHENTICATE exchange and hands back an established session.
//! [`SecureChannel`] keeps that session next to its transport and secures
//! every command it sends.

use bytes::Bytes;
use nexum_apdu_core::{CardTransport, Command, Response};
use tracing::{debug, trace};

use crate::{
    Error, Result,
    commands::{GetStatusCommand, InitializeUpdateCommand},
    constants::status,
    crypto::HostChallenge,
    keys::KeySet,
    session::{Scp02Session, SecurityLevel},
};

/// Authenticate to the card with a random host challenge
pub fn open_secure_channel<T>(
    transport: &mut T,
    keys: impl Into<KeySet>,
    security_level: SecurityLevel,
) -> Result<Scp02Session>
where
    T: CardTransport + ?Sized,
{
    let initialize_update = InitializeUpdateCommand::with_random_challenge(0x00)?;
    open_with(transport, keys.into(), security_level, initialize_update)
}

/// Authenticate to the card with a caller supplied host challenge
pub fn open_secure_channel_with_challenge<T>(
    transport: &mut T,
    keys: impl Into<KeySet>,
    security_level: SecurityLevel,
    host_challenge: HostChallenge,
) -> Result<Scp02Session>
where
    T: CardTransport + ?Sized,
{
    let initialize_update = InitializeUpdateCommand::new(0x00, host_challenge)?;
    open_with(transport, keys.into(), security_level, initialize_update)
}

fn open_with<T>(
    transport: &mut T,
    keys: KeySet,
    security_level: SecurityLevel,
    initialize_update: InitializeUpdateCommand,
) -> Result<Scp02Session>
where
    T: CardTransport + ?Sized,
{
    let response = transport.transmit(&initialize_update.to_command()?)?;
    check_status(&response)?;

    let mut session = Scp02Session::builder()
        .security_level(security_level)
        .keys(keys)
        .host_challenge(initialize_update.host_challenge())
        .initialize_update_response(response.payload())
        .build()?;
    session.establish()?;

    let external_authenticate = session.external_authenticate()?;
    let secured = session.secure(&external_authenticate)?;
    let response = transport.transmit(&secured)?;
    check_status(&response)?;

    debug!(security_level = ?security_level, "Secure channel opened");
    Ok(session)
}

fn check_status(response: &Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Error::CardStatus(response.status()))
    }
}

/// A transport paired with an established SCP02 session
#[derive(Debug)]
pub struct SecureChannel<T> {
    transport: T,
    session: Scp02Session,
}

impl<T: CardTransport> SecureChannel<T> {
    /// Open a secure channel over `transport`
    pub fn open(
        mut transport: T,
        keys: impl Into<KeySet>,
        security_level: SecurityLevel,
    ) -> Result<Self> {
        let session = open_secure_channel(&mut transport, keys, security_level)?;
        Ok(Self { transport, session })
    }

    /// Pair a transport with a session that is already established
    pub fn from_parts(transport: T, session: Scp02Session) -> Result<Self> {
        if !session.is_established() {
            return Err(Error::NotEstablished);
        }
        Ok(Self { transport, session })
    }

    /// Secure `command` and send it
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let secured = self.session.secure(command)?;
        trace!(command = %secured, "Sending secured command");
        Ok(self.transport.transmit(&secured)?)
    }

    /// Run GET STATUS to completion and return each response payload
    ///
    /// While the card answers `63 10` the query is repeated for the next
    /// occurrences. `6A 88` on the first request means no matching entry and
    /// yields no pages.
    pub fn get_status(&mut self, query: &GetStatusCommand) -> Result<Vec<Bytes>> {
        let mut request = query.clone().next_occurrence(false);
        let mut pages = Vec::new();

        loop {
            let response = self.transmit(&request.to_command()?)?;
            let sw = response.status();

            if sw == status::MORE_DATA {
                pages.push(Bytes::copy_from_slice(response.payload()));
                request = request.next_occurrence(true);
            } else if response.is_success() {
                pages.push(Bytes::copy_from_slice(response.payload()));
                debug!(pages = pages.len(), "GET STATUS complete");
                return Ok(pages);
            } else if sw == status::REFERENCED_DATA_NOT_FOUND && pages.is_empty() {
                return Ok(pages);
            } else {
                return Err(Error::CardStatus(sw));
            }
        }
    }

    /// The underlying session
    pub const fn session(&self) -> &Scp02Session {
        &self.session
    }

    /// Give back the transport, ending the channel
    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::cla;
    use crate::keys::StaticKeys;
    use bytes::Bytes;
    use hex_literal::hex;
    use nexum_apdu_core::TransportError;

    const CARD_KEY: [u8; 16] = hex!("404142434445464748494a4b4c4d4e4f");
    const HOST_CHALLENGE: [u8; 8] = hex!("ED293C60B50DF420");

    #[derive(Debug)]
    struct ScriptedTransport {
        responses: Vec<Bytes>,
        commands: Vec<Bytes>,
    }

    impl ScriptedTransport {
        fn new(responses: &[&[u8]]) -> Self {
            Self {
                responses: responses.iter().map(|r| Bytes::copy_from_slice(r)).collect(),
                commands: Vec::new(),
            }
        }
    }

    impl CardTransport for ScriptedTransport {
        fn do_transmit_raw(&mut self, command: &[u8]) -> std::result::Result<Bytes, TransportError> {
            self.commands.push(Bytes::copy_from_slice(command));
            if self.responses.is_empty() {
                return Err(TransportError::Transmission);
            }
            Ok(self.responses.remove(0))
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn reset(&mut self) -> std::result::Result<(), TransportError> {
            Ok(())
        }
    }

    fn fixture_transport(external_authenticate_status: &[u8]) -> ScriptedTransport {
        ScriptedTransport::new(&[
            &hex!("000074746E6E6E626262FF0200003D029C31C789BD81D9379C00D28F9000"),
            external_authenticate_status,
        ])
    }

    #[test]
    fn test_open_with_challenge() {
        let mut transport = fixture_transport(&hex!("9000"));
        let session = open_secure_channel_with_challenge(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
            HOST_CHALLENGE,
        )
        .unwrap();

        assert!(session.is_established());
        assert_eq!(
            transport.commands[0].as_ref(),
            hex!("8050000008ED293C60B50DF42000")
        );

        // EXTERNAL AUTHENTICATE carries the host cryptogram and its MAC
        let external_authenticate = &transport.commands[1];
        assert_eq!(external_authenticate[0], cla::MAC);
        assert_eq!(&external_authenticate[..5], &hex!("8482010010"));
        assert_eq!(&external_authenticate[5..13], &hex!("E44769BBAAF75A6A"));
        assert_eq!(&external_authenticate[13..], session.c_mac());
    }

    #[test]
    fn test_external_authenticate_rejected() {
        let mut transport = fixture_transport(&hex!("6300"));
        let err = open_secure_channel_with_challenge(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
            HOST_CHALLENGE,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw.to_u16() == 0x6300));
    }

    #[test]
    fn test_initialize_update_rejected() {
        let mut transport = ScriptedTransport::new(&[&hex!("6982")]);
        let err = open_secure_channel(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw.to_u16() == 0x6982));
        assert_eq!(transport.commands.len(), 1);
    }

    #[test]
    fn test_random_challenge_fails_fixture_cryptogram() {
        // The fixture cryptogram only verifies against its own host challenge
        let mut transport = fixture_transport(&hex!("9000"));
        let err = open_secure_channel(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CardCryptogramMismatch { .. }));
        assert_eq!(transport.commands.len(), 1);
    }

    #[test]
    fn test_transport_failure() {
        let mut transport = ScriptedTransport::new(&[]);
        let err = open_secure_channel(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[test]
    fn test_channel_secures_commands() {
        let mut transport = fixture_transport(&hex!("9000"));
        let session = open_secure_channel_with_challenge(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
            HOST_CHALLENGE,
        )
        .unwrap();
        transport.responses.push(Bytes::copy_from_slice(&hex!(
            "E3114F08A0000000030000009F700101C5019E9000"
        )));

        let mut channel = SecureChannel::from_parts(transport, session).unwrap();
        let get_status = Command::case4s(0x80, 0xF2, 0x80, 0x02, hex!("4F00").to_vec(), 0x00)
            .unwrap();
        let response = channel.transmit(&get_status).unwrap();
        assert!(response.is_success());

        let transport = channel.into_transport();
        let sent = &transport.commands[2];
        assert_eq!(&sent[..5], &hex!("84F280020A"));
        assert_eq!(sent.len(), 5 + 10 + 1);
    }

    fn established_channel(extra: &[&[u8]]) -> SecureChannel<ScriptedTransport> {
        let mut transport = fixture_transport(&hex!("9000"));
        let session = open_secure_channel_with_challenge(
            &mut transport,
            StaticKeys::from_single_key(CARD_KEY),
            SecurityLevel::CMac,
            HOST_CHALLENGE,
        )
        .unwrap();
        transport
            .responses
            .extend(extra.iter().map(|r| Bytes::copy_from_slice(r)));
        SecureChannel::from_parts(transport, session).unwrap()
    }

    #[test]
    fn test_get_status_follows_more_data() {
        let mut channel = established_channel(&[
            &hex!("E30E4F05A0000000019F700107C501006310"),
            &hex!("E30E4F05A0000000819F700107C501809000"),
        ]);

        let pages = channel
            .get_status(&GetStatusCommand::applications())
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(
            crate::registry::parse_application_pages(&pages).unwrap().len(),
            2
        );

        let transport = channel.into_transport();
        assert_eq!(&transport.commands[2][..5], &hex!("84F240020A"));
        assert_eq!(&transport.commands[3][..5], &hex!("84F240030A"));
    }

    #[test]
    fn test_get_status_nothing_found() {
        let mut channel = established_channel(&[&hex!("6A88")]);
        let pages = channel
            .get_status(&GetStatusCommand::executable_load_files())
            .unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_get_status_error() {
        let mut channel = established_channel(&[&hex!("6982")]);
        let err = channel
            .get_status(&GetStatusCommand::applications())
            .unwrap_err();
        assert!(matches!(err, Error::CardStatus(sw) if sw.to_u16() == 0x6982));
    }
}
