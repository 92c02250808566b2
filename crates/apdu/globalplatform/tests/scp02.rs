//! End-to-end SCP02 exchanges against a simulated card

use bytes::Bytes;
use hex_literal::hex;
use nexum_apdu_core::{CardTransport, Command, TransportError};
use nexum_apdu_globalplatform::{
    Error, GetStatusCommand, ProtectionOrder, Scp02Session, SecureChannel, SecurityLevel,
    SessionKeys, SessionState, StaticKeys,
    constants::ins,
    crypto::{CryptogramType, calculate_cryptogram, encrypt_icv, mac_algorithm3, pad},
    open_secure_channel, open_secure_channel_with_challenge, registry,
};

const CARD_KEY: [u8; 16] = hex!("404142434445464748494a4b4c4d4e4f");
const ISD_ENTRY: [u8; 19] = hex!("E3114F08A0000000030000009F700101C5019E");
const APPLICATION_ENTRIES: [[u8; 16]; 2] = [
    hex!("E30E4F05A0000000019F700107C50100"),
    hex!("E30E4F05A0000000819F700107C50180"),
];

/// Card side of SCP02 with C-MAC verification
#[derive(Debug)]
struct SimulatedCard {
    keys: StaticKeys,
    sequence_counter: [u8; 2],
    card_challenge: [u8; 6],
    host_challenge: Option<[u8; 8]>,
    session_keys: Option<SessionKeys>,
    last_mac: [u8; 8],
    authenticated: bool,
}

impl SimulatedCard {
    fn new(keys: StaticKeys) -> Self {
        Self {
            keys,
            sequence_counter: hex!("002A"),
            card_challenge: hex!("C0FFEE123456"),
            host_challenge: None,
            session_keys: None,
            last_mac: [0; 8],
            authenticated: false,
        }
    }

    fn initialize_update(&mut self, command: &Command) -> Vec<u8> {
        let Ok(host_challenge) = <[u8; 8]>::try_from(command.data()) else {
            return hex!("6700").to_vec();
        };
        let session_keys = self.keys.derive(&self.sequence_counter).unwrap();
        let cryptogram = calculate_cryptogram(
            session_keys.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &host_challenge,
            CryptogramType::Card,
        )
        .unwrap();

        self.host_challenge = Some(host_challenge);
        self.session_keys = Some(session_keys);
        self.last_mac = [0; 8];
        self.authenticated = false;

        let mut response = hex!("00112233445566778899").to_vec();
        response.extend_from_slice(&hex!("0102"));
        response.extend_from_slice(&self.sequence_counter);
        response.extend_from_slice(&self.card_challenge);
        response.extend_from_slice(&cryptogram);
        response.extend_from_slice(&hex!("9000"));
        response
    }

    /// Check the trailing C-MAC and return the data without it
    fn verify_mac(&mut self, command: &Command) -> Option<Vec<u8>> {
        let keys = self.session_keys.as_ref()?;
        let data = command.data();
        let (body, mac) = data.split_at(data.len().checked_sub(8)?);

        let icv = if self.last_mac == [0; 8] {
            [0; 8]
        } else {
            encrypt_icv(keys.c_mac(), &self.last_mac).ok()?
        };
        let mut input = vec![
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2(),
            data.len() as u8,
        ];
        input.extend_from_slice(body);
        let expected = mac_algorithm3(&pad(&input), keys.c_mac(), &icv).ok()?;

        if expected.as_slice() != mac {
            return None;
        }
        self.last_mac = expected;
        Some(body.to_vec())
    }

    fn external_authenticate(&mut self, command: &Command) -> Vec<u8> {
        let Some(body) = self.verify_mac(command) else {
            return hex!("6982").to_vec();
        };
        let (Some(keys), Some(host_challenge)) = (&self.session_keys, self.host_challenge) else {
            return hex!("6985").to_vec();
        };
        let expected = calculate_cryptogram(
            keys.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &host_challenge,
            CryptogramType::Host,
        )
        .unwrap();

        if body != expected {
            return hex!("6300").to_vec();
        }
        self.authenticated = true;
        hex!("9000").to_vec()
    }

    fn get_status(&mut self, command: &Command) -> Vec<u8> {
        if !self.authenticated || self.verify_mac(command).is_none() {
            return hex!("6982").to_vec();
        }
        // Applications are listed one per response
        match (command.p1(), command.p2()) {
            (0x80, _) => [ISD_ENTRY.as_slice(), hex!("9000").as_slice()].concat(),
            (0x40, 0x02) => [APPLICATION_ENTRIES[0].as_slice(), hex!("6310").as_slice()].concat(),
            (0x40, 0x03) => [APPLICATION_ENTRIES[1].as_slice(), hex!("9000").as_slice()].concat(),
            _ => hex!("6A88").to_vec(),
        }
    }
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        let command = Command::from_bytes(raw).map_err(|e| TransportError::other(e.to_string()))?;
        let response = match command.instruction() {
            ins::INITIALIZE_UPDATE => self.initialize_update(&command),
            ins::EXTERNAL_AUTHENTICATE => self.external_authenticate(&command),
            ins::GET_STATUS => self.get_status(&command),
            _ => hex!("6D00").to_vec(),
        };
        Ok(Bytes::from(response))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[test]
fn test_fixture_session() {
    let mut session = Scp02Session::builder()
        .security_level(SecurityLevel::CMac)
        .keys(StaticKeys::from_single_key(CARD_KEY))
        .host_challenge(hex!("ED293C60B50DF420"))
        .initialize_update_response(hex!(
            "000074746E6E6E626262FF0200003D029C31C789BD81D9379C00D28F9000"
        ))
        .build()
        .unwrap();
    session.establish().unwrap();

    let keys = session.session_keys().unwrap();
    assert_eq!(keys.enc(), &hex!("010B0371D78377B801F2D62AFC671D95"));
    assert_eq!(keys.c_mac(), &hex!("D1C28C601652A4770D67AD82D2D2E1C4"));
    assert_eq!(keys.r_mac(), &hex!("FFAEC7EC7FAD69F9FBFF093BF2F79C45"));
    assert_eq!(keys.dek(), &hex!("E11987EE331B417A5D67D760692F89D4"));
    assert_eq!(session.host_cryptogram(), Some(&hex!("E44769BBAAF75A6A")));

    let get_status = GetStatusCommand::issuer_security_domain().to_command().unwrap();
    assert_eq!(get_status.lc().unwrap(), 2);
    let secured = session.secure(&get_status).unwrap();
    assert_eq!(secured.class(), 0x84);
    assert_eq!(secured.lc().unwrap(), 10);
}

#[test]
fn test_fixture_mismatch() {
    let mut session = Scp02Session::builder()
        .security_level(SecurityLevel::CMac)
        .keys(StaticKeys::from_single_key(CARD_KEY))
        .host_challenge(hex!("ED293C60B50DF421"))
        .initialize_update_response(hex!(
            "000074746E6E6E626262FF0200003D029C31C789BD81D9379C00D28F9000"
        ))
        .build()
        .unwrap();

    assert!(matches!(
        session.establish(),
        Err(Error::CardCryptogramMismatch { .. })
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn test_open_against_simulated_card() {
    let mut card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let session =
        open_secure_channel(&mut card, StaticKeys::from_single_key(CARD_KEY), SecurityLevel::CMac)
            .unwrap();

    assert!(session.is_established());
    assert!(card.authenticated);
    assert_eq!(&card.last_mac, session.c_mac());
}

#[test]
fn test_channel_chains_macs() {
    let card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let mut channel =
        SecureChannel::open(card, StaticKeys::from_single_key(CARD_KEY), SecurityLevel::CMac)
            .unwrap();

    let get_status = GetStatusCommand::issuer_security_domain().to_command().unwrap();
    for _ in 0..3 {
        let response = channel.transmit(&get_status).unwrap();
        assert!(response.is_success());

        let isd = registry::parse_issuer_security_domain(response.payload()).unwrap();
        assert_eq!(isd.aid.as_ref(), hex!("A000000003000000"));
    }

    let session_mac = *channel.session().c_mac();
    let card = channel.into_transport();
    assert_eq!(card.last_mac, session_mac);
}

#[test]
fn test_get_status_across_responses() {
    let card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let mut channel =
        SecureChannel::open(card, StaticKeys::from_single_key(CARD_KEY), SecurityLevel::CMac)
            .unwrap();

    let pages = channel.get_status(&GetStatusCommand::applications()).unwrap();
    assert_eq!(pages.len(), 2);

    let apps = registry::parse_application_pages(&pages).unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].aid.as_ref(), hex!("A000000001"));
    assert_eq!(apps[1].aid.as_ref(), hex!("A000000081"));

    let files = channel
        .get_status(&GetStatusCommand::executable_load_files())
        .unwrap();
    assert!(files.is_empty());

    // The card verified every C-MAC, so both chains ended on the same value
    let session_mac = *channel.session().c_mac();
    assert_eq!(channel.into_transport().last_mac, session_mac);
}

#[test]
fn test_wrong_keys_rejected_by_host() {
    let mut card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let err = open_secure_channel(
        &mut card,
        StaticKeys::from_single_key([0x11; 16]),
        SecurityLevel::CMac,
    )
    .unwrap_err();
    assert!(matches!(err, Error::CardCryptogramMismatch { .. }));
    assert!(!card.authenticated);
}

#[test]
fn test_session_keys_supplied_directly() {
    let mut card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let session_keys = StaticKeys::from_single_key(CARD_KEY)
        .derive(&hex!("002A"))
        .unwrap();

    let session = open_secure_channel_with_challenge(
        &mut card,
        session_keys,
        SecurityLevel::CMac,
        hex!("0102030405060708"),
    )
    .unwrap();
    assert!(session.is_established());
    assert!(card.authenticated);
}

#[test]
fn test_encrypted_level_authenticates() {
    // The card only checks MACs, which are computed over the plain data
    let mut card = SimulatedCard::new(StaticKeys::from_single_key(CARD_KEY));
    let session = open_secure_channel(
        &mut card,
        StaticKeys::from_single_key(CARD_KEY),
        SecurityLevel::CDecryption,
    )
    .unwrap();
    assert_eq!(session.protection_order(), ProtectionOrder::MacThenEncrypt);
    assert!(card.authenticated);
}
