//! GlobalPlatform implementation for smart card management
//!
//! This crate provides the pieces a host needs to talk to a GlobalPlatform
//! card over an authenticated channel:
//!
//! - [`tlv`]: a BER-TLV codec used by card responses and command data
//! - [`crypto`]: the SCP02 primitives (session key derivation, cryptograms,
//!   retail MAC, key check values)
//! - [`session`]: the SCP02 state machine that authenticates the card and
//!   secures outbound commands
//! - [`secure_channel`]: the INITIALIZE UPDATE / EXTERNAL AUTHENTICATE
//!   exchange over a [`nexum_apdu_core::CardTransport`]
//! - [`registry`]: decoding of GET STATUS registry entries
//!
//! ```no_run
//! use nexum_apdu_globalplatform::{SecurityLevel, StaticKeys, open_secure_channel};
//! # fn run(transport: &mut impl nexum_apdu_core::CardTransport) -> nexum_apdu_globalplatform::Result<()> {
//! let keys = StaticKeys::from_single_key([0x40; 16]);
//! let session = open_secure_channel(transport, keys, SecurityLevel::CMac)?;
//! assert!(session.is_established());
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod privileges;
pub mod registry;
pub mod secure_channel;
pub mod session;
pub mod tlv;

pub use commands::{
    ExternalAuthenticateCommand, GetStatusCommand, GetStatusScope, InitializeUpdateCommand,
    InitializeUpdateResponse,
};
pub use crypto::KeyType;
pub use error::{Error, ErrorKind, Result};
pub use keys::{KeySet, SessionKeys, StaticKeys};
pub use privileges::Privileges;
pub use secure_channel::{SecureChannel, open_secure_channel, open_secure_channel_with_challenge};
pub use session::{ProtectionOrder, Scp02Session, Scp02SessionBuilder, SecurityLevel, SessionState};
pub use tlv::{Tag, Tlv, TlvError, TlvSearch};
