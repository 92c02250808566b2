//! EXTERNAL AUTHENTICATE command for GlobalPlatform
//!
//! This command authenticates the host to the card and fixes the security
//! level of the secure channel.

use nexum_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, ins},
    crypto::Cryptogram,
    session::SecurityLevel,
};

/// EXTERNAL AUTHENTICATE command for GlobalPlatform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalAuthenticateCommand {
    security_level: SecurityLevel,
    host_cryptogram: Cryptogram,
}

impl ExternalAuthenticateCommand {
    /// Create a new EXTERNAL AUTHENTICATE command with host cryptogram
    pub const fn new(security_level: SecurityLevel, host_cryptogram: Cryptogram) -> Self {
        Self {
            security_level,
            host_cryptogram,
        }
    }

    /// Security level requested in P1
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Host cryptogram carried as command data
    pub const fn host_cryptogram(&self) -> &Cryptogram {
        &self.host_cryptogram
    }

    /// Build the plain case 3 APDU, before secure messaging
    pub fn to_command(&self) -> Result<Command> {
        Ok(Command::case3s(
            cla::GP,
            ins::EXTERNAL_AUTHENTICATE,
            self.security_level.bits(),
            0x00,
            self.host_cryptogram.to_vec(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_external_authenticate_command() {
        let cmd = ExternalAuthenticateCommand::new(SecurityLevel::CMac, hex!("1d4de92eaf7a2c9f"))
            .to_command()
            .unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80820100081d4de92eaf7a2c9f"));
        assert_eq!(cmd.expected_length(), None);

        let cmd =
            ExternalAuthenticateCommand::new(SecurityLevel::CDecryptionCMacRMac, [0; 8])
                .to_command()
                .unwrap();
        assert_eq!(cmd.p1(), 0x13);
    }
}
