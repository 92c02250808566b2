//! GET STATUS command for GlobalPlatform
//!
//! This command is used to retrieve information about applications,
//! security domains, and load files on the card. Use [`crate::registry`] to
//! decode the returned entries.

use nexum_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{cla, get_status_p1, get_status_p2, ins, tags},
    tlv::{Tag, Tlv},
};

/// Largest AID length
pub const MAX_AID_LENGTH: usize = 16;

/// Subset of the registry queried by GET STATUS (P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GetStatusScope {
    /// Issuer security domain only
    IssuerSecurityDomain,
    /// Applications, including security domains
    Applications,
    /// Executable load files
    ExecutableLoadFiles,
    /// Executable load files and their executable modules
    ExecutableLoadFilesAndModules,
}

impl GetStatusScope {
    /// P1 coding
    pub const fn p1(self) -> u8 {
        match self {
            Self::IssuerSecurityDomain => get_status_p1::ISSUER_SECURITY_DOMAIN,
            Self::Applications => get_status_p1::APPLICATIONS,
            Self::ExecutableLoadFiles => get_status_p1::EXEC_LOAD_FILES,
            Self::ExecutableLoadFilesAndModules => get_status_p1::EXEC_LOAD_FILES_AND_MODULES,
        }
    }
}

/// GET STATUS command for GlobalPlatform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetStatusCommand {
    scope: GetStatusScope,
    aid_filter: Vec<u8>,
    next_occurrence: bool,
}

impl GetStatusCommand {
    /// Query every entry in `scope`
    pub const fn new(scope: GetStatusScope) -> Self {
        Self {
            scope,
            aid_filter: Vec::new(),
            next_occurrence: false,
        }
    }

    /// Get status of issuer security domain
    pub const fn issuer_security_domain() -> Self {
        Self::new(GetStatusScope::IssuerSecurityDomain)
    }

    /// Get status of applications
    pub const fn applications() -> Self {
        Self::new(GetStatusScope::Applications)
    }

    /// Get status of executable load files
    pub const fn executable_load_files() -> Self {
        Self::new(GetStatusScope::ExecutableLoadFiles)
    }

    /// Restrict the query to AIDs starting with `aid`
    pub fn with_aid_filter(mut self, aid: impl AsRef<[u8]>) -> Result<Self> {
        let aid = aid.as_ref();
        if aid.len() > MAX_AID_LENGTH {
            return Err(Error::InvalidLength {
                field: "AID filter",
                expected: MAX_AID_LENGTH,
                actual: aid.len(),
            });
        }
        self.aid_filter = aid.to_vec();
        Ok(self)
    }

    /// Ask for the occurrences following a previous `6310` response
    pub const fn next_occurrence(mut self, next: bool) -> Self {
        self.next_occurrence = next;
        self
    }

    /// Queried scope
    pub const fn scope(&self) -> GetStatusScope {
        self.scope
    }

    /// Build the case 4 APDU
    pub fn to_command(&self) -> Result<Command> {
        let p2 = if self.next_occurrence {
            get_status_p2::TLV_DATA_NEXT
        } else {
            get_status_p2::TLV_DATA
        };
        let filter = Tlv::primitive(Tag::new(tags::AID)?, self.aid_filter.clone())?;

        Ok(Command::case4s(
            cla::GP,
            ins::GET_STATUS,
            self.scope.p1(),
            p2,
            filter.to_bytes(),
            0x00,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_get_status_command() {
        let cmd = GetStatusCommand::issuer_security_domain().to_command().unwrap();
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F28002024F0000"));

        let cmd = GetStatusCommand::applications()
            .with_aid_filter(hex!("AABBCC"))
            .unwrap()
            .to_command()
            .unwrap();
        assert_eq!(cmd.p1(), get_status_p1::APPLICATIONS);
        assert_eq!(cmd.data(), hex!("4F03AABBCC"));
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F24002054F03AABBCC00"));
    }

    #[test]
    fn test_get_status_next_occurrence() {
        let cmd = GetStatusCommand::new(GetStatusScope::ExecutableLoadFilesAndModules)
            .next_occurrence(true)
            .to_command()
            .unwrap();
        assert_eq!(cmd.p1(), 0x10);
        assert_eq!(cmd.p2(), 0x03);
    }

    #[test]
    fn test_aid_filter_too_long() {
        assert!(matches!(
            GetStatusCommand::applications().with_aid_filter([0u8; 17]),
            Err(Error::InvalidLength { actual: 17, .. })
        ));
    }
}
