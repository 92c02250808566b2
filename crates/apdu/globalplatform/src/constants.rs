//! Constants used in GlobalPlatform operations
//!
//! This module contains various constants defined by GlobalPlatform,
//! such as CLA bytes, instruction codes, parameter values, tags and life cycle codings.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Secure messaging command class (with MAC)
    pub const MAC: u8 = 0x84;

    /// Secure messaging indicator for first interindustry class coding
    pub const SECURE_MESSAGING_FIRST: u8 = 0x04;
    /// Secure messaging indicator for further interindustry class coding
    pub const SECURE_MESSAGING_FURTHER: u8 = 0x20;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// GET DATA command
    pub const GET_DATA: u8 = 0xCA;
    /// GET RESPONSE command
    pub const GET_RESPONSE: u8 = 0xC0;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
    /// GET STATUS command
    pub const GET_STATUS: u8 = 0xF2;
    /// SET STATUS command
    pub const SET_STATUS: u8 = 0xF0;
    /// PUT KEY command
    pub const PUT_KEY: u8 = 0xD8;
    /// STORE DATA command
    pub const STORE_DATA: u8 = 0xE2;
    /// MANAGE CHANNEL command
    pub const MANAGE_CHANNEL: u8 = 0x70;
}

/// Parameter values for GET STATUS command (P1)
pub mod get_status_p1 {
    /// Get status of issuer security domain
    pub const ISSUER_SECURITY_DOMAIN: u8 = 0x80;
    /// Get status of applications
    pub const APPLICATIONS: u8 = 0x40;
    /// Get status of executable load files
    pub const EXEC_LOAD_FILES: u8 = 0x20;
    /// Get status of executable load files and modules
    pub const EXEC_LOAD_FILES_AND_MODULES: u8 = 0x10;
}

/// Parameter values for GET STATUS command (P2)
pub mod get_status_p2 {
    /// Return data in TLV format, first or all occurrences
    pub const TLV_DATA: u8 = 0x02;
    /// Return data in TLV format, next occurrences
    pub const TLV_DATA_NEXT: u8 = 0x03;
    /// Bit requesting the next occurrences
    pub const NEXT_OCCURRENCE: u8 = 0x01;
}

/// Commonly used status words in GlobalPlatform
pub mod status {
    use nexum_apdu_core::StatusWord;

    /// Success
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);
    /// More GET STATUS entries follow
    pub const MORE_DATA: StatusWord = StatusWord::new(0x63, 0x10);
    /// Security condition not satisfied
    pub const SECURITY_CONDITION_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);
    /// Referenced data not found
    pub const REFERENCED_DATA_NOT_FOUND: StatusWord = StatusWord::new(0x6A, 0x88);
}

/// Tags used in GlobalPlatform commands and responses
pub mod tags {
    /// GlobalPlatform registry related data
    pub const REGISTRY_ENTRY: &[u8] = &[0xE3];
    /// Application or executable load file AID
    pub const AID: &[u8] = &[0x4F];
    /// Life cycle state
    pub const LIFE_CYCLE_STATE: &[u8] = &[0x9F, 0x70];
    /// Privileges
    pub const PRIVILEGES: &[u8] = &[0xC5];
    /// Application's executable load file AID
    pub const EXECUTABLE_LOAD_FILE_AID: &[u8] = &[0xC4];
    /// Associated security domain AID
    pub const ASSOCIATED_SECURITY_DOMAIN_AID: &[u8] = &[0xCC];
    /// Executable load file version number
    pub const EXECUTABLE_LOAD_FILE_VERSION: &[u8] = &[0xCE];
    /// Executable module AID
    pub const EXECUTABLE_MODULE_AID: &[u8] = &[0x84];
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
}

/// Life cycle codings reported by GET STATUS
pub mod life_cycle {
    /// Card life cycle states
    pub mod card {
        /// OP_READY
        pub const OP_READY: u8 = 0x01;
        /// INITIALIZED
        pub const INITIALIZED: u8 = 0x07;
        /// SECURED
        pub const SECURED: u8 = 0x0F;
        /// CARD_LOCKED
        pub const CARD_LOCKED: u8 = 0x7F;
        /// TERMINATED
        pub const TERMINATED: u8 = 0xFF;
    }

    /// Application life cycle states
    pub mod application {
        /// INSTALLED
        pub const INSTALLED: u8 = 0x03;
        /// SELECTABLE
        pub const SELECTABLE: u8 = 0x07;
        /// LOCKED, set on top of the previous state
        pub const LOCKED: u8 = 0x80;
    }

    /// Security domain life cycle states
    pub mod security_domain {
        /// INSTALLED
        pub const INSTALLED: u8 = 0x03;
        /// SELECTABLE
        pub const SELECTABLE: u8 = 0x07;
        /// PERSONALIZED
        pub const PERSONALIZED: u8 = 0x0F;
        /// LOCKED
        pub const LOCKED: u8 = 0x83;
    }

    /// Executable load file life cycle states
    pub mod executable_load_file {
        /// LOADED
        pub const LOADED: u8 = 0x01;
    }
}

/// Length of the host challenge sent with INITIALIZE UPDATE
pub const HOST_CHALLENGE_LENGTH: usize = 8;

/// Length of the INITIALIZE UPDATE response data, status word excluded
pub const INITIALIZE_UPDATE_RESPONSE_LENGTH: usize = 28;

/// Security domain AID (ISD)
pub const SECURITY_DOMAIN_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];
