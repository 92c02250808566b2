//! Status word definitions for APDU responses

use std::fmt;

use tracing::Level;

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

/// Named status conditions a response can report
///
/// `DataAvailable` and `WrongLengthInLe` carry information in SW2, which is
/// returned alongside by [`StatusWord::status_with_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 61 XX: XX more response bytes are available
    DataAvailable,
    /// 64 00: no specific diagnosis
    NoSpecificDiagnosis,
    /// 67 00: wrong length in Lc
    WrongLengthInLc,
    /// 68 81: logical channel not supported or not active
    LogicalChannelNotSupported,
    /// 69 82: security status not satisfied
    SecurityStatusNotSatisfied,
    /// 69 85: conditions of use not satisfied
    ConditionsOfUseNotSatisfied,
    /// 6A 86: incorrect P1 P2
    IncorrectP1P2,
    /// 6C XX: wrong Le, XX is the exact length
    WrongLengthInLe,
    /// 6D 00: invalid instruction
    InvalidInstruction,
    /// 6E 00: invalid class
    InvalidClass,
    /// 6F 00: no precise diagnosis
    NoPreciseDiagnosis,
    /// 90 00: success
    Success,
    /// Any status word outside the table
    Unknown(u16),
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Check if more data is available (61 XX)
    pub const fn is_more_data_available(&self) -> bool {
        self.sw1 == 0x61
    }

    /// Map the status word onto the named table
    pub const fn status(&self) -> Status {
        match (self.sw1, self.sw2) {
            (0x61, _) => Status::DataAvailable,
            (0x64, 0x00) => Status::NoSpecificDiagnosis,
            (0x67, 0x00) => Status::WrongLengthInLc,
            (0x68, 0x81) => Status::LogicalChannelNotSupported,
            (0x69, 0x82) => Status::SecurityStatusNotSatisfied,
            (0x69, 0x85) => Status::ConditionsOfUseNotSatisfied,
            (0x6A, 0x86) => Status::IncorrectP1P2,
            (0x6C, _) => Status::WrongLengthInLe,
            (0x6D, 0x00) => Status::InvalidInstruction,
            (0x6E, 0x00) => Status::InvalidClass,
            (0x6F, 0x00) => Status::NoPreciseDiagnosis,
            (0x90, 0x00) => Status::Success,
            _ => Status::Unknown(self.to_u16()),
        }
    }

    /// Named status plus SW2 when SW2 carries information (61 XX, 6C XX)
    pub const fn status_with_info(&self) -> (Status, Option<u8>) {
        let status = self.status();
        match status {
            Status::DataAvailable | Status::WrongLengthInLe => (status, Some(self.sw2)),
            _ => (status, None),
        }
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() || self.is_more_data_available() {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 {
            // Warnings
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match self.status() {
            Status::DataAvailable => "More data available",
            Status::NoSpecificDiagnosis => "No specific diagnosis",
            Status::WrongLengthInLc => "Wrong length in Lc",
            Status::LogicalChannelNotSupported => "Logical channel not supported or not active",
            Status::SecurityStatusNotSatisfied => "Security status not satisfied",
            Status::ConditionsOfUseNotSatisfied => "Conditions of use not satisfied",
            Status::IncorrectP1P2 => "Incorrect parameters P1-P2",
            Status::WrongLengthInLe => "Wrong length in Le",
            Status::InvalidInstruction => "Instruction code not supported or invalid",
            Status::InvalidClass => "Class not supported",
            Status::NoPreciseDiagnosis => "No precise diagnosis",
            Status::Success => "Success",
            Status::Unknown(_) => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl From<StatusWord> for Status {
    fn from(status: StatusWord) -> Self {
        status.status()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(sw) => write!(f, "Unknown({sw:04X})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Common status words
pub mod common {
    use super::StatusWord;

    /// Success (90 00)
    pub const SUCCESS: StatusWord = StatusWord::new(0x90, 0x00);

    /// Wrong length (67 00)
    pub const WRONG_LENGTH: StatusWord = StatusWord::new(0x67, 0x00);

    /// Security status not satisfied (69 82)
    pub const SECURITY_STATUS_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x82);

    /// Conditions of use not satisfied (69 85)
    pub const CONDITIONS_OF_USE_NOT_SATISFIED: StatusWord = StatusWord::new(0x69, 0x85);

    /// Incorrect P1 P2 (6A 86)
    pub const INCORRECT_P1P2: StatusWord = StatusWord::new(0x6A, 0x86);
}
