//! APDU command definitions
//!
//! This module provides the [`Command`] type, a short (non-extended) command
//! APDU according to ISO/IEC 7816-4. A command is created through one of the
//! four case constructors and afterwards only its data, Le and class byte may
//! be changed, each change being revalidated.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Largest command data field short framing can carry
pub const MAX_DATA_LENGTH: usize = 255;

/// Generic APDU command structure
#[derive(Debug, Clone)]
pub struct Command {
    /// Command class byte
    cla: u8,
    /// Instruction byte
    ins: u8,
    /// Parameter 1
    p1: u8,
    /// Parameter 2
    p2: u8,
    /// Command data, empty when absent
    data: Bytes,
    /// Expected length, present for cases 2S and 4S
    le: Option<u8>,
}

impl Command {
    /// Case 1: header only, no command data and no Le
    pub const fn case1(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: None,
        }
    }

    /// Case 2S: header followed by a one byte Le
    pub const fn case2s(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: Some(le),
        }
    }

    /// Case 3S: header, one byte Lc and command data
    pub fn case3s(cla: u8, ins: u8, p1: u8, p2: u8, data: impl Into<Bytes>) -> Result<Self> {
        let mut command = Self::case1(cla, ins, p1, p2);
        command.set_data(data)?;
        Ok(command)
    }

    /// Case 4S: header, one byte Lc, command data and a one byte Le
    pub fn case4s(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: impl Into<Bytes>,
        le: u8,
    ) -> Result<Self> {
        let mut command = Self::case3s(cla, ins, p1, p2, data)?;
        command.le = Some(le);
        Ok(command)
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command data, empty when the command carries none
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Expected response length (Le), if the command has an Le slot
    pub const fn expected_length(&self) -> Option<u8> {
        self.le
    }

    /// Length of the command data as the single Lc byte
    pub fn lc(&self) -> Result<u8> {
        u8::try_from(self.data.len()).map_err(|_| Error::data_too_large(self.data.len()))
    }

    /// Replace the command data, enforcing the 255 byte limit
    pub fn set_data(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        if data.len() > MAX_DATA_LENGTH {
            return Err(Error::data_too_large(data.len()));
        }
        self.data = data;
        Ok(())
    }

    /// Replace Le; only allowed for commands framed with an Le slot
    pub fn set_le(&mut self, le: &[u8]) -> Result<()> {
        if self.le.is_none() {
            return Err(Error::LeNotPresent);
        }
        match le {
            [byte] => {
                self.le = Some(*byte);
                Ok(())
            }
            _ => Err(Error::InvalidLe(le.len())),
        }
    }

    /// Replace the class byte
    pub const fn set_class(&mut self, cla: u8) {
        self.cla = cla;
    }

    /// Builder-style variant of [`Command::set_class`]
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Serialize to raw APDU bytes: CLA, INS, P1, P2, [Lc, data], [Le]
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if !self.data.is_empty() {
            // Length is bounded by `set_data`
            buffer.put_u8(self.data.len() as u8);
            buffer.put_slice(&self.data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Length of the serialized command
    pub fn command_length(&self) -> usize {
        let data = if self.data.is_empty() {
            0
        } else {
            1 + self.data.len()
        };
        4 + data + usize::from(self.le.is_some())
    }

    /// Parse a short command APDU from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let (cla, ins, p1, p2) = match raw {
            [cla, ins, p1, p2, ..] => (*cla, *ins, *p1, *p2),
            _ => return Err(Error::InvalidCommandLength(raw.len())),
        };

        match raw.len() {
            4 => Ok(Self::case1(cla, ins, p1, p2)),
            5 => Ok(Self::case2s(cla, ins, p1, p2, raw[4])),
            len => {
                let lc = raw[4] as usize;
                if lc == 0 {
                    return Err(Error::InvalidCommandLength(len));
                }
                let data = Bytes::copy_from_slice(raw.get(5..5 + lc).ok_or(Error::InvalidCommandLength(len))?);
                if len == 5 + lc {
                    Self::case3s(cla, ins, p1, p2, data)
                } else if len == 6 + lc {
                    Self::case4s(cla, ins, p1, p2, data, raw[5 + lc])
                } else {
                    Err(Error::InvalidCommandLength(len))
                }
            }
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl PartialEq<[u8]> for Command {
    fn eq(&self, other: &[u8]) -> bool {
        self.to_bytes().as_ref() == other
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}

impl From<&Command> for Bytes {
    fn from(command: &Command) -> Self {
        command.to_bytes()
    }
}
