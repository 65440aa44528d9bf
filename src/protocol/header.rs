//! Message header: the fixed 8-byte frame in front of every value.
//!
//! ```text
//! byte 0  endianness   1 = little, 0 = big
//! byte 1  message type 0 async, 1 sync, 2 response
//! byte 2  compressed   0 / 1
//! byte 3  reserved
//! 4..8    i32 total length, header included
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 8;

/// Byte order announced in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    Big,
    #[default]
    Little,
}

impl Endianness {
    pub fn from_byte(byte: u8) -> CodecResult<Self> {
        match byte {
            0 => Ok(Endianness::Big),
            1 => Ok(Endianness::Little),
            other => Err(CodecError::framing(format!(
                "unknown endianness byte {other:#04x}"
            ))),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Endianness::Big => 0,
            Endianness::Little => 1,
        }
    }
}

/// Message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Async,
    #[default]
    Sync,
    Response,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> CodecResult<Self> {
        match byte {
            0 => Ok(MessageType::Async),
            1 => Ok(MessageType::Sync),
            2 => Ok(MessageType::Response),
            other => Err(CodecError::framing(format!(
                "unknown message type {other}"
            ))),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MessageType::Async => 0,
            MessageType::Sync => 1,
            MessageType::Response => 2,
        }
    }
}

/// Parsed message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub endianness: Endianness,
    pub message_type: MessageType,
    pub compressed: bool,
    /// Total message length including these 8 bytes.
    pub length: usize,
}

impl MessageHeader {
    /// Header for an uncompressed little-endian message of `length` bytes.
    pub fn new(message_type: MessageType, length: usize) -> Self {
        Self {
            endianness: Endianness::Little,
            message_type,
            compressed: false,
            length,
        }
    }

    /// Length of the body after the header.
    pub fn body_len(&self) -> usize {
        self.length.saturating_sub(HEADER_LEN)
    }

    pub fn to_bytes(&self) -> CodecResult<[u8; HEADER_LEN]> {
        let length = i32::try_from(self.length).map_err(|_| {
            CodecError::structure(format!(
                "message of {} bytes exceeds the 4-byte length field",
                self.length
            ))
        })?;
        let len_bytes = match self.endianness {
            Endianness::Little => length.to_le_bytes(),
            Endianness::Big => length.to_be_bytes(),
        };
        Ok([
            self.endianness.to_byte(),
            self.message_type.to_byte(),
            u8::from(self.compressed),
            0,
            len_bytes[0],
            len_bytes[1],
            len_bytes[2],
            len_bytes[3],
        ])
    }

    /// Parse the first 8 bytes of `buf`.
    ///
    /// Only the header itself is checked here; framing against the buffer
    /// length is the decoder's job.
    pub fn parse(buf: &[u8]) -> CodecResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::truncated(0, HEADER_LEN, buf.len()));
        }
        let endianness = Endianness::from_byte(buf[0])?;
        let message_type = MessageType::from_byte(buf[1])?;
        let compressed = match buf[2] {
            0 => false,
            1 => true,
            other => {
                return Err(CodecError::framing(format!(
                    "unknown compression flag {other}"
                )));
            }
        };
        let raw = [buf[4], buf[5], buf[6], buf[7]];
        let length = match endianness {
            Endianness::Little => i32::from_le_bytes(raw),
            Endianness::Big => i32::from_be_bytes(raw),
        };
        if length < HEADER_LEN as i32 {
            return Err(CodecError::framing(format!(
                "declared length {length} is shorter than the header"
            )));
        }
        Ok(Self {
            endianness,
            message_type,
            compressed,
            length: length as usize,
        })
    }
}
