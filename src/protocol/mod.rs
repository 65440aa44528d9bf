//! q IPC Wire Protocol
//!
//! Pure, synchronous value ↔ bytes computation. No sockets, no handshake,
//! no compression.
//!
//! Reference: https://code.kx.com/q/basics/ipc/

pub mod decoder;
pub mod encoder;
pub mod header;

pub use decoder::{Message, QDecoder};
pub use encoder::{CharStringPolicy, EncodeOptions, QEncoder};
pub use header::{Endianness, HEADER_LEN, MessageHeader, MessageType};
