//! # qwire: q/kdb+ IPC value codec
//!
//! Turns typed q values into the bytes of an IPC message and back.
//! No sockets, no handshake, no compression: just values ↔ bytes.
//!
//! ## Quick Example
//!
//! ```rust
//! use qwire::prelude::*;
//!
//! let value = Value::longs([1, i64::MIN, 3]);
//! let bytes = qwire::encode(&value, &EncodeOptions::default()).unwrap();
//! assert_eq!(qwire::decode(&bytes).unwrap(), value);
//! assert_eq!(value.to_string(), "1 0N 3");
//! ```
//!
//! ## Layout
//!
//! | Module     | Role                                         |
//! |------------|----------------------------------------------|
//! | `types`    | Type tags: widths, nulls, protocol versions  |
//! | `value`    | The value model                              |
//! | `text`     | Verbatim byte text for symbols and names     |
//! | `protocol` | Header, encoder, decoder                     |
//! | `temporal` | chrono ↔ raw q offsets                       |
//! | `display`  | q-literal rendering                          |
//! | `config`   | `qwire.toml` codec defaults                  |

pub mod config;
pub mod display;
pub mod error;
pub mod protocol;
pub mod temporal;
pub mod text;
pub mod types;
pub mod value;

pub use error::{CodecError, CodecResult};
pub use text::Text;
pub use value::{
    Adverb, AdverbKind, Atom, Attribute, Dictionary, KeyedTable, Lambda, Primitive,
    PrimitiveArity, Projection, Table, Value, Vector, VectorData,
};

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::*;
    pub use crate::protocol::{
        CharStringPolicy, EncodeOptions, Endianness, Message, MessageHeader, MessageType,
        QDecoder, QEncoder,
    };
    pub use crate::text::Text;
    pub use crate::types::{Category, TypeTag};
    pub use crate::value::*;
}

/// Encode a value as a complete message of `options.message_type`.
pub fn encode(value: &value::Value, options: &protocol::EncodeOptions) -> CodecResult<bytes::BytesMut> {
    protocol::QEncoder::new(*options).encode(value, options.message_type)
}

/// Decode a complete message. Remote errors surface as [`CodecError::Remote`].
pub fn decode(buf: &[u8]) -> CodecResult<value::Value> {
    protocol::QDecoder::new().decode(buf)
}
