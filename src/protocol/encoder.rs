//! q IPC Encoder
//!
//! Serializes a [`Value`] tree into a complete little-endian message.
//! Pure computation: the caller owns the socket.
//!
//! # Layout
//!
//! - atom: negated type code, fixed-width payload
//! - vector: type code, attribute, i32 count, packed payloads
//! - table: `98`, attribute, `99`, symbol vector of names, list of columns
//! - keyed table: `99`, key table, value table
//!
//! The whole tree is validated before the first byte is written, so a failed
//! encode never yields a partial buffer.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::header::{HEADER_LEN, MessageHeader, MessageType};
use crate::error::{CodecError, CodecResult};
use crate::types::{TypeTag, datetime_to_days};
use crate::value::{Atom, Table, Value, Vector, VectorData};

/// How a one-element char vector is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharStringPolicy {
    /// Always a length-1 vector (`enlist "a"`).
    #[default]
    AsVector,
    /// A bare char atom (`"a"`).
    AsCharAtom,
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Capability version negotiated with the peer.
    pub protocol_version: u8,
    pub single_char_strings: CharStringPolicy,
    /// Used by [`crate::encode`].
    pub message_type: MessageType,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            protocol_version: 3,
            single_char_strings: CharStringPolicy::AsVector,
            message_type: MessageType::Sync,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    pub fn single_char_strings(mut self, policy: CharStringPolicy) -> Self {
        self.single_char_strings = policy;
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }
}

/// Takes a [`Value`] and produces wire bytes.
#[derive(Debug, Clone, Default)]
pub struct QEncoder {
    options: EncodeOptions,
}

impl QEncoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encode a full message: 8-byte header followed by the value.
    pub fn encode(&self, value: &Value, message_type: MessageType) -> CodecResult<BytesMut> {
        self.check(value)?;

        let mut buf = BytesMut::with_capacity(HEADER_LEN + 64);
        buf.put_bytes(0, HEADER_LEN);
        self.put_value(&mut buf, value, true);

        let header = MessageHeader::new(message_type, buf.len()).to_bytes()?;
        buf[..HEADER_LEN].copy_from_slice(&header);

        debug!(
            tag = %value.tag(),
            message_type = ?message_type,
            bytes = buf.len(),
            "encoded q message"
        );
        Ok(buf)
    }

    /// Encode the value alone, without a header.
    pub fn encode_body(&self, value: &Value) -> CodecResult<BytesMut> {
        self.check(value)?;
        let mut buf = BytesMut::new();
        self.put_value(&mut buf, value, true);
        Ok(buf)
    }

    fn check(&self, value: &Value) -> CodecResult<()> {
        value.validate()?;
        let version = self.options.protocol_version;
        if let Some(tag) = value.find_tag(&|t| t.min_protocol_version() > version) {
            return Err(CodecError::unsupported(format!(
                "{tag} requires protocol version {}, negotiated {version}",
                tag.min_protocol_version()
            )));
        }
        trace!(protocol_version = version, "value validated for encoding");
        Ok(())
    }

    // ==================== Values ====================

    /// `collapse` allows the single-char policy to apply at this position.
    /// Structural slots (dictionary halves, table columns) never collapse.
    fn put_value(&self, buf: &mut BytesMut, value: &Value, collapse: bool) {
        match value {
            Value::Atom(atom) => put_atom(buf, atom),
            Value::Vector(vector) => {
                if collapse && self.collapses(vector) {
                    if let VectorData::Char(chars) = &vector.data {
                        put_atom(buf, &Atom::Char(chars[0]));
                        return;
                    }
                }
                put_vector(buf, vector);
            }
            Value::List(items) => {
                put_tag(buf, TypeTag::List);
                buf.put_u8(0);
                put_count(buf, items.len());
                for item in items {
                    self.put_value(buf, item, true);
                }
            }
            Value::Dictionary(dict) => {
                put_tag(buf, TypeTag::Dictionary);
                self.put_value(buf, &dict.keys, false);
                self.put_value(buf, &dict.values, false);
            }
            Value::Table(table) => self.put_table(buf, table),
            Value::KeyedTable(keyed) => {
                put_tag(buf, TypeTag::Dictionary);
                self.put_table(buf, &keyed.keys);
                self.put_table(buf, &keyed.values);
            }
            Value::Lambda(lambda) => {
                put_tag(buf, TypeTag::Lambda);
                put_text(buf, &lambda.context);
                put_tag(buf, TypeTag::Char);
                buf.put_u8(0);
                put_count(buf, lambda.expression.len());
                buf.put_slice(lambda.expression.as_bytes());
            }
            Value::Projection(projection) => {
                put_tag(buf, TypeTag::Projection);
                put_count(buf, projection.args.len() + 1);
                self.put_value(buf, &projection.function, true);
                for arg in &projection.args {
                    self.put_value(buf, arg, true);
                }
            }
            Value::Composition(functions) => {
                put_tag(buf, TypeTag::Composition);
                put_count(buf, functions.len());
                for function in functions {
                    self.put_value(buf, function, true);
                }
            }
            Value::Adverb(adverb) => {
                put_tag(buf, adverb.kind.tag());
                self.put_value(buf, &adverb.function, true);
            }
            Value::Primitive(primitive) => {
                put_tag(buf, primitive.arity.tag());
                buf.put_u8(primitive.code);
            }
            Value::Error(message) => {
                put_tag(buf, TypeTag::Error);
                put_text(buf, message);
            }
            Value::Null => {
                put_tag(buf, TypeTag::UnaryPrimitive);
                buf.put_u8(0);
            }
        }
    }

    fn collapses(&self, vector: &Vector) -> bool {
        self.options.single_char_strings == CharStringPolicy::AsCharAtom
            && matches!(&vector.data, VectorData::Char(chars) if chars.len() == 1)
    }

    fn put_table(&self, buf: &mut BytesMut, table: &Table) {
        put_tag(buf, TypeTag::Table);
        buf.put_u8(table.attribute.0);
        put_tag(buf, TypeTag::Dictionary);

        put_tag(buf, TypeTag::Symbol);
        buf.put_u8(0);
        put_count(buf, table.columns.len());
        for name in &table.columns {
            put_text(buf, name);
        }

        put_tag(buf, TypeTag::List);
        buf.put_u8(0);
        put_count(buf, table.data.len());
        for column in &table.data {
            self.put_value(buf, column, false);
        }
    }
}

// ==================== Primitives ====================

fn put_tag(buf: &mut BytesMut, tag: TypeTag) {
    buf.put_i8(tag.code());
}

/// Counts were range-checked by `Value::validate`.
fn put_count(buf: &mut BytesMut, count: usize) {
    buf.put_i32_le(count as i32);
}

/// NUL-terminated text.
fn put_text(buf: &mut BytesMut, text: &[u8]) {
    buf.put_slice(text);
    buf.put_u8(0);
}

fn put_atom(buf: &mut BytesMut, atom: &Atom) {
    buf.put_i8(-atom.tag().code());
    match atom {
        Atom::Boolean(b) => buf.put_u8(u8::from(*b)),
        Atom::Guid(g) => buf.put_slice(g.as_bytes()),
        Atom::Byte(b) | Atom::Char(b) => buf.put_u8(*b),
        Atom::Short(v) => buf.put_i16_le(*v),
        Atom::Int(v)
        | Atom::Month(v)
        | Atom::Date(v)
        | Atom::Minute(v)
        | Atom::Second(v)
        | Atom::Time(v) => buf.put_i32_le(*v),
        Atom::Long(v) | Atom::Timestamp(v) | Atom::Timespan(v) => buf.put_i64_le(*v),
        Atom::Real(v) => buf.put_f32_le(*v),
        Atom::Float(v) => buf.put_f64_le(*v),
        Atom::Datetime(v) => buf.put_f64_le(datetime_to_days(*v)),
        Atom::Symbol(s) => put_text(buf, s),
    }
}

fn put_vector(buf: &mut BytesMut, vector: &Vector) {
    put_tag(buf, vector.tag());
    buf.put_u8(vector.attribute.0);
    put_count(buf, vector.len());
    match &vector.data {
        VectorData::Boolean(items) => items.iter().for_each(|b| buf.put_u8(u8::from(*b))),
        VectorData::Guid(items) => items.iter().for_each(|g| buf.put_slice(g.as_bytes())),
        VectorData::Byte(items) | VectorData::Char(items) => buf.put_slice(items),
        VectorData::Short(items) => items.iter().for_each(|v| buf.put_i16_le(*v)),
        VectorData::Int(items)
        | VectorData::Month(items)
        | VectorData::Date(items)
        | VectorData::Minute(items)
        | VectorData::Second(items)
        | VectorData::Time(items) => items.iter().for_each(|v| buf.put_i32_le(*v)),
        VectorData::Long(items) | VectorData::Timestamp(items) | VectorData::Timespan(items) => {
            items.iter().for_each(|v| buf.put_i64_le(*v))
        }
        VectorData::Real(items) => items.iter().for_each(|v| buf.put_f32_le(*v)),
        VectorData::Float(items) => items.iter().for_each(|v| buf.put_f64_le(*v)),
        VectorData::Datetime(items) => items
            .iter()
            .for_each(|v| buf.put_f64_le(datetime_to_days(*v))),
        VectorData::Symbol(items) => items.iter().for_each(|s| put_text(buf, s)),
    }
}
