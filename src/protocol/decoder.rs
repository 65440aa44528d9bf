//! q IPC Decoder
//!
//! Parses a complete message (header + body) back into a [`Value`].
//! Every read is bounds-checked against the bytes actually received; a
//! hostile count fails with `TruncatedMessage` before anything is allocated
//! for it.

use bytes::Buf;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::header::{Endianness, HEADER_LEN, MessageHeader};
use crate::error::{CodecError, CodecResult};
use crate::text::Text;
use crate::types::{TypeTag, days_to_datetime};
use crate::value::{
    Adverb, AdverbKind, Atom, Attribute, Dictionary, KeyedTable, Lambda, Primitive,
    PrimitiveArity, Projection, Table, Value, Vector, VectorData,
};

/// Default limit on container nesting. Decoding recurses once per level, so
/// this must stay well inside a 2 MiB thread stack in debug builds.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A decoded message: header plus value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub header: MessageHeader,
    pub value: Value,
}

/// Parses wire bytes into values.
#[derive(Debug, Clone)]
pub struct QDecoder {
    max_depth: usize,
}

impl Default for QDecoder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl QDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how deeply containers may nest.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Decode a message into its value.
    ///
    /// An error value anywhere in the message is returned as
    /// [`CodecError::Remote`].
    pub fn decode(&self, buf: &[u8]) -> CodecResult<Value> {
        let message = self.decode_message(buf)?;
        if let Some(text) = message.value.find_error() {
            return Err(CodecError::Remote(text.to_string_lossy().into_owned()));
        }
        Ok(message.value)
    }

    /// Decode a message, keeping error values as [`Value::Error`].
    pub fn decode_message(&self, buf: &[u8]) -> CodecResult<Message> {
        let header = MessageHeader::parse(buf)?;
        if buf.len() < header.length {
            return Err(CodecError::truncated(0, header.length, buf.len()));
        }
        if buf.len() > header.length {
            return Err(CodecError::framing(format!(
                "header declares {} bytes but {} were received",
                header.length,
                buf.len()
            )));
        }
        if header.compressed {
            return Err(CodecError::CompressedMessage);
        }

        let mut reader = Reader::new(
            &buf[HEADER_LEN..],
            header.endianness,
            HEADER_LEN,
            self.max_depth,
        );
        let value = reader.read_value()?;
        reader.finish()?;

        debug!(
            tag = %value.tag(),
            message_type = ?header.message_type,
            bytes = header.length,
            "decoded q message"
        );
        Ok(Message { header, value })
    }

    /// Decode a header-less body.
    pub fn decode_body(&self, body: &[u8], endianness: Endianness) -> CodecResult<Value> {
        let mut reader = Reader::new(body, endianness, 0, self.max_depth);
        let value = reader.read_value()?;
        reader.finish()?;
        Ok(value)
    }
}

// ==================== Reader ====================

macro_rules! read_num {
    ($name:ident, $ty:ty, $le:ident, $be:ident) => {
        fn $name(&mut self) -> CodecResult<$ty> {
            self.need(std::mem::size_of::<$ty>())?;
            Ok(match self.endianness {
                Endianness::Little => self.buf.$le(),
                Endianness::Big => self.buf.$be(),
            })
        }
    };
}

/// Cursor over the body. Offsets in errors are from the start of the message.
struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
    base: usize,
    endianness: Endianness,
    depth: usize,
    max_depth: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], endianness: Endianness, base: usize, max_depth: usize) -> Self {
        Self {
            buf,
            total: buf.len(),
            base,
            endianness,
            depth: 0,
            max_depth,
        }
    }

    fn offset(&self) -> usize {
        self.base + self.total - self.buf.remaining()
    }

    fn need(&self, needed: usize) -> CodecResult<()> {
        if self.buf.remaining() < needed {
            return Err(CodecError::truncated(
                self.offset(),
                needed,
                self.buf.remaining(),
            ));
        }
        Ok(())
    }

    fn finish(&self) -> CodecResult<()> {
        if self.buf.has_remaining() {
            return Err(CodecError::framing(format!(
                "{} trailing bytes after the value at offset {}",
                self.buf.remaining(),
                self.offset()
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> CodecResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn i8(&mut self) -> CodecResult<i8> {
        self.need(1)?;
        Ok(self.buf.get_i8())
    }

    read_num!(i16, i16, get_i16_le, get_i16);
    read_num!(i32, i32, get_i32_le, get_i32);
    read_num!(i64, i64, get_i64_le, get_i64);
    read_num!(f32, f32, get_f32_le, get_f32);
    read_num!(f64, f64, get_f64_le, get_f64);

    fn bytes(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        self.need(n)?;
        let buf = self.buf;
        let (head, tail) = buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn guid(&mut self) -> CodecResult<Uuid> {
        let raw = self.bytes(16)?;
        Uuid::from_slice(raw).map_err(|e| CodecError::structure(e.to_string()))
    }

    /// Element count, checked against the bytes left for `width`-byte items.
    fn count(&mut self, width: usize) -> CodecResult<usize> {
        let offset = self.offset();
        let raw = self.i32()?;
        let count = usize::try_from(raw).map_err(|_| {
            CodecError::structure(format!("negative count {raw} at offset {offset}"))
        })?;
        let needed = count.saturating_mul(width);
        self.need(needed)?;
        Ok(count)
    }

    /// NUL-terminated text, kept as raw bytes.
    fn text(&mut self) -> CodecResult<Text> {
        let offset = self.offset();
        let Some(end) = self.buf.iter().position(|&b| b == 0) else {
            return Err(CodecError::truncated(
                offset,
                self.buf.len() + 1,
                self.buf.len(),
            ));
        };
        let raw = self.bytes(end)?;
        self.buf.advance(1);
        Ok(Text::from(raw))
    }

    // ==================== Values ====================

    fn read_value(&mut self) -> CodecResult<Value> {
        if self.depth >= self.max_depth {
            return Err(CodecError::structure(format!(
                "nesting deeper than {} at offset {}",
                self.max_depth,
                self.offset()
            )));
        }
        self.depth += 1;
        let value = self.read_tagged();
        self.depth -= 1;
        value
    }

    fn read_tagged(&mut self) -> CodecResult<Value> {
        let offset = self.offset();
        let code = self.i8()?;

        if code < 0 && code != TypeTag::Error.code() {
            let tag = TypeTag::from_code(-code)
                .filter(|t| t.is_scalar())
                .ok_or_else(|| {
                    CodecError::unsupported(format!("atom type {code} at offset {offset}"))
                })?;
            return Ok(Value::Atom(self.atom(tag)?));
        }

        let tag = TypeTag::from_code(code).ok_or_else(|| {
            CodecError::unsupported(format!("type {code} at offset {offset}"))
        })?;

        match tag {
            TypeTag::List => {
                let _attribute = self.u8()?;
                let count = self.count(1)?;
                Ok(Value::List(self.values(count)?))
            }
            TypeTag::Dictionary | TypeTag::SortedDictionary => self.dictionary(),
            TypeTag::Table => Ok(Value::Table(self.table()?)),
            TypeTag::Lambda => self.lambda(),
            TypeTag::UnaryPrimitive | TypeTag::BinaryPrimitive | TypeTag::TernaryPrimitive => {
                let code = self.u8()?;
                let arity = match tag {
                    TypeTag::UnaryPrimitive if code == 0 => return Ok(Value::Null),
                    TypeTag::UnaryPrimitive => PrimitiveArity::Unary,
                    TypeTag::BinaryPrimitive => PrimitiveArity::Binary,
                    _ => PrimitiveArity::Ternary,
                };
                Ok(Value::Primitive(Primitive { arity, code }))
            }
            TypeTag::Projection => {
                let count = self.count(1)?;
                if count == 0 {
                    return Err(CodecError::structure(format!(
                        "empty projection at offset {offset}"
                    )));
                }
                let function = self.read_value()?;
                let args = self.values(count - 1)?;
                Ok(Value::Projection(Projection::new(function, args)))
            }
            TypeTag::Composition => {
                let count = self.count(1)?;
                Ok(Value::Composition(self.values(count)?))
            }
            TypeTag::Each
            | TypeTag::Over
            | TypeTag::Scan
            | TypeTag::EachPrior
            | TypeTag::EachRight
            | TypeTag::EachLeft => {
                let kind = AdverbKind::from_tag(tag)
                    .ok_or_else(|| CodecError::unsupported(tag.to_string()))?;
                let function = self.read_value()?;
                Ok(Value::Adverb(Adverb::new(kind, function)))
            }
            TypeTag::Error => Ok(Value::Error(self.text()?)),
            _ => Ok(Value::Vector(self.vector(tag)?)),
        }
    }

    fn values(&mut self, count: usize) -> CodecResult<Vec<Value>> {
        let mut items = Vec::with_capacity(count.min(self.buf.remaining()));
        for _ in 0..count {
            items.push(self.read_value()?);
        }
        Ok(items)
    }

    fn atom(&mut self, tag: TypeTag) -> CodecResult<Atom> {
        let atom = match tag {
            TypeTag::Boolean => Atom::Boolean(self.u8()? != 0),
            TypeTag::Guid => Atom::Guid(self.guid()?),
            TypeTag::Byte => Atom::Byte(self.u8()?),
            TypeTag::Short => Atom::Short(self.i16()?),
            TypeTag::Int => Atom::Int(self.i32()?),
            TypeTag::Long => Atom::Long(self.i64()?),
            TypeTag::Real => Atom::Real(self.f32()?),
            TypeTag::Float => Atom::Float(self.f64()?),
            TypeTag::Char => Atom::Char(self.u8()?),
            TypeTag::Symbol => Atom::Symbol(self.text()?),
            TypeTag::Timestamp => Atom::Timestamp(self.i64()?),
            TypeTag::Month => Atom::Month(self.i32()?),
            TypeTag::Date => Atom::Date(self.i32()?),
            TypeTag::Datetime => Atom::Datetime(days_to_datetime(self.f64()?)?),
            TypeTag::Timespan => Atom::Timespan(self.i64()?),
            TypeTag::Minute => Atom::Minute(self.i32()?),
            TypeTag::Second => Atom::Second(self.i32()?),
            TypeTag::Time => Atom::Time(self.i32()?),
            other => return Err(CodecError::unsupported(format!("{other} has no atom form"))),
        };
        Ok(atom)
    }

    fn vector(&mut self, tag: TypeTag) -> CodecResult<Vector> {
        let attribute = Attribute(self.u8()?);
        // symbols are at least one byte each
        let count = self.count(tag.width().unwrap_or(1))?;

        macro_rules! collect {
            ($variant:ident, $read:expr) => {{
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push($read);
                }
                VectorData::$variant(items)
            }};
        }

        let data = match tag {
            TypeTag::Boolean => collect!(Boolean, self.u8()? != 0),
            TypeTag::Guid => collect!(Guid, self.guid()?),
            TypeTag::Byte => VectorData::Byte(self.bytes(count)?.to_vec()),
            TypeTag::Char => VectorData::Char(self.bytes(count)?.to_vec()),
            TypeTag::Short => collect!(Short, self.i16()?),
            TypeTag::Int => collect!(Int, self.i32()?),
            TypeTag::Long => collect!(Long, self.i64()?),
            TypeTag::Real => collect!(Real, self.f32()?),
            TypeTag::Float => collect!(Float, self.f64()?),
            TypeTag::Symbol => collect!(Symbol, self.text()?),
            TypeTag::Timestamp => collect!(Timestamp, self.i64()?),
            TypeTag::Month => collect!(Month, self.i32()?),
            TypeTag::Date => collect!(Date, self.i32()?),
            TypeTag::Datetime => collect!(Datetime, days_to_datetime(self.f64()?)?),
            TypeTag::Timespan => collect!(Timespan, self.i64()?),
            TypeTag::Minute => collect!(Minute, self.i32()?),
            TypeTag::Second => collect!(Second, self.i32()?),
            TypeTag::Time => collect!(Time, self.i32()?),
            other => {
                return Err(CodecError::unsupported(format!(
                    "{other} has no vector form"
                )));
            }
        };
        Ok(Vector { attribute, data })
    }

    fn dictionary(&mut self) -> CodecResult<Value> {
        let keys = self.read_value()?;
        let values = self.read_value()?;
        match (keys, values) {
            (Value::Table(keys), Value::Table(values)) => {
                let keyed = KeyedTable::new(keys, values);
                keyed.check_shape()?;
                Ok(Value::KeyedTable(keyed))
            }
            (keys, values) => {
                let dict = Dictionary::new(keys, values);
                dict.check_shape()?;
                Ok(Value::Dictionary(dict))
            }
        }
    }

    fn table(&mut self) -> CodecResult<Table> {
        let attribute = Attribute(self.u8()?);
        let offset = self.offset();
        let code = self.i8()?;
        if code != TypeTag::Dictionary.code() {
            return Err(CodecError::structure(format!(
                "table at offset {offset} wraps type {code}, expected a dictionary"
            )));
        }

        let columns = match self.read_value()? {
            Value::Vector(Vector {
                data: VectorData::Symbol(names),
                ..
            }) => names,
            other => {
                return Err(CodecError::structure(format!(
                    "table column names must be a symbol vector, got {}",
                    other.tag()
                )));
            }
        };
        let data = match self.read_value()? {
            Value::List(data) => data,
            other => {
                return Err(CodecError::structure(format!(
                    "table columns must be a general list, got {}",
                    other.tag()
                )));
            }
        };

        let table = Table {
            attribute,
            columns,
            data,
        };
        table.check_shape()?;
        Ok(table)
    }

    fn lambda(&mut self) -> CodecResult<Value> {
        let context = self.text()?;
        let expression = match self.read_value()? {
            Value::Vector(Vector {
                data: VectorData::Char(bytes),
                ..
            }) => Text::from(bytes),
            Value::Atom(Atom::Char(c)) => Text::from(vec![c]),
            other => {
                return Err(CodecError::structure(format!(
                    "lambda body must be a string, got {}",
                    other.tag()
                )));
            }
        };
        Ok(Value::Lambda(Lambda {
            context,
            expression,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::MessageType;

    fn message(body: &[u8]) -> Vec<u8> {
        let mut buf = MessageHeader::new(MessageType::Response, HEADER_LEN + body.len())
            .to_bytes()
            .unwrap()
            .to_vec();
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_decode_long() {
        let buf = message(&[0xf9, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(QDecoder::new().decode(&buf).unwrap(), Value::long(1));
    }

    #[test]
    fn test_decode_message_keeps_header() {
        let buf = message(&[0x65, 0]);
        let msg = QDecoder::new().decode_message(&buf).unwrap();
        assert_eq!(msg.header.message_type, MessageType::Response);
        assert_eq!(msg.value, Value::Null);
    }

    #[test]
    fn test_remote_error() {
        let buf = message(&[0x80, b't', b'y', b'p', b'e', 0]);
        assert_eq!(
            QDecoder::new().decode(&buf).unwrap_err(),
            CodecError::Remote("type".into())
        );
        let msg = QDecoder::new().decode_message(&buf).unwrap();
        assert_eq!(msg.value, Value::error("type"));
    }

    #[test]
    fn test_truncated_buffer() {
        let mut buf = message(&[0xf9, 1, 0, 0, 0, 0, 0, 0, 0]);
        buf.truncate(12);
        assert!(matches!(
            QDecoder::new().decode(&buf),
            Err(CodecError::TruncatedMessage { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut buf = message(&[0xf9, 1, 0, 0, 0, 0, 0, 0, 0]);
        buf.push(0);
        assert!(matches!(
            QDecoder::new().decode(&buf),
            Err(CodecError::FramingMismatch(_))
        ));

        // length field agrees, value ends early
        let buf = message(&[0xfa, 1, 0, 0, 0, 0xff]);
        assert!(matches!(
            QDecoder::new().decode(&buf),
            Err(CodecError::FramingMismatch(_))
        ));
    }

    #[test]
    fn test_oversized_count_is_truncation() {
        let buf = message(&[0x07, 0, 0xff, 0xff, 0xff, 0x7f]);
        let err = QDecoder::new().decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedMessage { offset: 14, .. }));
    }

    #[test]
    fn test_negative_count() {
        let buf = message(&[0x07, 0, 0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            QDecoder::new().decode(&buf),
            Err(CodecError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            QDecoder::new().decode(&message(&[0x03, 0, 0, 0, 0, 0])),
            Err(CodecError::UnsupportedType(_))
        ));
        assert!(matches!(
            QDecoder::new().decode(&message(&[0xfd, 0])),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_compressed_rejected() {
        let mut buf = message(&[0xf9, 1, 0, 0, 0, 0, 0, 0, 0]);
        buf[2] = 1;
        assert_eq!(
            QDecoder::new().decode(&buf).unwrap_err(),
            CodecError::CompressedMessage
        );
    }

    #[test]
    fn test_big_endian_body() {
        let body = [0x07, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 1, 0x80, 0, 0, 0, 0, 0, 0, 0];
        let value = QDecoder::new().decode_body(&body, Endianness::Big).unwrap();
        assert_eq!(value, Value::longs([1, i64::MIN]));
    }

    #[test]
    fn test_unary_primitive_zero_is_null() {
        let value = QDecoder::new()
            .decode_body(&[0x65, 0], Endianness::Little)
            .unwrap();
        assert!(matches!(value, Value::Null));
        let value = QDecoder::new()
            .decode_body(&[0x65, 0x0b], Endianness::Little)
            .unwrap();
        assert!(matches!(value, Value::Primitive(_)));
    }

    #[test]
    fn test_sorted_dictionary() {
        // `s#`a`b!1 2
        let body = [
            0x7f, 0x0b, 1, 2, 0, 0, 0, b'a', 0, b'b', 0, 0x06, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0,
            0, 0,
        ];
        let value = QDecoder::new()
            .decode_body(&body, Endianness::Little)
            .unwrap();
        let Value::Dictionary(dict) = value else {
            panic!("expected dictionary");
        };
        assert_eq!(dict.get("b"), Some(Value::int(2)));
    }

    #[test]
    fn test_dictionary_length_mismatch() {
        let body = [0x63, 0x0b, 0, 1, 0, 0, 0, b'a', 0, 0x06, 0, 0, 0, 0, 0];
        assert!(matches!(
            QDecoder::new().decode_body(&body, Endianness::Little),
            Err(CodecError::InvalidStructure(_))
        ));
    }

    /// `depth` one-item lists wrapped around `::`.
    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut body = Vec::with_capacity(depth * 6 + 2);
        for _ in 0..depth {
            body.extend_from_slice(&[0, 0, 1, 0, 0, 0]);
        }
        body.extend_from_slice(&[0x65, 0]);
        body
    }

    /// Decode a full message on a thread with the default test stack size.
    fn decode_on_small_stack(body: Vec<u8>) -> CodecResult<Message> {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || QDecoder::new().decode_message(&message(&body)))
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_depth_limit() {
        let body = nested_lists(10);
        let shallow = QDecoder::new().with_max_depth(4);
        assert!(shallow.decode_body(&body, Endianness::Little).is_err());
        assert!(QDecoder::new().decode_body(&body, Endianness::Little).is_ok());
    }

    #[test]
    fn test_deepest_allowed_nesting_fits_the_stack() {
        let msg = decode_on_small_stack(nested_lists(DEFAULT_MAX_DEPTH - 1)).unwrap();
        assert!(matches!(msg.value, Value::List(_)));
    }

    #[test]
    fn test_nesting_at_limit_rejected() {
        assert!(matches!(
            decode_on_small_stack(nested_lists(DEFAULT_MAX_DEPTH)),
            Err(CodecError::InvalidStructure(_))
        ));
        // far past the limit is still an error, not a crash
        assert!(matches!(
            decode_on_small_stack(nested_lists(100_000)),
            Err(CodecError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_non_utf8_text_kept_verbatim() {
        let value = QDecoder::new()
            .decode_body(&[0xf5, b'c', b'a', b'f', 0xe9, 0], Endianness::Little)
            .unwrap();
        assert_eq!(value, Value::symbol(b"caf\xe9".to_vec()));

        let body = [0x64, 0, 0x0a, 0, 3, 0, 0, 0, b'{', 0xe9, b'}'];
        let value = QDecoder::new().decode_body(&body, Endianness::Little).unwrap();
        assert_eq!(value, Value::Lambda(Lambda::new(b"{\xe9}".to_vec())));
    }

    #[test]
    fn test_datetime_out_of_range_rejected() {
        let mut body = vec![0xf1];
        body.extend_from_slice(&1e300f64.to_le_bytes());
        assert!(matches!(
            QDecoder::new().decode_body(&body, Endianness::Little),
            Err(CodecError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_unterminated_symbol() {
        assert!(matches!(
            QDecoder::new().decode_body(&[0xf5, b'a', b'b'], Endianness::Little),
            Err(CodecError::TruncatedMessage { .. })
        ));
    }
}
