//! q Type Registry
//!
//! One static table for every type tag the wire format knows: element width,
//! null sentinel, category and the protocol version that introduced it.
//! Encoder and decoder both read from here, so a new tag is one edit.
//!
//! Reference: https://code.kx.com/q/basics/datatypes/

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::text::Text;
use crate::value::Atom;

/// Bit pattern of the real (single precision) null, `0Ne`.
pub const NULL_REAL_BITS: u32 = 0xffc0_0000;

/// Bit pattern of the float null, `0n`. Datetime nulls use it too.
pub const NULL_FLOAT_BITS: u64 = 0xfff8_0000_0000_0000;

/// Milliseconds in one day; the legacy datetime form counts days.
pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Wire type tags.
///
/// Scalar tags (1..=19) are written negated for atoms and as-is for vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum TypeTag {
    List = 0,
    Boolean = 1,
    Guid = 2,
    Byte = 4,
    Short = 5,
    Int = 6,
    Long = 7,
    Real = 8,
    Float = 9,
    Char = 10,
    Symbol = 11,
    Timestamp = 12,
    Month = 13,
    Date = 14,
    Datetime = 15,
    Timespan = 16,
    Minute = 17,
    Second = 18,
    Time = 19,
    Table = 98,
    Dictionary = 99,
    Lambda = 100,
    UnaryPrimitive = 101,
    BinaryPrimitive = 102,
    TernaryPrimitive = 103,
    Projection = 104,
    Composition = 105,
    Each = 106,
    Over = 107,
    Scan = 108,
    EachPrior = 109,
    EachRight = 110,
    EachLeft = 111,
    SortedDictionary = 127,
    Error = -128,
}

/// Semantic family of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Boolean,
    Integer,
    Floating,
    /// Points in time: timestamp, month, date, datetime.
    TemporalDate,
    /// Durations and times of day: timespan, minute, second, time.
    TemporalTime,
    Textual,
    Symbolic,
    Guid,
    Container,
    Function,
    Error,
}

// Little-endian wire bytes of each null sentinel.
static NULL_BYTE: [u8; 1] = [0x00];
static NULL_GUID: [u8; 16] = [0x00; 16];
static NULL_SHORT: [u8; 2] = [0x00, 0x80];
static NULL_INT: [u8; 4] = [0x00, 0x00, 0x00, 0x80];
static NULL_LONG: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80];
static NULL_REAL: [u8; 4] = NULL_REAL_BITS.to_le_bytes();
static NULL_FLOAT: [u8; 8] = NULL_FLOAT_BITS.to_le_bytes();
static NULL_CHAR: [u8; 1] = [b' '];
static NULL_SYMBOL: [u8; 0] = [];

impl TypeTag {
    /// Every scalar tag, in wire-code order.
    pub const ALL_SCALARS: [TypeTag; 18] = [
        TypeTag::Boolean,
        TypeTag::Guid,
        TypeTag::Byte,
        TypeTag::Short,
        TypeTag::Int,
        TypeTag::Long,
        TypeTag::Real,
        TypeTag::Float,
        TypeTag::Char,
        TypeTag::Symbol,
        TypeTag::Timestamp,
        TypeTag::Month,
        TypeTag::Date,
        TypeTag::Datetime,
        TypeTag::Timespan,
        TypeTag::Minute,
        TypeTag::Second,
        TypeTag::Time,
    ];

    /// Numeric wire code of the tag (vector form for scalars).
    pub fn code(self) -> i8 {
        self as i8
    }

    /// Map a non-negative wire code (or the error code) back to a tag.
    ///
    /// Negative atom codes are not accepted here; negate them first.
    pub fn from_code(code: i8) -> Option<TypeTag> {
        let tag = match code {
            0 => TypeTag::List,
            1 => TypeTag::Boolean,
            2 => TypeTag::Guid,
            4 => TypeTag::Byte,
            5 => TypeTag::Short,
            6 => TypeTag::Int,
            7 => TypeTag::Long,
            8 => TypeTag::Real,
            9 => TypeTag::Float,
            10 => TypeTag::Char,
            11 => TypeTag::Symbol,
            12 => TypeTag::Timestamp,
            13 => TypeTag::Month,
            14 => TypeTag::Date,
            15 => TypeTag::Datetime,
            16 => TypeTag::Timespan,
            17 => TypeTag::Minute,
            18 => TypeTag::Second,
            19 => TypeTag::Time,
            98 => TypeTag::Table,
            99 => TypeTag::Dictionary,
            100 => TypeTag::Lambda,
            101 => TypeTag::UnaryPrimitive,
            102 => TypeTag::BinaryPrimitive,
            103 => TypeTag::TernaryPrimitive,
            104 => TypeTag::Projection,
            105 => TypeTag::Composition,
            106 => TypeTag::Each,
            107 => TypeTag::Over,
            108 => TypeTag::Scan,
            109 => TypeTag::EachPrior,
            110 => TypeTag::EachRight,
            111 => TypeTag::EachLeft,
            127 => TypeTag::SortedDictionary,
            -128 => TypeTag::Error,
            _ => return None,
        };
        Some(tag)
    }

    /// True for tags that have both an atom and a vector form.
    pub fn is_scalar(self) -> bool {
        (1..=19).contains(&self.code())
    }

    /// Element byte width for fixed-width vectors. `None` means variable
    /// (symbols) or not a scalar at all.
    pub fn width(self) -> Option<usize> {
        match self {
            TypeTag::Boolean | TypeTag::Byte | TypeTag::Char => Some(1),
            TypeTag::Short => Some(2),
            TypeTag::Int
            | TypeTag::Real
            | TypeTag::Month
            | TypeTag::Date
            | TypeTag::Minute
            | TypeTag::Second
            | TypeTag::Time => Some(4),
            TypeTag::Long
            | TypeTag::Float
            | TypeTag::Timestamp
            | TypeTag::Datetime
            | TypeTag::Timespan => Some(8),
            TypeTag::Guid => Some(16),
            _ => None,
        }
    }

    /// Wire bytes of the null sentinel, little-endian.
    ///
    /// The symbol sentinel is the empty text (written as a lone NUL).
    pub fn null_bits(self) -> Option<&'static [u8]> {
        match self {
            TypeTag::Boolean | TypeTag::Byte => Some(&NULL_BYTE),
            TypeTag::Guid => Some(&NULL_GUID),
            TypeTag::Short => Some(&NULL_SHORT),
            TypeTag::Int
            | TypeTag::Month
            | TypeTag::Date
            | TypeTag::Minute
            | TypeTag::Second
            | TypeTag::Time => Some(&NULL_INT),
            TypeTag::Long | TypeTag::Timestamp | TypeTag::Timespan => Some(&NULL_LONG),
            TypeTag::Real => Some(&NULL_REAL),
            TypeTag::Float | TypeTag::Datetime => Some(&NULL_FLOAT),
            TypeTag::Char => Some(&NULL_CHAR),
            TypeTag::Symbol => Some(&NULL_SYMBOL),
            _ => None,
        }
    }

    /// The null atom for this tag.
    pub fn null(self) -> Option<Atom> {
        let atom = match self {
            TypeTag::Boolean => Atom::Boolean(false),
            TypeTag::Guid => Atom::Guid(uuid::Uuid::nil()),
            TypeTag::Byte => Atom::Byte(0),
            TypeTag::Short => Atom::Short(i16::MIN),
            TypeTag::Int => Atom::Int(i32::MIN),
            TypeTag::Long => Atom::Long(i64::MIN),
            TypeTag::Real => Atom::Real(f32::from_bits(NULL_REAL_BITS)),
            TypeTag::Float => Atom::Float(f64::from_bits(NULL_FLOAT_BITS)),
            TypeTag::Char => Atom::Char(b' '),
            TypeTag::Symbol => Atom::Symbol(Text::default()),
            TypeTag::Timestamp => Atom::Timestamp(i64::MIN),
            TypeTag::Month => Atom::Month(i32::MIN),
            TypeTag::Date => Atom::Date(i32::MIN),
            TypeTag::Datetime => Atom::Datetime(i64::MIN),
            TypeTag::Timespan => Atom::Timespan(i64::MIN),
            TypeTag::Minute => Atom::Minute(i32::MIN),
            TypeTag::Second => Atom::Second(i32::MIN),
            TypeTag::Time => Atom::Time(i32::MIN),
            _ => return None,
        };
        Some(atom)
    }

    pub fn category(self) -> Category {
        match self {
            TypeTag::Boolean => Category::Boolean,
            TypeTag::Byte | TypeTag::Short | TypeTag::Int | TypeTag::Long => Category::Integer,
            TypeTag::Real | TypeTag::Float => Category::Floating,
            TypeTag::Timestamp | TypeTag::Month | TypeTag::Date | TypeTag::Datetime => {
                Category::TemporalDate
            }
            TypeTag::Timespan | TypeTag::Minute | TypeTag::Second | TypeTag::Time => {
                Category::TemporalTime
            }
            TypeTag::Char => Category::Textual,
            TypeTag::Symbol => Category::Symbolic,
            TypeTag::Guid => Category::Guid,
            TypeTag::List
            | TypeTag::Table
            | TypeTag::Dictionary
            | TypeTag::SortedDictionary => Category::Container,
            TypeTag::Lambda
            | TypeTag::UnaryPrimitive
            | TypeTag::BinaryPrimitive
            | TypeTag::TernaryPrimitive
            | TypeTag::Projection
            | TypeTag::Composition
            | TypeTag::Each
            | TypeTag::Over
            | TypeTag::Scan
            | TypeTag::EachPrior
            | TypeTag::EachRight
            | TypeTag::EachLeft => Category::Function,
            TypeTag::Error => Category::Error,
        }
    }

    /// Lowest protocol (capability) version that may carry this tag.
    pub fn min_protocol_version(self) -> u8 {
        match self {
            // kdb+ 2.6
            TypeTag::Timestamp | TypeTag::Timespan => 1,
            // kdb+ 3.0
            TypeTag::Guid => 3,
            _ => 0,
        }
    }

    /// q type character, e.g. `j` for long.
    pub fn type_char(self) -> Option<char> {
        let c = match self {
            TypeTag::Boolean => 'b',
            TypeTag::Guid => 'g',
            TypeTag::Byte => 'x',
            TypeTag::Short => 'h',
            TypeTag::Int => 'i',
            TypeTag::Long => 'j',
            TypeTag::Real => 'e',
            TypeTag::Float => 'f',
            TypeTag::Char => 'c',
            TypeTag::Symbol => 's',
            TypeTag::Timestamp => 'p',
            TypeTag::Month => 'm',
            TypeTag::Date => 'd',
            TypeTag::Datetime => 'z',
            TypeTag::Timespan => 'n',
            TypeTag::Minute => 'u',
            TypeTag::Second => 'v',
            TypeTag::Time => 't',
            _ => return None,
        };
        Some(c)
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::List => "list",
            TypeTag::Boolean => "boolean",
            TypeTag::Guid => "guid",
            TypeTag::Byte => "byte",
            TypeTag::Short => "short",
            TypeTag::Int => "int",
            TypeTag::Long => "long",
            TypeTag::Real => "real",
            TypeTag::Float => "float",
            TypeTag::Char => "char",
            TypeTag::Symbol => "symbol",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Month => "month",
            TypeTag::Date => "date",
            TypeTag::Datetime => "datetime",
            TypeTag::Timespan => "timespan",
            TypeTag::Minute => "minute",
            TypeTag::Second => "second",
            TypeTag::Time => "time",
            TypeTag::Table => "table",
            TypeTag::Dictionary => "dictionary",
            TypeTag::Lambda => "lambda",
            TypeTag::UnaryPrimitive => "unary primitive",
            TypeTag::BinaryPrimitive => "binary primitive",
            TypeTag::TernaryPrimitive => "ternary primitive",
            TypeTag::Projection => "projection",
            TypeTag::Composition => "composition",
            TypeTag::Each => "each",
            TypeTag::Over => "over",
            TypeTag::Scan => "scan",
            TypeTag::EachPrior => "each-prior",
            TypeTag::EachRight => "each-right",
            TypeTag::EachLeft => "each-left",
            TypeTag::SortedDictionary => "sorted dictionary",
            TypeTag::Error => "error",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==================== Legacy datetime ====================

/// Raw datetime milliseconds to the wire's float day count.
pub fn datetime_to_days(raw: i64) -> f64 {
    match raw {
        i64::MIN => f64::from_bits(NULL_FLOAT_BITS),
        i64::MAX => f64::INFINITY,
        r if r == -i64::MAX => f64::NEG_INFINITY,
        r => r as f64 / MILLIS_PER_DAY,
    }
}

/// Float day count from the wire to raw datetime milliseconds.
///
/// Every NaN collapses to the null; the fraction is rounded to the nearest
/// millisecond. A finite count whose milliseconds do not fit in an i64 is
/// rejected rather than saturated into an infinity.
pub fn days_to_datetime(days: f64) -> CodecResult<i64> {
    // 2^63, exactly representable
    const LIMIT: f64 = i64::MAX as f64;

    if days.is_nan() {
        return Ok(i64::MIN);
    }
    if days == f64::INFINITY {
        return Ok(i64::MAX);
    }
    if days == f64::NEG_INFINITY {
        return Ok(-i64::MAX);
    }
    let millis = (days * MILLIS_PER_DAY).round();
    if millis >= LIMIT || millis <= -LIMIT {
        return Err(CodecError::structure(format!(
            "datetime day count {days} is out of range"
        )));
    }
    Ok(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_round_trip() {
        for tag in TypeTag::ALL_SCALARS {
            assert_eq!(TypeTag::from_code(tag.code()), Some(tag));
        }
        assert_eq!(TypeTag::from_code(98), Some(TypeTag::Table));
        assert_eq!(TypeTag::from_code(-128), Some(TypeTag::Error));
        assert_eq!(TypeTag::from_code(3), None);
        assert_eq!(TypeTag::from_code(20), None);
        assert_eq!(TypeTag::from_code(-7), None);
    }

    #[test]
    fn test_widths() {
        assert_eq!(TypeTag::Boolean.width(), Some(1));
        assert_eq!(TypeTag::Short.width(), Some(2));
        assert_eq!(TypeTag::Real.width(), Some(4));
        assert_eq!(TypeTag::Date.width(), Some(4));
        assert_eq!(TypeTag::Datetime.width(), Some(8));
        assert_eq!(TypeTag::Timespan.width(), Some(8));
        assert_eq!(TypeTag::Guid.width(), Some(16));
        assert_eq!(TypeTag::Symbol.width(), None);
        assert_eq!(TypeTag::Table.width(), None);
    }

    #[test]
    fn test_null_bits_match_width() {
        for tag in TypeTag::ALL_SCALARS {
            let bits = tag.null_bits().unwrap();
            match tag.width() {
                Some(width) => assert_eq!(bits.len(), width, "{tag}"),
                None => assert!(bits.is_empty()),
            }
        }
        assert_eq!(TypeTag::Float.null_bits().unwrap(), &[0, 0, 0, 0, 0, 0, 0xf8, 0xff]);
        assert_eq!(TypeTag::Real.null_bits().unwrap(), &[0, 0, 0xc0, 0xff]);
        assert!(TypeTag::List.null_bits().is_none());
    }

    #[test]
    fn test_null_atoms_are_null() {
        for tag in TypeTag::ALL_SCALARS {
            let atom = tag.null().unwrap();
            assert_eq!(atom.tag(), tag);
            assert!(atom.is_null(), "{tag}");
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(TypeTag::Byte.category(), Category::Integer);
        assert_eq!(TypeTag::Month.category(), Category::TemporalDate);
        assert_eq!(TypeTag::Minute.category(), Category::TemporalTime);
        assert_eq!(TypeTag::Char.category(), Category::Textual);
        assert_eq!(TypeTag::SortedDictionary.category(), Category::Container);
        assert_eq!(TypeTag::EachLeft.category(), Category::Function);
    }

    #[test]
    fn test_protocol_versions() {
        assert_eq!(TypeTag::Guid.min_protocol_version(), 3);
        assert_eq!(TypeTag::Timestamp.min_protocol_version(), 1);
        assert_eq!(TypeTag::Datetime.min_protocol_version(), 0);
    }

    #[test]
    fn test_datetime_days() {
        assert_eq!(datetime_to_days(279_417_600), 3.234);
        assert_eq!(days_to_datetime(3.234).unwrap(), 279_417_600);
        assert!(datetime_to_days(i64::MIN).is_nan());
        assert_eq!(datetime_to_days(i64::MIN).to_bits(), NULL_FLOAT_BITS);
        assert_eq!(days_to_datetime(f64::NAN).unwrap(), i64::MIN);
        assert_eq!(days_to_datetime(f64::INFINITY).unwrap(), i64::MAX);
        assert_eq!(days_to_datetime(f64::NEG_INFINITY).unwrap(), -i64::MAX);
    }

    #[test]
    fn test_datetime_out_of_range() {
        for days in [1e300, -1e300, 1.1e11, f64::MAX] {
            assert!(matches!(
                days_to_datetime(days),
                Err(CodecError::InvalidStructure(_))
            ));
        }
        // just inside the i64 millisecond range
        assert!(days_to_datetime(1e11).is_ok());
    }
}
