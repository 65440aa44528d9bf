//! q-literal rendering.
//!
//! Output follows the q console closely enough to read decoded messages:
//! `1 0N 3`, `` `abc`cdefgh ``, `flip `a`b!(1 2;3 4)`, `{x+y}[3;]`.
//! It is for people, not for round-tripping.

use std::fmt::{self, Write};

use crate::temporal::{
    raw_to_date, raw_to_datetime, raw_to_minute, raw_to_month, raw_to_second, raw_to_time,
    raw_to_timestamp,
};
use crate::types::TypeTag;
use crate::value::{Atom, PrimitiveArity, Table, Value, Vector, VectorData};

/// Operator glyphs by primitive code.
const GLYPHS: [&str; 20] = [
    ":", "+", "-", "*", "%", "&", "|", "^", "=", "<", ">", "$", ",", "#", "_", "~", "!", "?", "@",
    ".",
];

const NANOS_PER_DAY: i64 = 86_400_000_000_000;

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Char(c) => write!(f, "\"{}\"", escape(&[*c])),
            Atom::Symbol(s) => write!(f, "`{s}"),
            Atom::Boolean(b) => write!(f, "{}b", u8::from(*b)),
            Atom::Byte(b) => write!(f, "0x{b:02x}"),
            Atom::Guid(g) if g.is_nil() => f.write_str("0Ng"),
            atom if atom.is_null() => match atom.tag() {
                TypeTag::Long => f.write_str("0N"),
                TypeTag::Float => f.write_str("0n"),
                tag => write!(f, "0N{}", tag.type_char().unwrap_or(' ')),
            },
            atom => {
                f.write_str(&element(atom))?;
                f.write_str(atom_suffix(atom))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(atom) => fmt::Display::fmt(atom, f),
            Value::Vector(vector) => fmt_vector(f, vector),
            Value::List(items) => match items.as_slice() {
                [] => f.write_str("()"),
                [item] => write!(f, "enlist {item}"),
                items => {
                    f.write_char('(')?;
                    join(f, items, ";")?;
                    f.write_char(')')
                }
            },
            Value::Dictionary(dict) => write!(f, "{}!{}", dict.keys, dict.values),
            Value::Table(table) => fmt_table(f, table),
            Value::KeyedTable(keyed) => {
                f.write_char('(')?;
                fmt_table(f, &keyed.keys)?;
                f.write_str(")!")?;
                fmt_table(f, &keyed.values)
            }
            Value::Lambda(lambda) => write!(f, "{}", lambda.expression),
            Value::Projection(projection) => {
                write!(f, "{}[", projection.function)?;
                for (i, arg) in projection.args.iter().enumerate() {
                    if i > 0 {
                        f.write_char(';')?;
                    }
                    if !matches!(arg, Value::Null) {
                        write!(f, "{arg}")?;
                    }
                }
                f.write_char(']')
            }
            Value::Primitive(primitive) => {
                let glyph = GLYPHS.get(usize::from(primitive.code));
                match (primitive.arity, glyph) {
                    (PrimitiveArity::Ternary, _) | (_, None) => {
                        write!(f, "{}[{}]", primitive.arity.tag(), primitive.code)
                    }
                    (_, Some(glyph)) => f.write_str(glyph),
                }
            }
            Value::Composition(functions) => {
                f.write_str("'[")?;
                join(f, functions, ";")?;
                f.write_char(']')
            }
            Value::Adverb(adverb) => write!(f, "{}{}", adverb.function, adverb.kind.glyph()),
            Value::Error(message) => write!(f, "'{message}"),
            Value::Null => f.write_str("::"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[Value], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn fmt_table(f: &mut fmt::Formatter<'_>, table: &Table) -> fmt::Result {
    f.write_str("flip ")?;
    for name in &table.columns {
        write!(f, "`{name}")?;
    }
    f.write_str("!(")?;
    join(f, &table.data, ";")?;
    f.write_char(')')
}

fn fmt_vector(f: &mut fmt::Formatter<'_>, vector: &Vector) -> fmt::Result {
    let data = &vector.data;
    if !vector.attribute.is_none() {
        let prefix = match vector.attribute.0 {
            1 => "s",
            2 => "u",
            3 => "p",
            5 => "g",
            _ => "?",
        };
        write!(f, "`{prefix}#")?;
    }
    match data {
        VectorData::Char(chars) => return write!(f, "\"{}\"", escape(chars)),
        _ if data.is_empty() => return write!(f, "`{}$()", data.tag()),
        _ if data.len() == 1 => {
            f.write_char(',')?;
            if let Some(atom) = data.get(0) {
                write!(f, "{atom}")?;
            }
            return Ok(());
        }
        _ => {}
    }
    match data {
        VectorData::Boolean(items) => {
            items.iter().try_for_each(|b| write!(f, "{}", u8::from(*b)))?;
            f.write_char('b')
        }
        VectorData::Byte(items) => {
            f.write_str("0x")?;
            items.iter().try_for_each(|b| write!(f, "{b:02x}"))
        }
        VectorData::Symbol(items) => items.iter().try_for_each(|s| write!(f, "`{s}")),
        _ => {
            let mut parts = data.atoms().map(|atom| {
                if atom.is_null() {
                    match atom.tag() {
                        TypeTag::Float => "0n".to_string(),
                        TypeTag::Guid => "0Ng".to_string(),
                        _ => "0N".to_string(),
                    }
                } else {
                    element(&atom)
                }
            });
            if let Some(first) = parts.next() {
                f.write_str(&first)?;
            }
            for part in parts {
                write!(f, " {part}")?;
            }
            f.write_str(vector_suffix(data))
        }
    }
}

/// Type suffix written once after a vector.
fn vector_suffix(data: &VectorData) -> &'static str {
    match data {
        VectorData::Short(_) => "h",
        VectorData::Int(_) => "i",
        VectorData::Real(_) => "e",
        VectorData::Month(_) => "m",
        VectorData::Float(items) if items.iter().all(|v| v.fract() == 0.0) => "f",
        _ => "",
    }
}

fn atom_suffix(atom: &Atom) -> &'static str {
    match atom {
        Atom::Short(_) => "h",
        Atom::Int(_) => "i",
        Atom::Real(_) => "e",
        Atom::Month(_) => "m",
        Atom::Float(v) if v.fract() == 0.0 => "f",
        _ => "",
    }
}

/// A non-null element without its type suffix.
fn element(atom: &Atom) -> String {
    match atom {
        Atom::Boolean(b) => u8::from(*b).to_string(),
        Atom::Guid(g) => g.hyphenated().to_string(),
        Atom::Byte(b) => format!("{b:02x}"),
        Atom::Short(v) => v.to_string(),
        Atom::Int(v) => v.to_string(),
        Atom::Long(v) => v.to_string(),
        Atom::Real(v) if v.is_finite() => v.to_string(),
        Atom::Real(v) => float(f64::from(*v)),
        Atom::Float(v) => float(*v),
        Atom::Char(c) => escape(&[*c]),
        Atom::Symbol(s) => format!("`{s}"),
        Atom::Timestamp(raw) => raw_to_timestamp(*raw)
            .map(|t| t.format("%Y.%m.%dD%H:%M:%S%.9f").to_string())
            .unwrap_or_else(|| raw.to_string()),
        Atom::Month(raw) => raw_to_month(*raw)
            .map(|d| d.format("%Y.%m").to_string())
            .unwrap_or_else(|| raw.to_string()),
        Atom::Date(raw) => raw_to_date(*raw)
            .map(|d| d.format("%Y.%m.%d").to_string())
            .unwrap_or_else(|| raw.to_string()),
        Atom::Datetime(raw) => match *raw {
            i64::MAX => "0wz".to_string(),
            r if r == -i64::MAX => "-0wz".to_string(),
            r => raw_to_datetime(r)
                .map(|t| t.format("%Y.%m.%dT%H:%M:%S%.3f").to_string())
                .unwrap_or_else(|| r.to_string()),
        },
        Atom::Timespan(raw) => timespan(*raw),
        Atom::Minute(raw) => raw_to_minute(*raw)
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| raw.to_string()),
        Atom::Second(raw) => raw_to_second(*raw)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| raw.to_string()),
        Atom::Time(raw) => raw_to_time(*raw)
            .map(|t| t.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

fn float(v: f64) -> String {
    if v == f64::INFINITY {
        "0w".to_string()
    } else if v == f64::NEG_INFINITY {
        "-0w".to_string()
    } else {
        v.to_string()
    }
}

/// `0D05:36:57.600000000`
fn timespan(raw: i64) -> String {
    let sign = if raw < 0 { "-" } else { "" };
    let abs = raw.unsigned_abs();
    let day = NANOS_PER_DAY as u64;
    let (days, rest) = (abs / day, abs % day);
    let nanos = rest % 1_000_000_000;
    let secs = rest / 1_000_000_000;
    format!(
        "{sign}{days}D{:02}:{:02}:{:02}.{nanos:09}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60
    )
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\{b:03o}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Dictionary, Lambda, Projection};

    #[test]
    fn test_atoms() {
        assert_eq!(Value::long(1).to_string(), "1");
        assert_eq!(Value::Atom(Atom::Short(-234)).to_string(), "-234h");
        assert_eq!(Value::Atom(Atom::Real(5.5)).to_string(), "5.5e");
        assert_eq!(TypeTag::Real.null().unwrap().to_string(), "0Ne");
        assert_eq!(TypeTag::Float.null().unwrap().to_string(), "0n");
        assert_eq!(TypeTag::Long.null().unwrap().to_string(), "0N");
        assert_eq!(Value::boolean(true).to_string(), "1b");
        assert_eq!(Value::symbol("abc").to_string(), "`abc");
        assert_eq!(Value::char(b'a').to_string(), "\"a\"");
        assert_eq!(Value::float(2.0).to_string(), "2f");
    }

    #[test]
    fn test_temporal_atoms() {
        assert_eq!(Atom::Date(366).to_string(), "2001.01.01");
        assert_eq!(Atom::Date(-14).to_string(), "1999.12.18");
        assert_eq!(Atom::Month(12).to_string(), "2001.01m");
        assert_eq!(Atom::Date(i32::MIN).to_string(), "0Nd");
        assert_eq!(Atom::Minute(721).to_string(), "12:01");
        assert_eq!(Atom::Second(43_500).to_string(), "12:05:00");
        assert_eq!(Atom::Datetime(279_417_600).to_string(), "2000.01.04T05:36:57.600");
        assert_eq!(
            Atom::Timestamp(279_417_600_000_000).to_string(),
            "2000.01.04D05:36:57.600000000"
        );
        assert_eq!(
            Atom::Timespan(20_217_600_000_000).to_string(),
            "0D05:36:57.600000000"
        );
    }

    #[test]
    fn test_vectors() {
        assert_eq!(Value::longs([1, i64::MIN, 3]).to_string(), "1 0N 3");
        assert_eq!(Value::symbols(["abc", "cdefgh"]).to_string(), "`abc`cdefgh");
        assert_eq!(Value::longs([7]).to_string(), ",7");
        assert_eq!(Value::longs(Vec::new()).to_string(), "`long$()");
        assert_eq!(Value::string("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(
            Value::from(VectorData::Boolean(vec![true, false, true])).to_string(),
            "101b"
        );
        assert_eq!(
            Value::from(VectorData::Short(vec![1, 2])).to_string(),
            "1 2h"
        );
    }

    #[test]
    fn test_containers() {
        let table = Table::new(
            vec!["abc".into(), "def".into()],
            vec![Value::longs([1, 2, 3]), Value::longs([4, 5, 6])],
        );
        assert_eq!(
            Value::Table(table).to_string(),
            "flip `abc`def!(1 2 3;4 5 6)"
        );
        let dict = Dictionary::new(Value::symbols(["a", "b"]), Value::longs([1, 2]));
        assert_eq!(Value::Dictionary(dict).to_string(), "`a`b!1 2");
        assert_eq!(Value::List(Vec::new()).to_string(), "()");
        assert_eq!(
            Value::List(vec![Value::long(1), Value::symbol("a")]).to_string(),
            "(1;`a)"
        );
    }

    #[test]
    fn test_functions() {
        let projection = Projection::new(Lambda::new("{x+y}"), vec![Value::long(3), Value::Null]);
        assert_eq!(Value::Projection(projection).to_string(), "{x+y}[3;]");
        assert_eq!(Value::Null.to_string(), "::");
        assert_eq!(Value::error("type").to_string(), "'type");
    }
}
