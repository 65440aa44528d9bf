//! Encode → decode properties across the whole type registry.

use pretty_assertions::assert_eq;
use qwire::prelude::*;
use uuid::Uuid;

fn sample(tag: TypeTag) -> Atom {
    match tag {
        TypeTag::Boolean => Atom::Boolean(true),
        TypeTag::Guid => Atom::Guid(Uuid::from_u128(0x8c680a01_5a49_5aab_5a65_d4bfddb6a661)),
        TypeTag::Byte => Atom::Byte(7),
        TypeTag::Short => Atom::Short(12),
        TypeTag::Int => Atom::Int(-5),
        TypeTag::Long => Atom::Long(42),
        TypeTag::Real => Atom::Real(1.5),
        TypeTag::Float => Atom::Float(-2.25),
        TypeTag::Char => Atom::Char(b'z'),
        TypeTag::Symbol => Atom::Symbol("sym".into()),
        TypeTag::Timestamp => Atom::Timestamp(1),
        TypeTag::Month => Atom::Month(3),
        TypeTag::Date => Atom::Date(5),
        TypeTag::Datetime => Atom::Datetime(86_400_000),
        TypeTag::Timespan => Atom::Timespan(9),
        TypeTag::Minute => Atom::Minute(10),
        TypeTag::Second => Atom::Second(11),
        TypeTag::Time => Atom::Time(12),
        other => panic!("{other} is not a scalar"),
    }
}

/// Two-element vector of `tag`: a sample then the null.
fn sample_vector(tag: TypeTag) -> VectorData {
    let (a, n) = (sample(tag), tag.null().unwrap());
    match (a, n) {
        (Atom::Boolean(a), Atom::Boolean(n)) => VectorData::Boolean(vec![a, n]),
        (Atom::Guid(a), Atom::Guid(n)) => VectorData::Guid(vec![a, n]),
        (Atom::Byte(a), Atom::Byte(n)) => VectorData::Byte(vec![a, n]),
        (Atom::Short(a), Atom::Short(n)) => VectorData::Short(vec![a, n]),
        (Atom::Int(a), Atom::Int(n)) => VectorData::Int(vec![a, n]),
        (Atom::Long(a), Atom::Long(n)) => VectorData::Long(vec![a, n]),
        (Atom::Real(a), Atom::Real(n)) => VectorData::Real(vec![a, n]),
        (Atom::Float(a), Atom::Float(n)) => VectorData::Float(vec![a, n]),
        (Atom::Char(a), Atom::Char(n)) => VectorData::Char(vec![a, n]),
        (Atom::Symbol(a), Atom::Symbol(n)) => VectorData::Symbol(vec![a, n]),
        (Atom::Timestamp(a), Atom::Timestamp(n)) => VectorData::Timestamp(vec![a, n]),
        (Atom::Month(a), Atom::Month(n)) => VectorData::Month(vec![a, n]),
        (Atom::Date(a), Atom::Date(n)) => VectorData::Date(vec![a, n]),
        (Atom::Datetime(a), Atom::Datetime(n)) => VectorData::Datetime(vec![a, n]),
        (Atom::Timespan(a), Atom::Timespan(n)) => VectorData::Timespan(vec![a, n]),
        (Atom::Minute(a), Atom::Minute(n)) => VectorData::Minute(vec![a, n]),
        (Atom::Second(a), Atom::Second(n)) => VectorData::Second(vec![a, n]),
        (Atom::Time(a), Atom::Time(n)) => VectorData::Time(vec![a, n]),
        _ => unreachable!(),
    }
}

fn cleared(mut data: VectorData) -> VectorData {
    match &mut data {
        VectorData::Boolean(v) => v.clear(),
        VectorData::Guid(v) => v.clear(),
        VectorData::Byte(v) | VectorData::Char(v) => v.clear(),
        VectorData::Short(v) => v.clear(),
        VectorData::Int(v)
        | VectorData::Month(v)
        | VectorData::Date(v)
        | VectorData::Minute(v)
        | VectorData::Second(v)
        | VectorData::Time(v) => v.clear(),
        VectorData::Long(v)
        | VectorData::Timestamp(v)
        | VectorData::Datetime(v)
        | VectorData::Timespan(v) => v.clear(),
        VectorData::Real(v) => v.clear(),
        VectorData::Float(v) => v.clear(),
        VectorData::Symbol(v) => v.clear(),
    }
    data
}

fn round_trip(value: &Value) -> Value {
    let bytes = qwire::encode(value, &EncodeOptions::default()).unwrap();
    QDecoder::new().decode_message(&bytes).unwrap().value
}

fn nested() -> Value {
    let table = Table::new(
        vec!["sym".into(), "px".into(), "note".into()],
        vec![
            Value::symbols(["a", "b"]),
            Value::from(VectorData::Float(vec![1.5, f64::from_bits(0xfff8_0000_0000_0000)])),
            Value::List(vec![Value::string("hi"), Value::string("")]),
        ],
    );
    Value::List(vec![
        Value::Table(table),
        Value::Dictionary(Dictionary::new(
            Value::symbols(["k"]),
            Value::List(vec![Value::Null]),
        )),
        Value::Projection(Projection::new(
            Lambda::new("{x+y+z}"),
            vec![Value::Null, Value::long(2), Value::Null],
        )),
        Value::Adverb(Adverb::new(
            AdverbKind::EachRight,
            Value::Primitive(Primitive {
                arity: PrimitiveArity::Binary,
                code: 1,
            }),
        )),
        Value::Composition(vec![
            Value::Primitive(Primitive {
                arity: PrimitiveArity::Unary,
                code: 3,
            }),
            Value::Lambda(Lambda::new("{x*2}")),
        ]),
        Value::from(Vector::new(VectorData::Int(vec![1, 2, 3])).with_attribute(Attribute::SORTED)),
    ])
}

#[test]
fn test_every_scalar_atom_round_trips() {
    for tag in TypeTag::ALL_SCALARS {
        let value = Value::Atom(sample(tag));
        assert_eq!(round_trip(&value), value, "{tag}");
    }
}

#[test]
fn test_every_null_atom_round_trips() {
    for tag in TypeTag::ALL_SCALARS {
        let value = Value::Atom(tag.null().unwrap());
        let back = round_trip(&value);
        assert_eq!(back, value, "{tag}");
        assert!(back.is_null(), "{tag}");
    }
}

#[test]
fn test_every_vector_round_trips() {
    for tag in TypeTag::ALL_SCALARS {
        let value = Value::from(sample_vector(tag));
        assert_eq!(round_trip(&value), value, "{tag}");

        let empty = Value::from(cleared(sample_vector(tag)));
        assert_eq!(empty.len(), Some(0));
        assert_eq!(round_trip(&empty), empty, "empty {tag}");
    }
}

#[test]
fn test_nested_round_trip() {
    let value = nested();
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_every_prefix_is_truncated() {
    let bytes = qwire::encode(&nested(), &EncodeOptions::default()).unwrap();
    for cut in 0..bytes.len() {
        let err = QDecoder::new().decode(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, CodecError::TruncatedMessage { .. }),
            "cut at {cut}: {err}"
        );
    }
}

#[test]
fn test_body_truncation_with_patched_length() {
    // header agrees with the short buffer, so the body itself runs out
    let bytes = qwire::encode(&Value::longs([1, 2, 3]), &EncodeOptions::default()).unwrap();
    for cut in 9..bytes.len() {
        let mut short = bytes[..cut].to_vec();
        short[4..8].copy_from_slice(&(cut as i32).to_le_bytes());
        assert!(matches!(
            qwire::decode(&short),
            Err(CodecError::TruncatedMessage { .. })
        ));
    }
}

#[test]
fn test_oversized_buffer_is_framing_mismatch() {
    let mut bytes = qwire::encode(&Value::long(1), &EncodeOptions::default())
        .unwrap()
        .to_vec();
    bytes.extend_from_slice(&[0, 0]);
    assert!(matches!(
        qwire::decode(&bytes),
        Err(CodecError::FramingMismatch(_))
    ));
}

#[test]
fn test_char_policy_lengths_differ() {
    let value = Value::string("a");
    let vector = qwire::encode(&value, &EncodeOptions::default()).unwrap();
    let atom = qwire::encode(
        &value,
        &EncodeOptions::new().single_char_strings(CharStringPolicy::AsCharAtom),
    )
    .unwrap();
    assert_ne!(vector, atom);
    assert_eq!(vector.len() - atom.len(), 5);
    assert_eq!(qwire::decode(&atom).unwrap(), Value::char(b'a'));
    assert_eq!(qwire::decode(&vector).unwrap(), value);
}

#[test]
fn test_char_policy_keeps_table_columns() {
    let table = Value::Table(Table::new(
        vec!["sym".into(), "str".into()],
        vec![Value::symbols(["x"]), Value::string("a")],
    ));
    let options = EncodeOptions::new().single_char_strings(CharStringPolicy::AsCharAtom);
    let bytes = qwire::encode(&table, &options).unwrap();
    assert_eq!(qwire::decode(&bytes).unwrap(), table);
}

#[test]
fn test_invalid_values_rejected() {
    let ragged = Value::Table(Table::new(
        vec!["a".into(), "b".into()],
        vec![Value::longs([1, 2]), Value::longs([1])],
    ));
    let names = Value::Table(Table::new(vec!["a".into()], Vec::new()));
    let dict = Value::Dictionary(Dictionary::new(Value::symbols(["a"]), Value::longs([1, 2])));
    let keyed = Value::KeyedTable(KeyedTable::new(
        Table::new(vec!["k".into()], vec![Value::longs([1])]),
        Table::new(vec!["v".into()], vec![Value::longs([1, 2])]),
    ));
    for value in [ragged, names, dict, keyed] {
        let err = qwire::encode(&value, &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure(_)), "{err}");
    }
}

#[test]
fn test_protocol_gating_nested() {
    let value = Value::Dictionary(Dictionary::new(
        Value::symbols(["id"]),
        Value::List(vec![Value::from(VectorData::Guid(vec![Uuid::nil()]))]),
    ));
    for version in 0..3 {
        let options = EncodeOptions::new().protocol_version(version);
        assert!(matches!(
            qwire::encode(&value, &options),
            Err(CodecError::UnsupportedType(_))
        ));
    }
    assert!(qwire::encode(&value, &EncodeOptions::default()).is_ok());

    let span = Value::Atom(Atom::Timespan(1));
    assert!(qwire::encode(&span, &EncodeOptions::new().protocol_version(0)).is_err());
    assert!(qwire::encode(&span, &EncodeOptions::new().protocol_version(1)).is_ok());
}

#[test]
fn test_big_endian_message() {
    // `a`bc!(1i;"x") from a big-endian peer
    let body = [
        0x63, 0x0b, 0x00, 0x00, 0x00, 0x00, 0x02, b'a', 0, b'b', b'c', 0, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x02, 0xfa, 0x00, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x01, b'x',
    ];
    let mut msg = vec![0, 2, 0, 0];
    msg.extend_from_slice(&((8 + body.len()) as i32).to_be_bytes());
    msg.extend_from_slice(&body);

    let decoded = QDecoder::new().decode_message(&msg).unwrap();
    assert_eq!(decoded.header.endianness, Endianness::Big);
    let expected = Value::Dictionary(Dictionary::new(
        Value::symbols(["a", "bc"]),
        Value::List(vec![Value::int(1), Value::string("x")]),
    ));
    assert_eq!(decoded.value, expected);
}

#[test]
fn test_datetime_infinities() {
    for raw in [i64::MAX, -i64::MAX, i64::MIN] {
        let value = Value::Atom(Atom::Datetime(raw));
        assert_eq!(round_trip(&value), value);
    }
}

#[test]
fn test_json_round_trip() {
    let value = Value::List(vec![
        Value::long(1),
        Value::symbols(["a", "b"]),
        Value::Lambda(Lambda::new("{x}")),
        Value::Null,
    ]);
    let json = serde_json::to_string(&value).unwrap();
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}

#[test]
fn test_config_drives_encoder() {
    let config = Config::from_toml("[codec]\nsingle_char_strings = \"as_char_atom\"\n").unwrap();
    let bytes = qwire::encode(&Value::string("q"), &config.codec).unwrap();
    assert_eq!(&bytes[8..], &[0xf6, b'q']);
}

fn latin1(bytes: &[u8]) -> Text {
    Text::new(bytes.to_vec())
}

#[test]
fn test_non_utf8_text_round_trips() {
    let table = Table::new(
        vec![latin1(b"caf\xe9")],
        vec![Value::from(VectorData::Symbol(vec![latin1(b"\xe9t\xe9"), "ok".into()]))],
    );
    let value = Value::List(vec![
        Value::symbol(latin1(b"caf\xe9")),
        Value::from(VectorData::Symbol(vec!["a".into(), latin1(b"\xe9")])),
        Value::Lambda(Lambda::new(latin1(b"{x,\"\xe9\"}")).with_context(latin1(b"\xe9"))),
        Value::Table(table),
    ]);
    let back = round_trip(&value);
    assert_eq!(back, value);
    assert_eq!(
        back.item(0).and_then(|v| v.as_bytes().map(<[u8]>::to_vec)),
        Some(b"caf\xe9".to_vec())
    );

    let error = qwire::encode(&Value::error(latin1(b"t\xe9pe")), &EncodeOptions::default()).unwrap();
    assert_eq!(
        QDecoder::new().decode_message(&error).unwrap().value,
        Value::error(latin1(b"t\xe9pe"))
    );
}
