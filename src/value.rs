//! q value model.
//!
//! A closed tagged union over everything the wire format can carry. Nulls
//! are ordinary payloads: a null long is `Atom::Long(i64::MIN)`, not a
//! wrapper. Ask the value (or [`TypeTag::null`]) whether it is null.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CodecError, CodecResult};
use crate::text::Text;
use crate::types::TypeTag;

/// Largest element count the 4-byte count field can carry.
pub const MAX_COUNT: usize = i32::MAX as usize;

/// Vector attribute byte. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute(pub u8);

impl Attribute {
    pub const NONE: Attribute = Attribute(0);
    pub const SORTED: Attribute = Attribute(1);
    pub const UNIQUE: Attribute = Attribute(2);
    pub const PARTED: Attribute = Attribute(3);
    pub const GROUPED: Attribute = Attribute(5);

    pub fn is_none(self) -> bool {
        self == Attribute::NONE
    }
}

// ==================== Atoms ====================

/// A single scalar. Temporal variants hold raw offsets from 2000.01.01.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atom {
    Boolean(bool),
    Guid(Uuid),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Real(f32),
    Float(f64),
    Char(u8),
    Symbol(Text),
    /// Nanoseconds since the epoch
    Timestamp(i64),
    /// Months since 2000.01
    Month(i32),
    /// Days since the epoch
    Date(i32),
    /// Milliseconds since the epoch; a float day count on the wire
    Datetime(i64),
    /// Nanoseconds
    Timespan(i64),
    Minute(i32),
    Second(i32),
    /// Milliseconds since midnight
    Time(i32),
}

impl Atom {
    pub fn tag(&self) -> TypeTag {
        match self {
            Atom::Boolean(_) => TypeTag::Boolean,
            Atom::Guid(_) => TypeTag::Guid,
            Atom::Byte(_) => TypeTag::Byte,
            Atom::Short(_) => TypeTag::Short,
            Atom::Int(_) => TypeTag::Int,
            Atom::Long(_) => TypeTag::Long,
            Atom::Real(_) => TypeTag::Real,
            Atom::Float(_) => TypeTag::Float,
            Atom::Char(_) => TypeTag::Char,
            Atom::Symbol(_) => TypeTag::Symbol,
            Atom::Timestamp(_) => TypeTag::Timestamp,
            Atom::Month(_) => TypeTag::Month,
            Atom::Date(_) => TypeTag::Date,
            Atom::Datetime(_) => TypeTag::Datetime,
            Atom::Timespan(_) => TypeTag::Timespan,
            Atom::Minute(_) => TypeTag::Minute,
            Atom::Second(_) => TypeTag::Second,
            Atom::Time(_) => TypeTag::Time,
        }
    }

    /// True when the atom holds its tag's null sentinel. Any NaN counts as
    /// null for real and float.
    pub fn is_null(&self) -> bool {
        match self {
            Atom::Boolean(b) => !*b,
            Atom::Guid(g) => g.is_nil(),
            Atom::Byte(b) => *b == 0,
            Atom::Short(v) => *v == i16::MIN,
            Atom::Int(v)
            | Atom::Month(v)
            | Atom::Date(v)
            | Atom::Minute(v)
            | Atom::Second(v)
            | Atom::Time(v) => *v == i32::MIN,
            Atom::Long(v) | Atom::Timestamp(v) | Atom::Datetime(v) | Atom::Timespan(v) => {
                *v == i64::MIN
            }
            Atom::Real(v) => v.is_nan(),
            Atom::Float(v) => v.is_nan(),
            Atom::Char(c) => *c == b' ',
            Atom::Symbol(s) => s.is_empty(),
        }
    }

    /// Widen integral payloads to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Atom::Byte(v) => Some(i64::from(*v)),
            Atom::Short(v) => Some(i64::from(*v)),
            Atom::Int(v)
            | Atom::Month(v)
            | Atom::Date(v)
            | Atom::Minute(v)
            | Atom::Second(v)
            | Atom::Time(v) => Some(i64::from(*v)),
            Atom::Long(v) | Atom::Timestamp(v) | Atom::Datetime(v) | Atom::Timespan(v) => {
                Some(*v)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atom::Real(v) => Some(f64::from(*v)),
            Atom::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Atom::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Floating payloads compare by bit pattern so a null equals only itself.
impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Atom::Boolean(a), Atom::Boolean(b)) => a == b,
            (Atom::Guid(a), Atom::Guid(b)) => a == b,
            (Atom::Byte(a), Atom::Byte(b)) => a == b,
            (Atom::Short(a), Atom::Short(b)) => a == b,
            (Atom::Int(a), Atom::Int(b)) => a == b,
            (Atom::Long(a), Atom::Long(b)) => a == b,
            (Atom::Real(a), Atom::Real(b)) => a.to_bits() == b.to_bits(),
            (Atom::Float(a), Atom::Float(b)) => a.to_bits() == b.to_bits(),
            (Atom::Char(a), Atom::Char(b)) => a == b,
            (Atom::Symbol(a), Atom::Symbol(b)) => a == b,
            (Atom::Timestamp(a), Atom::Timestamp(b)) => a == b,
            (Atom::Month(a), Atom::Month(b)) => a == b,
            (Atom::Date(a), Atom::Date(b)) => a == b,
            (Atom::Datetime(a), Atom::Datetime(b)) => a == b,
            (Atom::Timespan(a), Atom::Timespan(b)) => a == b,
            (Atom::Minute(a), Atom::Minute(b)) => a == b,
            (Atom::Second(a), Atom::Second(b)) => a == b,
            (Atom::Time(a), Atom::Time(b)) => a == b,
            _ => false,
        }
    }
}

// ==================== Vectors ====================

/// Homogeneous vector payloads, one variant per scalar tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorData {
    Boolean(Vec<bool>),
    Guid(Vec<Uuid>),
    Byte(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Real(Vec<f32>),
    Float(Vec<f64>),
    /// A q string
    Char(Vec<u8>),
    Symbol(Vec<Text>),
    Timestamp(Vec<i64>),
    Month(Vec<i32>),
    Date(Vec<i32>),
    Datetime(Vec<i64>),
    Timespan(Vec<i64>),
    Minute(Vec<i32>),
    Second(Vec<i32>),
    Time(Vec<i32>),
}

macro_rules! vector_dispatch {
    ($data:expr, $items:ident => $body:expr) => {
        match $data {
            VectorData::Boolean($items) => $body,
            VectorData::Guid($items) => $body,
            VectorData::Byte($items) => $body,
            VectorData::Short($items) => $body,
            VectorData::Int($items) => $body,
            VectorData::Long($items) => $body,
            VectorData::Real($items) => $body,
            VectorData::Float($items) => $body,
            VectorData::Char($items) => $body,
            VectorData::Symbol($items) => $body,
            VectorData::Timestamp($items) => $body,
            VectorData::Month($items) => $body,
            VectorData::Date($items) => $body,
            VectorData::Datetime($items) => $body,
            VectorData::Timespan($items) => $body,
            VectorData::Minute($items) => $body,
            VectorData::Second($items) => $body,
            VectorData::Time($items) => $body,
        }
    };
}

impl VectorData {
    pub fn tag(&self) -> TypeTag {
        match self {
            VectorData::Boolean(_) => TypeTag::Boolean,
            VectorData::Guid(_) => TypeTag::Guid,
            VectorData::Byte(_) => TypeTag::Byte,
            VectorData::Short(_) => TypeTag::Short,
            VectorData::Int(_) => TypeTag::Int,
            VectorData::Long(_) => TypeTag::Long,
            VectorData::Real(_) => TypeTag::Real,
            VectorData::Float(_) => TypeTag::Float,
            VectorData::Char(_) => TypeTag::Char,
            VectorData::Symbol(_) => TypeTag::Symbol,
            VectorData::Timestamp(_) => TypeTag::Timestamp,
            VectorData::Month(_) => TypeTag::Month,
            VectorData::Date(_) => TypeTag::Date,
            VectorData::Datetime(_) => TypeTag::Datetime,
            VectorData::Timespan(_) => TypeTag::Timespan,
            VectorData::Minute(_) => TypeTag::Minute,
            VectorData::Second(_) => TypeTag::Second,
            VectorData::Time(_) => TypeTag::Time,
        }
    }

    pub fn len(&self) -> usize {
        vector_dispatch!(self, items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as an atom.
    pub fn get(&self, index: usize) -> Option<Atom> {
        let atom = match self {
            VectorData::Boolean(v) => Atom::Boolean(*v.get(index)?),
            VectorData::Guid(v) => Atom::Guid(*v.get(index)?),
            VectorData::Byte(v) => Atom::Byte(*v.get(index)?),
            VectorData::Short(v) => Atom::Short(*v.get(index)?),
            VectorData::Int(v) => Atom::Int(*v.get(index)?),
            VectorData::Long(v) => Atom::Long(*v.get(index)?),
            VectorData::Real(v) => Atom::Real(*v.get(index)?),
            VectorData::Float(v) => Atom::Float(*v.get(index)?),
            VectorData::Char(v) => Atom::Char(*v.get(index)?),
            VectorData::Symbol(v) => Atom::Symbol(v.get(index)?.clone()),
            VectorData::Timestamp(v) => Atom::Timestamp(*v.get(index)?),
            VectorData::Month(v) => Atom::Month(*v.get(index)?),
            VectorData::Date(v) => Atom::Date(*v.get(index)?),
            VectorData::Datetime(v) => Atom::Datetime(*v.get(index)?),
            VectorData::Timespan(v) => Atom::Timespan(*v.get(index)?),
            VectorData::Minute(v) => Atom::Minute(*v.get(index)?),
            VectorData::Second(v) => Atom::Second(*v.get(index)?),
            VectorData::Time(v) => Atom::Time(*v.get(index)?),
        };
        Some(atom)
    }

    /// Iterate the elements as atoms.
    pub fn atoms(&self) -> impl Iterator<Item = Atom> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

fn same_bits<T: Copy, B: PartialEq>(a: &[T], b: &[T], bits: impl Fn(T) -> B) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| bits(*x) == bits(*y))
}

impl PartialEq for VectorData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VectorData::Boolean(a), VectorData::Boolean(b)) => a == b,
            (VectorData::Guid(a), VectorData::Guid(b)) => a == b,
            (VectorData::Byte(a), VectorData::Byte(b)) => a == b,
            (VectorData::Short(a), VectorData::Short(b)) => a == b,
            (VectorData::Int(a), VectorData::Int(b)) => a == b,
            (VectorData::Long(a), VectorData::Long(b)) => a == b,
            (VectorData::Real(a), VectorData::Real(b)) => same_bits(a, b, f32::to_bits),
            (VectorData::Float(a), VectorData::Float(b)) => same_bits(a, b, f64::to_bits),
            (VectorData::Char(a), VectorData::Char(b)) => a == b,
            (VectorData::Symbol(a), VectorData::Symbol(b)) => a == b,
            (VectorData::Timestamp(a), VectorData::Timestamp(b)) => a == b,
            (VectorData::Month(a), VectorData::Month(b)) => a == b,
            (VectorData::Date(a), VectorData::Date(b)) => a == b,
            (VectorData::Datetime(a), VectorData::Datetime(b)) => a == b,
            (VectorData::Timespan(a), VectorData::Timespan(b)) => a == b,
            (VectorData::Minute(a), VectorData::Minute(b)) => a == b,
            (VectorData::Second(a), VectorData::Second(b)) => a == b,
            (VectorData::Time(a), VectorData::Time(b)) => a == b,
            _ => false,
        }
    }
}

/// A typed vector with its attribute byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    #[serde(default)]
    pub attribute: Attribute,
    pub data: VectorData,
}

impl Vector {
    pub fn new(data: VectorData) -> Self {
        Self {
            attribute: Attribute::NONE,
            data,
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn tag(&self) -> TypeTag {
        self.data.tag()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<VectorData> for Vector {
    fn from(data: VectorData) -> Self {
        Vector::new(data)
    }
}

// ==================== Containers ====================

/// Ordered key/value pair of equal-length containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub keys: Box<Value>,
    pub values: Box<Value>,
}

impl Dictionary {
    pub fn new(keys: impl Into<Value>, values: impl Into<Value>) -> Self {
        Self {
            keys: Box::new(keys.into()),
            values: Box::new(values.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value stored under a symbol key.
    pub fn get(&self, key: &str) -> Option<Value> {
        let Value::Vector(Vector {
            data: VectorData::Symbol(keys),
            ..
        }) = self.keys.as_ref()
        else {
            return None;
        };
        let index = keys.iter().position(|k| k == key)?;
        self.values.item(index)
    }

    pub fn validate(&self) -> CodecResult<()> {
        self.check_shape()?;
        self.keys.validate()?;
        self.values.validate()
    }

    /// Length and kind checks on this level only.
    pub fn check_shape(&self) -> CodecResult<()> {
        if !matches!(self.keys.as_ref(), Value::Vector(_) | Value::List(_)) {
            return Err(CodecError::structure(format!(
                "dictionary keys must be a vector or list, got {}",
                self.keys.tag()
            )));
        }
        if !matches!(
            self.values.as_ref(),
            Value::Vector(_) | Value::List(_) | Value::Table(_)
        ) {
            return Err(CodecError::structure(format!(
                "dictionary values must be a vector, list or table, got {}",
                self.values.tag()
            )));
        }
        let (keys, values) = (self.keys.len(), self.values.len());
        if keys != values {
            return Err(CodecError::structure(format!(
                "dictionary has {} keys but {} values",
                keys.unwrap_or(0),
                values.unwrap_or(0)
            )));
        }
        Ok(())
    }
}

/// Columnar table: `flip` of a dictionary of symbol names to columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub attribute: Attribute,
    pub columns: Vec<Text>,
    pub data: Vec<Value>,
}

impl Table {
    pub fn new(columns: Vec<Text>, data: Vec<Value>) -> Self {
        Self {
            attribute: Attribute::NONE,
            columns,
            data,
        }
    }

    /// Row count, taken from the first column.
    pub fn rows(&self) -> usize {
        self.data.first().and_then(Value::len).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.data.get(index)
    }

    pub fn validate(&self) -> CodecResult<()> {
        self.check_shape()?;
        self.data.iter().try_for_each(Value::validate)
    }

    /// Column count, kinds and lengths, without descending into columns.
    pub fn check_shape(&self) -> CodecResult<()> {
        if self.columns.len() != self.data.len() {
            return Err(CodecError::structure(format!(
                "table has {} column names but {} columns",
                self.columns.len(),
                self.data.len()
            )));
        }
        let rows = self.rows();
        for (name, column) in self.columns.iter().zip(&self.data) {
            check_text(name, "column name")?;
            match column.len() {
                Some(n) if n == rows && matches!(column, Value::Vector(_) | Value::List(_)) => {}
                Some(n) if matches!(column, Value::Vector(_) | Value::List(_)) => {
                    return Err(CodecError::structure(format!(
                        "column `{name}` has {n} rows, expected {rows}"
                    )));
                }
                _ => {
                    return Err(CodecError::structure(format!(
                        "column `{name}` must be a vector or list, got {}",
                        column.tag()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Table split into key columns and value columns, row-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyedTable {
    pub keys: Table,
    pub values: Table,
}

impl KeyedTable {
    pub fn new(keys: Table, values: Table) -> Self {
        Self { keys, values }
    }

    pub fn rows(&self) -> usize {
        self.keys.rows()
    }

    pub fn validate(&self) -> CodecResult<()> {
        self.check_shape()?;
        self.keys.validate()?;
        self.values.validate()
    }

    pub fn check_shape(&self) -> CodecResult<()> {
        self.keys.check_shape()?;
        self.values.check_shape()?;
        if self.keys.rows() != self.values.rows() {
            return Err(CodecError::structure(format!(
                "keyed table has {} key rows but {} value rows",
                self.keys.rows(),
                self.values.rows()
            )));
        }
        Ok(())
    }
}

// ==================== Functions ====================

/// Function literal, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lambda {
    /// Namespace the lambda was defined in; empty for the root.
    #[serde(default)]
    pub context: Text,
    pub expression: Text,
}

impl Lambda {
    pub fn new(expression: impl Into<Text>) -> Self {
        Self {
            context: Text::default(),
            expression: expression.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<Text>) -> Self {
        self.context = context.into();
        self
    }
}

/// Partially applied function. `Value::Null` in `args` marks an unbound slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub function: Box<Value>,
    pub args: Vec<Value>,
}

impl Projection {
    pub fn new(function: impl Into<Value>, args: Vec<Value>) -> Self {
        Self {
            function: Box::new(function.into()),
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveArity {
    Unary,
    Binary,
    Ternary,
}

impl PrimitiveArity {
    pub fn tag(self) -> TypeTag {
        match self {
            PrimitiveArity::Unary => TypeTag::UnaryPrimitive,
            PrimitiveArity::Binary => TypeTag::BinaryPrimitive,
            PrimitiveArity::Ternary => TypeTag::TernaryPrimitive,
        }
    }
}

/// Reference to a built-in operator by its one-byte code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Primitive {
    pub arity: PrimitiveArity,
    pub code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdverbKind {
    Each,
    Over,
    Scan,
    EachPrior,
    EachRight,
    EachLeft,
}

impl AdverbKind {
    pub fn tag(self) -> TypeTag {
        match self {
            AdverbKind::Each => TypeTag::Each,
            AdverbKind::Over => TypeTag::Over,
            AdverbKind::Scan => TypeTag::Scan,
            AdverbKind::EachPrior => TypeTag::EachPrior,
            AdverbKind::EachRight => TypeTag::EachRight,
            AdverbKind::EachLeft => TypeTag::EachLeft,
        }
    }

    pub fn from_tag(tag: TypeTag) -> Option<Self> {
        let kind = match tag {
            TypeTag::Each => AdverbKind::Each,
            TypeTag::Over => AdverbKind::Over,
            TypeTag::Scan => AdverbKind::Scan,
            TypeTag::EachPrior => AdverbKind::EachPrior,
            TypeTag::EachRight => AdverbKind::EachRight,
            TypeTag::EachLeft => AdverbKind::EachLeft,
            _ => return None,
        };
        Some(kind)
    }

    /// q glyph, e.g. `/:` for each-right.
    pub fn glyph(self) -> &'static str {
        match self {
            AdverbKind::Each => "'",
            AdverbKind::Over => "/",
            AdverbKind::Scan => "\\",
            AdverbKind::EachPrior => "':",
            AdverbKind::EachRight => "/:",
            AdverbKind::EachLeft => "\\:",
        }
    }
}

/// A function modified by an adverb (iterator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adverb {
    pub kind: AdverbKind,
    pub function: Box<Value>,
}

impl Adverb {
    pub fn new(kind: AdverbKind, function: impl Into<Value>) -> Self {
        Self {
            kind,
            function: Box::new(function.into()),
        }
    }
}

// ==================== Value ====================

/// Any value the wire format can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Atom(Atom),
    Vector(Vector),
    /// General (mixed) list
    List(Vec<Value>),
    Dictionary(Dictionary),
    Table(Table),
    KeyedTable(KeyedTable),
    Lambda(Lambda),
    Projection(Projection),
    Primitive(Primitive),
    Composition(Vec<Value>),
    Adverb(Adverb),
    /// Error raised by the remote process
    Error(Text),
    /// The generic null `::`
    Null,
}

impl Value {
    pub fn boolean(value: bool) -> Self {
        Value::Atom(Atom::Boolean(value))
    }

    pub fn int(value: i32) -> Self {
        Value::Atom(Atom::Int(value))
    }

    pub fn long(value: i64) -> Self {
        Value::Atom(Atom::Long(value))
    }

    pub fn float(value: f64) -> Self {
        Value::Atom(Atom::Float(value))
    }

    pub fn symbol(value: impl Into<Text>) -> Self {
        Value::Atom(Atom::Symbol(value.into()))
    }

    pub fn char(value: u8) -> Self {
        Value::Atom(Atom::Char(value))
    }

    /// A q string (char vector).
    pub fn string(value: impl AsRef<[u8]>) -> Self {
        Value::Vector(Vector::new(VectorData::Char(value.as_ref().to_vec())))
    }

    pub fn symbols<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Text>,
    {
        Value::Vector(Vector::new(VectorData::Symbol(
            values.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn longs(values: impl Into<Vec<i64>>) -> Self {
        Value::Vector(Vector::new(VectorData::Long(values.into())))
    }

    pub fn error(message: impl Into<Text>) -> Self {
        Value::Error(message.into())
    }

    /// Type tag of the value. Atoms report their scalar tag.
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Atom(atom) => atom.tag(),
            Value::Vector(vector) => vector.tag(),
            Value::List(_) => TypeTag::List,
            Value::Dictionary(_) | Value::KeyedTable(_) => TypeTag::Dictionary,
            Value::Table(_) => TypeTag::Table,
            Value::Lambda(_) => TypeTag::Lambda,
            Value::Projection(_) => TypeTag::Projection,
            Value::Primitive(p) => p.arity.tag(),
            Value::Composition(_) => TypeTag::Composition,
            Value::Adverb(a) => a.kind.tag(),
            Value::Error(_) => TypeTag::Error,
            Value::Null => TypeTag::UnaryPrimitive,
        }
    }

    /// Element count for vectors and lists, row count for tables.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Vector(vector) => Some(vector.len()),
            Value::List(items) => Some(items.len()),
            Value::Dictionary(dict) => Some(dict.len()),
            Value::Table(table) => Some(table.rows()),
            Value::KeyedTable(table) => Some(table.rows()),
            _ => None,
        }
    }

    /// Item `index` of a vector or list.
    pub fn item(&self, index: usize) -> Option<Value> {
        match self {
            Value::Vector(vector) => vector.data.get(index).map(Value::Atom),
            Value::List(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Value::Atom(atom) => Some(atom),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Vector> {
        match self {
            Value::Vector(vector) => Some(vector),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_atom().and_then(Atom::as_i64)
    }

    /// Text of a symbol atom or char vector, if it is UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()?).ok()
    }

    /// Raw bytes of a symbol atom or char vector.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Atom(Atom::Symbol(s)) => Some(s.as_bytes()),
            Value::Vector(Vector {
                data: VectorData::Char(bytes),
                ..
            }) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// The generic null or a null atom.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Atom(atom) => atom.is_null(),
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self,
            Value::Lambda(_)
                | Value::Projection(_)
                | Value::Primitive(_)
                | Value::Composition(_)
                | Value::Adverb(_)
        )
    }

    /// Check every structural invariant in the tree.
    pub fn validate(&self) -> CodecResult<()> {
        match self {
            Value::Atom(Atom::Symbol(s)) => check_text(s, "symbol"),
            Value::Atom(_) | Value::Primitive(_) | Value::Null => Ok(()),
            Value::Vector(vector) => {
                check_count(vector.len())?;
                if let VectorData::Symbol(symbols) = &vector.data {
                    symbols.iter().try_for_each(|s| check_text(s, "symbol"))?;
                }
                Ok(())
            }
            Value::List(items) => {
                check_count(items.len())?;
                items.iter().try_for_each(Value::validate)
            }
            Value::Dictionary(dict) => dict.validate(),
            Value::Table(table) => table.validate(),
            Value::KeyedTable(table) => table.validate(),
            Value::Lambda(lambda) => check_text(&lambda.context, "lambda context"),
            Value::Projection(projection) => {
                check_function(&projection.function, "projection")?;
                check_count(projection.args.len() + 1)?;
                projection.function.validate()?;
                projection.args.iter().try_for_each(Value::validate)
            }
            Value::Composition(functions) => {
                check_count(functions.len())?;
                functions.iter().try_for_each(Value::validate)
            }
            Value::Adverb(adverb) => {
                check_function(&adverb.function, "adverb")?;
                adverb.function.validate()
            }
            Value::Error(message) => check_text(message, "error message"),
        }
    }

    /// First tag in the tree (depth first) matching `pred`.
    pub fn find_tag(&self, pred: &impl Fn(TypeTag) -> bool) -> Option<TypeTag> {
        let tag = self.tag();
        if pred(tag) {
            return Some(tag);
        }
        match self {
            Value::List(items) | Value::Composition(items) => {
                items.iter().find_map(|v| v.find_tag(pred))
            }
            Value::Dictionary(dict) => dict
                .keys
                .find_tag(pred)
                .or_else(|| dict.values.find_tag(pred)),
            Value::Table(table) => table_find_tag(table, pred),
            Value::KeyedTable(table) => {
                table_find_tag(&table.keys, pred).or_else(|| table_find_tag(&table.values, pred))
            }
            Value::Projection(projection) => projection
                .function
                .find_tag(pred)
                .or_else(|| projection.args.iter().find_map(|v| v.find_tag(pred))),
            Value::Adverb(adverb) => adverb.function.find_tag(pred),
            // lambda bodies travel as char vectors
            Value::Lambda(_) if pred(TypeTag::Char) => Some(TypeTag::Char),
            _ => None,
        }
    }

    /// First error value in the tree, if any.
    pub fn find_error(&self) -> Option<&Text> {
        match self {
            Value::Error(message) => Some(message),
            Value::List(items) | Value::Composition(items) => {
                items.iter().find_map(Value::find_error)
            }
            Value::Dictionary(dict) => dict.keys.find_error().or_else(|| dict.values.find_error()),
            Value::Table(table) => table.data.iter().find_map(Value::find_error),
            Value::KeyedTable(table) => table
                .keys
                .data
                .iter()
                .chain(&table.values.data)
                .find_map(Value::find_error),
            Value::Projection(projection) => projection
                .function
                .find_error()
                .or_else(|| projection.args.iter().find_map(Value::find_error)),
            Value::Adverb(adverb) => adverb.function.find_error(),
            _ => None,
        }
    }
}

fn table_find_tag(table: &Table, pred: &impl Fn(TypeTag) -> bool) -> Option<TypeTag> {
    for tag in [TypeTag::Table, TypeTag::Dictionary, TypeTag::Symbol, TypeTag::List] {
        if pred(tag) {
            return Some(tag);
        }
    }
    table.data.iter().find_map(|v| v.find_tag(pred))
}

/// Text written NUL-terminated cannot contain NUL itself.
fn check_text(text: &Text, what: &str) -> CodecResult<()> {
    if text.contains(&0) {
        return Err(CodecError::structure(format!(
            "{what} contains a NUL byte: {text:?}"
        )));
    }
    Ok(())
}

fn check_count(count: usize) -> CodecResult<()> {
    if count > MAX_COUNT {
        return Err(CodecError::structure(format!(
            "{count} elements exceed the 4-byte count field"
        )));
    }
    Ok(())
}

fn check_function(value: &Value, what: &str) -> CodecResult<()> {
    if !value.is_function() {
        return Err(CodecError::structure(format!(
            "{what} must wrap a function, got {}",
            value.tag()
        )));
    }
    Ok(())
}

impl From<Atom> for Value {
    fn from(atom: Atom) -> Self {
        Value::Atom(atom)
    }
}

impl From<Vector> for Value {
    fn from(vector: Vector) -> Self {
        Value::Vector(vector)
    }
}

impl From<VectorData> for Value {
    fn from(data: VectorData) -> Self {
        Value::Vector(Vector::new(data))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Dictionary> for Value {
    fn from(dict: Dictionary) -> Self {
        Value::Dictionary(dict)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}

impl From<KeyedTable> for Value {
    fn from(table: KeyedTable) -> Self {
        Value::KeyedTable(table)
    }
}

impl From<Lambda> for Value {
    fn from(lambda: Lambda) -> Self {
        Value::Lambda(lambda)
    }
}

impl From<Projection> for Value {
    fn from(projection: Projection) -> Self {
        Value::Projection(projection)
    }
}
