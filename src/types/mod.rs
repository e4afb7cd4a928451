//! Logical type system.
//!
//! A [`LogicalType`] is a closed tag plus an optional extension for the
//! parameterized kinds (decimal precision/scale, struct fields, union
//! variants, …) and an optional alias. The alias doubles as the column name
//! when a type appears in a schema snapshot and as the field name when it
//! appears inside a struct.
//!
//! Two types are equal iff their tags match and, recursively, all children
//! including aliases match.

pub mod value;

pub use value::Value;

use serde::{Deserialize, Serialize};

/// Closed set of logical type tags.
///
/// Discriminants are part of the wire format (`complex_logical_type` in the
/// plan IR) and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeTag {
    Na = 0,
    Boolean = 1,
    TinyInt = 2,
    SmallInt = 3,
    Integer = 4,
    BigInt = 5,
    HugeInt = 6,
    UTinyInt = 7,
    USmallInt = 8,
    UInteger = 9,
    UBigInt = 10,
    UHugeInt = 11,
    Float = 12,
    Double = 13,
    Decimal = 14,
    StringLiteral = 15,
    Date = 16,
    Timestamp = 17,
    Interval = 18,
    Uuid = 19,
    Struct = 20,
    Array = 21,
    Map = 22,
    List = 23,
    Enum = 24,
    Union = 25,
}

impl TypeTag {
    pub fn from_u8(v: u8) -> Option<TypeTag> {
        use TypeTag::*;
        Some(match v {
            0 => Na,
            1 => Boolean,
            2 => TinyInt,
            3 => SmallInt,
            4 => Integer,
            5 => BigInt,
            6 => HugeInt,
            7 => UTinyInt,
            8 => USmallInt,
            9 => UInteger,
            10 => UBigInt,
            11 => UHugeInt,
            12 => Float,
            13 => Double,
            14 => Decimal,
            15 => StringLiteral,
            16 => Date,
            17 => Timestamp,
            18 => Interval,
            19 => Uuid,
            20 => Struct,
            21 => Array,
            22 => Map,
            23 => List,
            24 => Enum,
            25 => Union,
            _ => return None,
        })
    }

    /// Whether the tag needs a [`TypeExtension`] to be fully specified.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TypeTag::Decimal
                | TypeTag::Struct
                | TypeTag::Array
                | TypeTag::Map
                | TypeTag::List
                | TypeTag::Enum
                | TypeTag::Union
        )
    }
}

/// Extension payload for parameterized tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExtension {
    Decimal { precision: u8, scale: u8 },
    Struct { fields: Vec<LogicalType> },
    Array { element: LogicalType, size: Option<usize> },
    Map { key: LogicalType, value: LogicalType },
    List { element: LogicalType },
    Enum { entries: Vec<(String, i64)> },
    /// Variant order is first-seen; the variant index is the union tag.
    Union { variants: Vec<LogicalType> },
}

/// A logical column/value type: tag, optional extension, optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalType {
    tag: TypeTag,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    extension: Option<Box<TypeExtension>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    alias: Option<String>,
}

impl LogicalType {
    pub const NA: LogicalType = LogicalType {
        tag: TypeTag::Na,
        extension: None,
        alias: None,
    };

    pub fn new(tag: TypeTag) -> Self {
        debug_assert!(!tag.is_composite(), "composite tag requires an extension");
        Self {
            tag,
            extension: None,
            alias: None,
        }
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self {
            tag: TypeTag::Decimal,
            extension: Some(Box::new(TypeExtension::Decimal { precision, scale })),
            alias: None,
        }
    }

    /// A struct whose field names are the aliases of `fields`.
    pub fn struct_type(fields: Vec<LogicalType>) -> Self {
        Self {
            tag: TypeTag::Struct,
            extension: Some(Box::new(TypeExtension::Struct { fields })),
            alias: None,
        }
    }

    pub fn array(element: LogicalType, size: Option<usize>) -> Self {
        Self {
            tag: TypeTag::Array,
            extension: Some(Box::new(TypeExtension::Array { element, size })),
            alias: None,
        }
    }

    pub fn map(key: LogicalType, value: LogicalType) -> Self {
        Self {
            tag: TypeTag::Map,
            extension: Some(Box::new(TypeExtension::Map { key, value })),
            alias: None,
        }
    }

    pub fn list(element: LogicalType) -> Self {
        Self {
            tag: TypeTag::List,
            extension: Some(Box::new(TypeExtension::List { element })),
            alias: None,
        }
    }

    pub fn enum_type(entries: Vec<(String, i64)>) -> Self {
        Self {
            tag: TypeTag::Enum,
            extension: Some(Box::new(TypeExtension::Enum { entries })),
            alias: None,
        }
    }

    /// A tagged union over `variants`, in first-seen order. The physical
    /// representation carries a `UTINYINT` tag before the payload.
    pub fn union_type(variants: Vec<LogicalType>) -> Self {
        Self {
            tag: TypeTag::Union,
            extension: Some(Box::new(TypeExtension::Union { variants })),
            alias: None,
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn extension(&self) -> Option<&TypeExtension> {
        self.extension.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.set_alias(alias);
        self
    }

    pub fn clear_alias(&mut self) {
        self.alias = None;
    }

    /// Struct fields, if this is a struct.
    pub fn struct_fields(&self) -> Option<&[LogicalType]> {
        match self.extension() {
            Some(TypeExtension::Struct { fields }) => Some(fields),
            _ => None,
        }
    }

    /// Union variants, if this is a union.
    pub fn union_variants(&self) -> Option<&[LogicalType]> {
        match self.extension() {
            Some(TypeExtension::Union { variants }) => Some(variants),
            _ => None,
        }
    }

    /// Element type of a list or array.
    pub fn element_type(&self) -> Option<&LogicalType> {
        match self.extension() {
            Some(TypeExtension::List { element }) => Some(element),
            Some(TypeExtension::Array { element, .. }) => Some(element),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        numeric_family(self.tag).is_some()
    }

    pub fn is_nested(&self) -> bool {
        matches!(
            self.tag,
            TypeTag::Struct | TypeTag::Array | TypeTag::Map | TypeTag::List | TypeTag::Union
        )
    }

    /// Storage layout for this logical type.
    pub fn physical(&self) -> PhysicalType {
        use TypeTag::*;
        match self.tag {
            Na => PhysicalType::Empty,
            Boolean => PhysicalType::Bit,
            TinyInt => PhysicalType::Int8,
            SmallInt => PhysicalType::Int16,
            Integer | Date => PhysicalType::Int32,
            BigInt | Timestamp => PhysicalType::Int64,
            HugeInt | Decimal | Interval => PhysicalType::Int128,
            UTinyInt => PhysicalType::UInt8,
            USmallInt => PhysicalType::UInt16,
            UInteger => PhysicalType::UInt32,
            UBigInt => PhysicalType::UInt64,
            UHugeInt | Uuid => PhysicalType::UInt128,
            Float => PhysicalType::Float32,
            Double => PhysicalType::Float64,
            StringLiteral => PhysicalType::VarLen,
            Enum => PhysicalType::Int64,
            Struct | Array | Map | List | Union => PhysicalType::Nested,
        }
    }
}

impl From<TypeTag> for LogicalType {
    fn from(tag: TypeTag) -> Self {
        LogicalType::new(tag)
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.extension() {
            Some(TypeExtension::Decimal { precision, scale }) => {
                write!(f, "DECIMAL({precision},{scale})")
            }
            Some(TypeExtension::Struct { fields }) => {
                write!(f, "STRUCT{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.alias().unwrap_or("_"), field)?;
                }
                write!(f, "}}")
            }
            Some(TypeExtension::Union { variants }) => {
                write!(f, "UNION[")?;
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Some(TypeExtension::List { element }) => write!(f, "LIST[{element}]"),
            Some(TypeExtension::Array { element, size }) => match size {
                Some(n) => write!(f, "ARRAY[{element}; {n}]"),
                None => write!(f, "ARRAY[{element}]"),
            },
            Some(TypeExtension::Map { key, value }) => write!(f, "MAP[{key} -> {value}]"),
            Some(TypeExtension::Enum { .. }) => write!(f, "ENUM"),
            None => write!(f, "{:?}", self.tag),
        }
    }
}

/// Physical storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    /// No storage at all (NA columns carry only validity).
    Empty,
    Bit,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    /// Variable-length bytes backed by the vector's arena.
    VarLen,
    /// Nested values (struct/list/map children, union payloads).
    Nested,
}

/// Canonical numeric family used by [`is_promotable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericFamily {
    Signed,
    Unsigned,
    Floating,
    Decimal,
}

fn numeric_family(tag: TypeTag) -> Option<NumericFamily> {
    use TypeTag::*;
    match tag {
        TinyInt | SmallInt | Integer | BigInt | HugeInt => Some(NumericFamily::Signed),
        UTinyInt | USmallInt | UInteger | UBigInt | UHugeInt => Some(NumericFamily::Unsigned),
        Float | Double => Some(NumericFamily::Floating),
        Decimal => Some(NumericFamily::Decimal),
        _ => None,
    }
}

/// Whether two primitive types share a canonical numeric family.
///
/// Promotion stays explicit in this engine: a conflicting document field
/// widens to a union rather than silently converting, so this is only a
/// query-time compatibility check.
pub fn is_promotable(a: &LogicalType, b: &LogicalType) -> bool {
    match (numeric_family(a.tag()), numeric_family(b.tag())) {
        (Some(fa), Some(fb)) => fa == fb,
        _ => false,
    }
}
