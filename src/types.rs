//! Source and target type model.
//!
//! [`SourceKind`] is the closed set of physical column kinds a columnar file
//! can carry. [`TargetType`] is the logical type set rows are materialized
//! into. [`map_source_kind()`] is the single place that decides which source
//! kinds are scannable: the four structural kinds (list, map, struct, union)
//! are rejected there and nowhere else.
//!
//! [`DeclaredType`] is what a host declares for an output column, e.g.
//! `numeric(10,2)` or `varchar(20)`. It parses from and renders to the host's
//! type spelling so table definitions can be written by hand.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{ScanError, ScanResult};

pub const DECIMAL_MAX_PRECISION: u32 = 38;
pub const NARROW_DECIMAL_MAX_PRECISION: u32 = 18;

/// Length header the host adds to packed numeric type modifiers.
const VARHDRSZ: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    List,
    Map,
    Struct,
    Union,
    Decimal,
    Date,
    Varchar,
    Char,
}

impl SourceKind {
    pub const ALL: [SourceKind; 18] = [
        SourceKind::Boolean,
        SourceKind::Byte,
        SourceKind::Short,
        SourceKind::Int,
        SourceKind::Long,
        SourceKind::Float,
        SourceKind::Double,
        SourceKind::String,
        SourceKind::Binary,
        SourceKind::Timestamp,
        SourceKind::List,
        SourceKind::Map,
        SourceKind::Struct,
        SourceKind::Union,
        SourceKind::Decimal,
        SourceKind::Date,
        SourceKind::Varchar,
        SourceKind::Char,
    ];

    pub fn is_structural(self) -> bool {
        matches!(
            self,
            SourceKind::List | SourceKind::Map | SourceKind::Struct | SourceKind::Union
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Boolean => "boolean",
            SourceKind::Byte => "byte",
            SourceKind::Short => "short",
            SourceKind::Int => "int",
            SourceKind::Long => "long",
            SourceKind::Float => "float",
            SourceKind::Double => "double",
            SourceKind::String => "string",
            SourceKind::Binary => "binary",
            SourceKind::Timestamp => "timestamp",
            SourceKind::List => "list",
            SourceKind::Map => "map",
            SourceKind::Struct => "struct",
            SourceKind::Union => "union",
            SourceKind::Decimal => "decimal",
            SourceKind::Date => "date",
            SourceKind::Varchar => "varchar",
            SourceKind::Char => "char",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Numeric,
    Text,
    Char,
    Varchar,
    Bytea,
    Date,
    Timestamp,
}

impl TargetType {
    /// Host spelling used in generated DDL and error messages.
    pub fn host_name(self) -> &'static str {
        match self {
            TargetType::Boolean => "boolean",
            TargetType::Int16 => "smallint",
            TargetType::Int32 => "integer",
            TargetType::Int64 => "bigint",
            TargetType::Float32 => "real",
            TargetType::Float64 => "double precision",
            TargetType::Numeric => "numeric",
            TargetType::Text => "text",
            TargetType::Char => "character",
            TargetType::Varchar => "character varying",
            TargetType::Bytea => "bytea",
            TargetType::Date => "date",
            TargetType::Timestamp => "timestamp with time zone",
        }
    }

    /// Fixed storage width in bytes, 0 for variable-length types.
    pub fn physical_size(self, precision: u32) -> usize {
        match self {
            TargetType::Boolean => 1,
            TargetType::Int16 => 2,
            TargetType::Int32 | TargetType::Float32 | TargetType::Date => 4,
            TargetType::Int64 | TargetType::Float64 | TargetType::Timestamp => 8,
            TargetType::Numeric if precision <= NARROW_DECIMAL_MAX_PRECISION => 8,
            TargetType::Numeric => 16,
            TargetType::Text | TargetType::Char | TargetType::Varchar | TargetType::Bytea => 0,
        }
    }

    pub fn is_variable_length(self) -> bool {
        self.physical_size(0) == 0
    }

    pub fn is_text_family(self) -> bool {
        matches!(self, TargetType::Text | TargetType::Char | TargetType::Varchar)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_name())
    }
}

/// Maps a physical source kind to the logical type rows are produced in.
/// Returns `None` for the structural kinds, which cannot be scanned.
pub fn map_source_kind(kind: SourceKind) -> Option<TargetType> {
    let target = match kind {
        SourceKind::Boolean => TargetType::Boolean,
        SourceKind::Byte | SourceKind::Short => TargetType::Int16,
        SourceKind::Int => TargetType::Int32,
        SourceKind::Long => TargetType::Int64,
        SourceKind::Float => TargetType::Float32,
        SourceKind::Double => TargetType::Float64,
        SourceKind::String => TargetType::Text,
        SourceKind::Binary => TargetType::Bytea,
        SourceKind::Timestamp => TargetType::Timestamp,
        SourceKind::Decimal => TargetType::Numeric,
        SourceKind::Date => TargetType::Date,
        SourceKind::Varchar => TargetType::Varchar,
        SourceKind::Char => TargetType::Char,
        SourceKind::List | SourceKind::Map | SourceKind::Struct | SourceKind::Union => {
            return None;
        }
    };
    Some(target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    pub fn new(precision: u32, scale: u32) -> ScanResult<Self> {
        let spec = Self { precision, scale };
        spec.ensure_valid()?;
        Ok(spec)
    }

    pub fn ensure_valid(&self) -> ScanResult<()> {
        if self.precision == 0 || self.precision > DECIMAL_MAX_PRECISION {
            return Err(ScanError::TypeName(format!(
                "numeric precision {} must be between 1 and {}",
                self.precision, DECIMAL_MAX_PRECISION
            )));
        }
        if self.scale > self.precision {
            return Err(ScanError::TypeName(format!(
                "numeric scale {} cannot exceed precision {}",
                self.scale, self.precision
            )));
        }
        Ok(())
    }

    /// Type modifier in the host's packed form.
    pub fn packed_typmod(&self) -> i32 {
        (((self.precision << 16) | self.scale) as i32) + VARHDRSZ
    }
}

impl fmt::Display for DecimalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.precision, self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeModifier {
    Length(u32),
    Numeric(DecimalSpec),
}

impl fmt::Display for TypeModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeModifier::Length(len) => write!(f, "({len})"),
            TypeModifier::Numeric(spec) => write!(f, "{spec}"),
        }
    }
}

/// A host-declared column type: a logical kind plus an optional modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    pub kind: TargetType,
    pub modifier: Option<TypeModifier>,
}

impl DeclaredType {
    pub fn plain(kind: TargetType) -> Self {
        Self {
            kind,
            modifier: None,
        }
    }

    pub fn numeric(precision: u32, scale: u32) -> ScanResult<Self> {
        Ok(Self {
            kind: TargetType::Numeric,
            modifier: Some(TypeModifier::Numeric(DecimalSpec::new(precision, scale)?)),
        })
    }

    pub fn with_length(kind: TargetType, length: u32) -> Self {
        Self {
            kind,
            modifier: Some(TypeModifier::Length(length)),
        }
    }
}

impl From<TargetType> for DeclaredType {
    fn from(kind: TargetType) -> Self {
        DeclaredType::plain(kind)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.modifier {
            Some(modifier) => write!(f, "{}{}", self.kind.host_name(), modifier),
            None => f.write_str(self.kind.host_name()),
        }
    }
}

impl FromStr for DeclaredType {
    type Err = ScanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (base, args) = match trimmed.find('(') {
            Some(start) => {
                if !trimmed.ends_with(')') {
                    return Err(ScanError::TypeName(format!(
                        "type '{value}' must close its modifier with ')'"
                    )));
                }
                (
                    trimmed[..start].trim(),
                    Some(&trimmed[start + 1..trimmed.len() - 1]),
                )
            }
            None => (trimmed, None),
        };
        let normalized = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        let kind = match normalized.as_str() {
            "bool" | "boolean" => TargetType::Boolean,
            "int2" | "smallint" => TargetType::Int16,
            "int" | "int4" | "integer" => TargetType::Int32,
            "int8" | "bigint" => TargetType::Int64,
            "float4" | "real" => TargetType::Float32,
            "float8" | "double" | "double precision" => TargetType::Float64,
            "numeric" | "decimal" => TargetType::Numeric,
            "text" => TargetType::Text,
            "char" | "character" | "bpchar" => TargetType::Char,
            "varchar" | "character varying" => TargetType::Varchar,
            "bytea" => TargetType::Bytea,
            "date" => TargetType::Date,
            "timestamptz" | "timestamp with time zone" => TargetType::Timestamp,
            "timestamp" | "timestamp without time zone" => {
                return Err(ScanError::TypeName(format!(
                    "type '{value}' has no time zone; scanned timestamps are timestamptz"
                )));
            }
            _ => {
                return Err(ScanError::TypeName(format!("unknown column type '{value}'")));
            }
        };
        let Some(args) = args else {
            return Ok(DeclaredType::plain(kind));
        };
        let parts = args
            .split(',')
            .map(|part| {
                part.trim().parse::<u32>().map_err(|_| {
                    ScanError::TypeName(format!("type modifier '{}' in '{value}' is not a number", part.trim()))
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;
        match (kind, parts.as_slice()) {
            (TargetType::Numeric, [precision]) => DeclaredType::numeric(*precision, 0),
            (TargetType::Numeric, [precision, scale]) => DeclaredType::numeric(*precision, *scale),
            (TargetType::Char | TargetType::Varchar, [length]) if *length > 0 => {
                Ok(DeclaredType::with_length(kind, *length))
            }
            _ => Err(ScanError::TypeName(format!(
                "type '{value}' does not accept modifier ({args})"
            ))),
        }
    }
}

impl Serialize for DeclaredType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeclaredType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        DeclaredType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}
