//! Column catalog: the scannable view of a file's columns.
//!
//! A catalog is built from the source column descriptions a reader reports.
//! Each supported column becomes a [`MappedColumn`] carrying its target type,
//! physical size and the accessor used to pull its values out of a batch.
//! Structural columns never make it into the catalog; they are remembered as
//! [`RejectedColumn`]s so callers can report them.

use log::debug;
use serde::Serialize;

use crate::{
    projection::NameMatch,
    types::{
        DeclaredType, DecimalSpec, NARROW_DECIMAL_MAX_PRECISION, SourceKind, TargetType,
        TypeModifier, map_source_kind,
    },
};

/// What a reader knows about one of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceColumnInfo {
    pub index: usize,
    pub name: String,
    pub kind: SourceKind,
    /// 0 when unbounded.
    pub max_length: u32,
    pub precision: u32,
    pub scale: u32,
    pub has_null: bool,
}

impl SourceColumnInfo {
    pub fn new(index: usize, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
            max_length: 0,
            precision: 0,
            scale: 0,
            has_null: true,
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_decimal(mut self, precision: u32, scale: u32) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_has_null(mut self, has_null: bool) -> Self {
        self.has_null = has_null;
        self
    }
}

/// How values of a column are read out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal64,
    Decimal128,
    Date,
    Timestamp,
    VarBytes,
}

impl AccessorKind {
    fn for_column(target: TargetType, precision: u32) -> Self {
        match target {
            TargetType::Boolean => AccessorKind::Boolean,
            TargetType::Int16 => AccessorKind::Int16,
            TargetType::Int32 => AccessorKind::Int32,
            TargetType::Int64 => AccessorKind::Int64,
            TargetType::Float32 => AccessorKind::Float32,
            TargetType::Float64 => AccessorKind::Float64,
            TargetType::Numeric if precision <= NARROW_DECIMAL_MAX_PRECISION => {
                AccessorKind::Decimal64
            }
            TargetType::Numeric => AccessorKind::Decimal128,
            TargetType::Date => AccessorKind::Date,
            TargetType::Timestamp => AccessorKind::Timestamp,
            TargetType::Text | TargetType::Char | TargetType::Varchar | TargetType::Bytea => {
                AccessorKind::VarBytes
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedColumn {
    /// Position among the row reader's selected columns.
    pub index: usize,
    pub name: String,
    pub target: TargetType,
    pub size: usize,
    pub max_length: u32,
    pub precision: u32,
    pub scale: u32,
    pub has_null: bool,
    pub accessor: AccessorKind,
}

impl MappedColumn {
    /// The type a host declares to read this column without a cast.
    pub fn natural_type(&self) -> DeclaredType {
        let modifier = match self.target {
            TargetType::Numeric if self.precision > 0 => Some(TypeModifier::Numeric(DecimalSpec {
                precision: self.precision,
                scale: self.scale,
            })),
            TargetType::Char | TargetType::Varchar if self.max_length > 0 => {
                Some(TypeModifier::Length(self.max_length))
            }
            _ => None,
        };
        DeclaredType {
            kind: self.target,
            modifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedColumn {
    pub name: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    columns: Vec<MappedColumn>,
    rejected: Vec<RejectedColumn>,
}

impl ColumnCatalog {
    pub fn build(sources: &[SourceColumnInfo]) -> Self {
        let mut columns = Vec::with_capacity(sources.len());
        let mut rejected = Vec::new();
        for (position, source) in sources.iter().enumerate() {
            if map_source_kind(source.kind).is_none() {
                debug!(
                    "Skipping column '{}' with unsupported {} type",
                    source.name, source.kind
                );
                rejected.push(RejectedColumn {
                    name: source.name.clone(),
                    kind: source.kind,
                });
                continue;
            }
            columns.push(describe(position, source));
        }
        Self { columns, rejected }
    }

    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    pub fn rejected(&self) -> &[RejectedColumn] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&MappedColumn> {
        self.columns.get(position)
    }

    /// First catalog position whose name matches.
    pub fn position(&self, name: &str, mode: NameMatch) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| mode.matches(&column.name, name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn into_columns(self) -> Vec<MappedColumn> {
        self.columns
    }
}

fn describe(position: usize, source: &SourceColumnInfo) -> MappedColumn {
    let Some(target) = map_source_kind(source.kind) else {
        unreachable!(
            "structural column '{}' reached descriptor construction",
            source.name
        );
    };
    MappedColumn {
        index: position,
        name: source.name.clone(),
        target,
        size: target.physical_size(source.precision),
        max_length: source.max_length,
        precision: source.precision,
        scale: source.scale,
        has_null: source.has_null,
        accessor: AccessorKind::for_column(target, source.precision),
    }
}
