//! Parquet files through `parquet`'s Arrow reader.
//!
//! Top-level Arrow fields are classified into source kinds. Fields whose
//! Arrow type has no source kind (unsigned 64-bit, half floats, times of day,
//! durations, intervals, dictionaries, 256-bit decimals, views) are not
//! exposed at all. Structural fields are exposed so the catalog can reject
//! them.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use arrow::{
    array::{Array, ArrayRef, AsArray},
    datatypes::{
        ArrowPrimitiveType, DataType, Date32Type, Date64Type, Decimal128Type, Field, Float32Type,
        Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
        TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
        UInt16Type, UInt32Type,
    },
    error::ArrowError,
    record_batch::RecordBatch,
};
use log::debug;
use parquet::{
    arrow::{
        ProjectionMask,
        arrow_reader::{
            ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReader,
            ParquetRecordBatchReaderBuilder,
        },
    },
    file::metadata::ParquetMetaData,
};

use super::{
    ColumnBatch, ColumnVector, ColumnarReader, FieldVector, FormatVersion, RowReader,
    RowReaderOptions,
};
use crate::{
    catalog::SourceColumnInfo,
    error::{ScanError, ScanResult},
    types::{NARROW_DECIMAL_MAX_PRECISION, SourceKind},
};

/// Field metadata key some writers use to record `char(n)` / `varchar(n)`.
pub const CHAR_VARCHAR_METADATA_KEY: &str = "__CHAR_VARCHAR_TYPE_STRING";

pub const EXPECTED_FORMAT_VERSION: FormatVersion = FormatVersion::new(1, 0);

const READ_BATCH_ROWS: usize = 1024;
const MILLIS_PER_DAY: i64 = 86_400_000;

pub struct ParquetReader {
    path: PathBuf,
    file: File,
    metadata: ArrowReaderMetadata,
    columns: Vec<SourceColumnInfo>,
}

impl ParquetReader {
    pub fn open(path: &Path) -> ScanResult<Self> {
        let file = File::open(path).map_err(|source| ScanError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = ArrowReaderMetadata::load(&file, ArrowReaderOptions::new())?;
        let columns = describe_fields(&metadata);
        debug!(
            "Opened '{}' with {} exposed column(s) and {} row(s)",
            path.display(),
            columns.len(),
            metadata.metadata().file_metadata().num_rows()
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
            metadata,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ColumnarReader for ParquetReader {
    fn columns(&self) -> &[SourceColumnInfo] {
        &self.columns
    }

    fn number_of_rows(&self) -> u64 {
        self.metadata
            .metadata()
            .file_metadata()
            .num_rows()
            .max(0) as u64
    }

    fn format_version(&self) -> FormatVersion {
        let version = self.metadata.metadata().file_metadata().version();
        FormatVersion::new(version.max(0) as u32, 0)
    }

    fn expected_format_version(&self) -> FormatVersion {
        EXPECTED_FORMAT_VERSION
    }

    fn default_decimal_scale(&self) -> u32 {
        // Parquet decimals always carry their scale.
        0
    }

    fn create_row_reader(&self, options: &RowReaderOptions) -> ScanResult<Box<dyn RowReader>> {
        let selected = self
            .columns
            .iter()
            .filter(|column| options.selects(column.index))
            .cloned()
            .collect();
        let file = self.file.try_clone().map_err(|source| ScanError::Open {
            path: self.path.clone(),
            source,
        })?;
        let reader = ParquetRowReader::new(&self.path, file, self.metadata.clone(), selected)?;
        Ok(Box::new(reader))
    }
}

pub struct ParquetRowReader {
    path: PathBuf,
    file: File,
    metadata: ArrowReaderMetadata,
    selected: Vec<SourceColumnInfo>,
    inner: ParquetRecordBatchReader,
    pending: Option<(RecordBatch, usize)>,
}

impl ParquetRowReader {
    fn new(
        path: &Path,
        file: File,
        metadata: ArrowReaderMetadata,
        selected: Vec<SourceColumnInfo>,
    ) -> ScanResult<Self> {
        let inner = build_batch_reader(path, &file, &metadata, &selected, 0)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            metadata,
            selected,
            inner,
            pending: None,
        })
    }
}

fn build_batch_reader(
    path: &Path,
    file: &File,
    metadata: &ArrowReaderMetadata,
    selected: &[SourceColumnInfo],
    offset: usize,
) -> ScanResult<ParquetRecordBatchReader> {
    let handle = file.try_clone().map_err(|source| ScanError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mask = ProjectionMask::roots(
        metadata.parquet_schema(),
        selected.iter().map(|column| column.index),
    );
    let mut builder = ParquetRecordBatchReaderBuilder::new_with_metadata(handle, metadata.clone())
        .with_projection(mask)
        .with_batch_size(READ_BATCH_ROWS);
    if offset > 0 {
        builder = builder.with_offset(offset);
    }
    Ok(builder.build()?)
}

impl RowReader for ParquetRowReader {
    fn selected_columns(&self) -> &[SourceColumnInfo] {
        &self.selected
    }

    fn create_row_batch(&self, capacity: usize) -> ColumnBatch {
        ColumnBatch::with_capacity(capacity.max(1))
    }

    fn next(&mut self, batch: &mut ColumnBatch) -> ScanResult<bool> {
        batch.clear();
        let (record, offset) = match self.pending.take() {
            Some(pending) => pending,
            None => loop {
                match self.inner.next() {
                    Some(Ok(record)) if record.num_rows() == 0 => continue,
                    Some(Ok(record)) => break (record, 0),
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(false),
                }
            },
        };
        let take = (record.num_rows() - offset).min(batch.capacity.max(1));
        let slice = record.slice(offset, take);
        batch.fields = slice
            .columns()
            .iter()
            .map(field_vector)
            .collect::<ScanResult<_>>()?;
        batch.num_rows = take;
        if offset + take < record.num_rows() {
            self.pending = Some((record, offset + take));
        }
        Ok(true)
    }

    fn seek_to_row(&mut self, row: u64) -> ScanResult<()> {
        self.pending = None;
        self.inner = build_batch_reader(
            &self.path,
            &self.file,
            &self.metadata,
            &self.selected,
            row as usize,
        )?;
        Ok(())
    }
}

fn describe_fields(metadata: &ArrowReaderMetadata) -> Vec<SourceColumnInfo> {
    let parquet = metadata.metadata();
    let schema_descr = metadata.parquet_schema();
    let mut first_leaf = vec![None; metadata.schema().fields().len()];
    for leaf in 0..schema_descr.num_columns() {
        let root = schema_descr.get_column_root_idx(leaf);
        if let Some(slot) = first_leaf.get_mut(root) {
            slot.get_or_insert(leaf);
        }
    }

    let mut columns = Vec::new();
    for (index, field) in metadata.schema().fields().iter().enumerate() {
        let Some(mut info) = classify(index, field) else {
            debug!(
                "Column '{}' has Arrow type {} with no scannable counterpart",
                field.name(),
                field.data_type()
            );
            continue;
        };
        info.has_null = field.is_nullable()
            && first_leaf[index].is_none_or(|leaf| leaf_may_hold_nulls(parquet, leaf));
        columns.push(info);
    }
    columns
}

/// Missing statistics count as nullable.
fn leaf_may_hold_nulls(metadata: &ParquetMetaData, leaf: usize) -> bool {
    metadata.row_groups().iter().any(|row_group| {
        row_group
            .column(leaf)
            .statistics()
            .and_then(|stats| stats.null_count_opt())
            .is_none_or(|nulls| nulls > 0)
    })
}

fn classify(index: usize, field: &Field) -> Option<SourceColumnInfo> {
    let name = field.name().as_str();
    let info = match field.data_type() {
        DataType::Boolean => SourceColumnInfo::new(index, name, SourceKind::Boolean),
        DataType::Int8 => SourceColumnInfo::new(index, name, SourceKind::Byte),
        DataType::Int16 | DataType::UInt8 => SourceColumnInfo::new(index, name, SourceKind::Short),
        DataType::Int32 | DataType::UInt16 => SourceColumnInfo::new(index, name, SourceKind::Int),
        DataType::Int64 | DataType::UInt32 => SourceColumnInfo::new(index, name, SourceKind::Long),
        DataType::Float32 => SourceColumnInfo::new(index, name, SourceKind::Float),
        DataType::Float64 => SourceColumnInfo::new(index, name, SourceKind::Double),
        DataType::Utf8 | DataType::LargeUtf8 => match char_varchar(field) {
            Some((kind, length)) => SourceColumnInfo::new(index, name, kind).with_max_length(length),
            None => SourceColumnInfo::new(index, name, SourceKind::String),
        },
        DataType::Binary | DataType::LargeBinary => {
            SourceColumnInfo::new(index, name, SourceKind::Binary)
        }
        DataType::FixedSizeBinary(width) => SourceColumnInfo::new(index, name, SourceKind::Binary)
            .with_max_length((*width).max(0) as u32),
        DataType::Decimal128(precision, scale) => {
            SourceColumnInfo::new(index, name, SourceKind::Decimal)
                .with_decimal(*precision as u32, (*scale).max(0) as u32)
        }
        DataType::Date32 | DataType::Date64 => SourceColumnInfo::new(index, name, SourceKind::Date),
        DataType::Timestamp(_, _) => SourceColumnInfo::new(index, name, SourceKind::Timestamp),
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => {
            SourceColumnInfo::new(index, name, SourceKind::List)
        }
        DataType::Map(_, _) => SourceColumnInfo::new(index, name, SourceKind::Map),
        DataType::Struct(_) => SourceColumnInfo::new(index, name, SourceKind::Struct),
        DataType::Union(_, _) => SourceColumnInfo::new(index, name, SourceKind::Union),
        _ => return None,
    };
    Some(info)
}

fn char_varchar(field: &Field) -> Option<(SourceKind, u32)> {
    let declared = field.metadata().get(CHAR_VARCHAR_METADATA_KEY)?;
    let declared = declared.trim().to_ascii_lowercase();
    let (base, rest) = declared.split_once('(')?;
    let length = rest.strip_suffix(')')?.trim().parse::<u32>().ok()?;
    match base.trim() {
        "char" => Some((SourceKind::Char, length)),
        "varchar" => Some((SourceKind::Varchar, length)),
        _ => None,
    }
}

fn field_vector(array: &ArrayRef) -> ScanResult<FieldVector> {
    let nulls = (array.null_count() > 0)
        .then(|| (0..array.len()).map(|row| array.is_null(row)).collect());
    let values = match array.data_type() {
        DataType::Boolean => {
            let booleans = array.as_boolean();
            ColumnVector::Long((0..booleans.len()).map(|row| booleans.value(row) as i64).collect())
        }
        DataType::Int8 => longs::<Int8Type>(array),
        DataType::Int16 => longs::<Int16Type>(array),
        DataType::Int32 => longs::<Int32Type>(array),
        DataType::Int64 => longs::<Int64Type>(array),
        DataType::UInt8 => longs::<UInt8Type>(array),
        DataType::UInt16 => longs::<UInt16Type>(array),
        DataType::UInt32 => longs::<UInt32Type>(array),
        DataType::Float32 => ColumnVector::Double(
            array
                .as_primitive::<Float32Type>()
                .values()
                .iter()
                .map(|value| *value as f64)
                .collect(),
        ),
        DataType::Float64 => {
            ColumnVector::Double(array.as_primitive::<Float64Type>().values().to_vec())
        }
        DataType::Decimal128(precision, _) => {
            let values = array.as_primitive::<Decimal128Type>().values();
            if *precision as u32 <= NARROW_DECIMAL_MAX_PRECISION {
                ColumnVector::Decimal64(values.iter().map(|value| *value as i64).collect())
            } else {
                ColumnVector::Decimal128(values.to_vec())
            }
        }
        DataType::Date32 => longs::<Date32Type>(array),
        DataType::Date64 => ColumnVector::Long(
            array
                .as_primitive::<Date64Type>()
                .values()
                .iter()
                .map(|millis| millis.div_euclid(MILLIS_PER_DAY))
                .collect(),
        ),
        DataType::Timestamp(unit, _) => timestamps(array, unit),
        DataType::Utf8 => ColumnVector::bytes_from(
            array
                .as_string::<i32>()
                .iter()
                .map(|value| value.unwrap_or_default()),
        ),
        DataType::LargeUtf8 => ColumnVector::bytes_from(
            array
                .as_string::<i64>()
                .iter()
                .map(|value| value.unwrap_or_default()),
        ),
        DataType::Binary => ColumnVector::bytes_from(
            array
                .as_binary::<i32>()
                .iter()
                .map(|value| value.unwrap_or_default()),
        ),
        DataType::LargeBinary => ColumnVector::bytes_from(
            array
                .as_binary::<i64>()
                .iter()
                .map(|value| value.unwrap_or_default()),
        ),
        DataType::FixedSizeBinary(_) => ColumnVector::bytes_from(
            array
                .as_fixed_size_binary()
                .iter()
                .map(|value| value.unwrap_or_default()),
        ),
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Map(_, _)
        | DataType::Struct(_)
        | DataType::Union(_, _) => ColumnVector::Opaque { len: array.len() },
        other => {
            return Err(ArrowError::SchemaError(format!(
                "no batch storage for Arrow type {other}"
            ))
            .into());
        }
    };
    Ok(FieldVector::new(values, nulls))
}

fn longs<T>(array: &ArrayRef) -> ColumnVector
where
    T: ArrowPrimitiveType,
    T::Native: Into<i64>,
{
    ColumnVector::Long(
        array
            .as_primitive::<T>()
            .values()
            .iter()
            .map(|value| (*value).into())
            .collect(),
    )
}

fn timestamps(array: &ArrayRef, unit: &TimeUnit) -> ColumnVector {
    let (raw, per_second) = match unit {
        TimeUnit::Second => (array.as_primitive::<TimestampSecondType>().values(), 1),
        TimeUnit::Millisecond => (
            array.as_primitive::<TimestampMillisecondType>().values(),
            1_000,
        ),
        TimeUnit::Microsecond => (
            array.as_primitive::<TimestampMicrosecondType>().values(),
            1_000_000,
        ),
        TimeUnit::Nanosecond => (
            array.as_primitive::<TimestampNanosecondType>().values(),
            1_000_000_000,
        ),
    };
    let nanos_per_unit = 1_000_000_000 / per_second;
    let seconds = raw.iter().map(|value| value.div_euclid(per_second)).collect();
    let nanos = raw
        .iter()
        .map(|value| value.rem_euclid(per_second) * nanos_per_unit)
        .collect();
    ColumnVector::Timestamp { seconds, nanos }
}
