//! Columnar reader abstraction.
//!
//! A [`ColumnarReader`] is an open file: it knows its columns, its row count
//! and its format version. A [`RowReader`] created from it pulls rows into a
//! reusable [`ColumnBatch`], one batch per [`RowReader::next`] call. Batches
//! are column-major and keep one storage class per column, mirroring how
//! columnar formats lay values out: integers and booleans in `Long`, floats
//! in `Double`, decimals as unscaled integers, timestamps as seconds plus
//! nanoseconds, and all variable-length values as bytes with offsets.

pub mod memory;
pub mod parquet;

use std::fmt;

use crate::{catalog::SourceColumnInfo, error::ScanResult};

pub use self::memory::{MemoryFile, MemoryRowReader};
pub use self::parquet::{ParquetReader, ParquetRowReader};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnVector {
    Long(Vec<i64>),
    Double(Vec<f64>),
    Decimal64(Vec<i64>),
    Decimal128(Vec<i128>),
    Timestamp { seconds: Vec<i64>, nanos: Vec<i64> },
    Bytes { data: Vec<u8>, offsets: Vec<usize> },
    /// Structural column; only the row count is tracked.
    Opaque { len: usize },
}

impl ColumnVector {
    pub fn storage_name(&self) -> &'static str {
        match self {
            ColumnVector::Long(_) => "long",
            ColumnVector::Double(_) => "double",
            ColumnVector::Decimal64(_) => "decimal64",
            ColumnVector::Decimal128(_) => "decimal128",
            ColumnVector::Timestamp { .. } => "timestamp",
            ColumnVector::Bytes { .. } => "bytes",
            ColumnVector::Opaque { .. } => "opaque",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Long(values) | ColumnVector::Decimal64(values) => values.len(),
            ColumnVector::Double(values) => values.len(),
            ColumnVector::Decimal128(values) => values.len(),
            ColumnVector::Timestamp { seconds, .. } => seconds.len(),
            ColumnVector::Bytes { offsets, .. } => offsets.len().saturating_sub(1),
            ColumnVector::Opaque { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a byte vector from individual values.
    pub fn bytes_from<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        let mut offsets = vec![0];
        for value in values {
            data.extend_from_slice(value.as_ref());
            offsets.push(data.len());
        }
        ColumnVector::Bytes { data, offsets }
    }

    pub fn bytes_at(&self, row: usize) -> Option<&[u8]> {
        match self {
            ColumnVector::Bytes { data, offsets } => {
                let start = *offsets.get(row)?;
                let end = *offsets.get(row + 1)?;
                data.get(start..end)
            }
            _ => None,
        }
    }

    /// Copies rows `start..start + len` into a new vector.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let end = start + len;
        match self {
            ColumnVector::Long(values) => ColumnVector::Long(values[start..end].to_vec()),
            ColumnVector::Double(values) => ColumnVector::Double(values[start..end].to_vec()),
            ColumnVector::Decimal64(values) => ColumnVector::Decimal64(values[start..end].to_vec()),
            ColumnVector::Decimal128(values) => {
                ColumnVector::Decimal128(values[start..end].to_vec())
            }
            ColumnVector::Timestamp { seconds, nanos } => ColumnVector::Timestamp {
                seconds: seconds[start..end].to_vec(),
                nanos: nanos[start..end].to_vec(),
            },
            ColumnVector::Bytes { data, offsets } => {
                let base = offsets[start];
                ColumnVector::Bytes {
                    data: data[base..offsets[end]].to_vec(),
                    offsets: offsets[start..=end].iter().map(|o| o - base).collect(),
                }
            }
            ColumnVector::Opaque { .. } => ColumnVector::Opaque { len },
        }
    }
}

/// One column of a batch with its null flags. `nulls` is `None` when the
/// batch has no nulls in this column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVector {
    pub values: ColumnVector,
    pub nulls: Option<Vec<bool>>,
}

impl FieldVector {
    pub fn new(values: ColumnVector, nulls: Option<Vec<bool>>) -> Self {
        Self { values, nulls }
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls
            .as_ref()
            .is_some_and(|nulls| nulls.get(row).copied().unwrap_or(false))
    }

    pub fn slice(&self, start: usize, len: usize) -> Self {
        let nulls = self
            .nulls
            .as_ref()
            .map(|nulls| nulls[start..start + len].to_vec())
            .filter(|nulls| nulls.iter().any(|null| *null));
        Self {
            values: self.values.slice(start, len),
            nulls,
        }
    }
}

/// A reusable buffer for up to `capacity` rows of the selected columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBatch {
    pub capacity: usize,
    pub num_rows: usize,
    pub fields: Vec<FieldVector>,
}

impl ColumnBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            num_rows: 0,
            fields: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.num_rows = 0;
        self.fields.clear();
    }

    pub fn field(&self, index: usize) -> Option<&FieldVector> {
        self.fields.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowReaderOptions {
    /// File column indices to read; `None` reads every column.
    pub include: Option<Vec<usize>>,
}

impl RowReaderOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn include(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self {
            include: Some(indices),
        }
    }

    pub fn selects(&self, index: usize) -> bool {
        self.include
            .as_ref()
            .is_none_or(|include| include.binary_search(&index).is_ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// An open columnar file.
pub trait ColumnarReader: Send {
    /// Every column the file exposes, in file order, structural ones included.
    fn columns(&self) -> &[SourceColumnInfo];

    fn number_of_rows(&self) -> u64;

    fn format_version(&self) -> FormatVersion;

    /// The version this reader is built against.
    fn expected_format_version(&self) -> FormatVersion;

    /// Non-zero when the file lacks per-column decimal scale metadata.
    fn default_decimal_scale(&self) -> u32;

    fn create_row_reader(&self, options: &RowReaderOptions) -> ScanResult<Box<dyn RowReader>>;
}

/// Sequential batch access to the selected columns of a file.
pub trait RowReader: Send {
    /// The columns this reader fills, in batch field order.
    fn selected_columns(&self) -> &[SourceColumnInfo];

    fn create_row_batch(&self, capacity: usize) -> ColumnBatch;

    /// Fills `batch` with up to `batch.capacity` rows. Returns `false` once no
    /// rows are left.
    fn next(&mut self, batch: &mut ColumnBatch) -> ScanResult<bool>;

    /// Repositions at `row` so the next pull starts there.
    fn seek_to_row(&mut self, row: u64) -> ScanResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_slice_rebases_offsets() {
        let vector = ColumnVector::bytes_from(["ab", "", "cde", "f"]);
        let slice = vector.slice(1, 2);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.bytes_at(0), Some(&b""[..]));
        assert_eq!(slice.bytes_at(1), Some(&b"cde"[..]));
    }

    #[test]
    fn field_slice_drops_all_false_null_masks() {
        let field = FieldVector::new(
            ColumnVector::Long(vec![1, 2, 3]),
            Some(vec![true, false, false]),
        );
        assert!(field.is_null(0));
        assert_eq!(field.slice(1, 2).nulls, None);
        assert_eq!(field.slice(0, 2).nulls, Some(vec![true, false]));
    }

    #[test]
    fn include_options_are_sorted_and_deduplicated() {
        let options = RowReaderOptions::include(vec![4, 1, 4, 2]);
        assert_eq!(options.include, Some(vec![1, 2, 4]));
        assert!(options.selects(2));
        assert!(!options.selects(3));
        assert!(RowReaderOptions::all().selects(99));
    }
}
