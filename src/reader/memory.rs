//! In-memory columnar files.
//!
//! Hosts that already hold column data can scan it without a file, and the
//! declared row count, format version and default decimal scale can be set
//! freely, which makes this backend useful for exercising the scan engine's
//! edge cases. Every batch pull is counted.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{
    ColumnBatch, ColumnVector, ColumnarReader, FieldVector, FormatVersion, RowReader,
    RowReaderOptions,
};
use crate::{
    catalog::SourceColumnInfo,
    error::{ScanError, ScanResult},
    types::SourceKind,
};

pub const MEMORY_FORMAT_VERSION: FormatVersion = FormatVersion::new(0, 12);

#[derive(Debug, Clone)]
pub struct MemoryFile {
    columns: Vec<SourceColumnInfo>,
    data: Vec<FieldVector>,
    stored_rows: usize,
    declared_rows: Option<u64>,
    version: FormatVersion,
    default_scale: u32,
    pulls: Arc<AtomicUsize>,
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            data: Vec::new(),
            stored_rows: 0,
            declared_rows: None,
            version: MEMORY_FORMAT_VERSION,
            default_scale: 0,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. Every column must hold the same number of rows.
    pub fn with_column(
        mut self,
        info: SourceColumnInfo,
        values: ColumnVector,
        nulls: Option<Vec<bool>>,
    ) -> ScanResult<Self> {
        let rows = values.len();
        if !self.data.is_empty() && rows != self.stored_rows {
            return Err(ScanError::BatchLayout {
                column: info.name,
                expected: "equal column lengths",
                found: "a column of different length",
            });
        }
        if nulls.as_ref().is_some_and(|nulls| nulls.len() != rows) {
            return Err(ScanError::BatchLayout {
                column: info.name,
                expected: "one null flag per row",
                found: "a mismatched null mask",
            });
        }
        let info = SourceColumnInfo {
            index: self.columns.len(),
            ..info
        };
        self.stored_rows = rows;
        self.columns.push(info);
        self.data.push(FieldVector::new(values, nulls));
        Ok(self)
    }

    /// Overrides the row count reported to scans.
    pub fn with_declared_rows(mut self, rows: u64) -> Self {
        self.declared_rows = Some(rows);
        self
    }

    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_default_scale(mut self, scale: u32) -> Self {
        self.default_scale = scale;
        self
    }

    /// Shared counter of batch pulls across every row reader of this file.
    pub fn pull_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulls)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl ColumnarReader for MemoryFile {
    fn columns(&self) -> &[SourceColumnInfo] {
        &self.columns
    }

    fn number_of_rows(&self) -> u64 {
        self.declared_rows.unwrap_or(self.stored_rows as u64)
    }

    fn format_version(&self) -> FormatVersion {
        self.version
    }

    fn expected_format_version(&self) -> FormatVersion {
        MEMORY_FORMAT_VERSION
    }

    fn default_decimal_scale(&self) -> u32 {
        self.default_scale
    }

    fn create_row_reader(&self, options: &RowReaderOptions) -> ScanResult<Box<dyn RowReader>> {
        let (selected, data) = self
            .columns
            .iter()
            .zip(&self.data)
            .filter(|(column, _)| options.selects(column.index))
            .map(|(column, field)| (column.clone(), field.clone()))
            .unzip();
        Ok(Box::new(MemoryRowReader {
            selected,
            data,
            rows: self.stored_rows,
            cursor: 0,
            pulls: Arc::clone(&self.pulls),
        }))
    }
}

#[derive(Debug)]
pub struct MemoryRowReader {
    selected: Vec<SourceColumnInfo>,
    data: Vec<FieldVector>,
    rows: usize,
    cursor: usize,
    pulls: Arc<AtomicUsize>,
}

impl RowReader for MemoryRowReader {
    fn selected_columns(&self) -> &[SourceColumnInfo] {
        &self.selected
    }

    fn create_row_batch(&self, capacity: usize) -> ColumnBatch {
        ColumnBatch::with_capacity(capacity.max(1))
    }

    fn next(&mut self, batch: &mut ColumnBatch) -> ScanResult<bool> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        batch.clear();
        if self.cursor >= self.rows {
            return Ok(false);
        }
        let take = (self.rows - self.cursor).min(batch.capacity.max(1));
        batch.fields = self
            .data
            .iter()
            .map(|field| field.slice(self.cursor, take))
            .collect();
        batch.num_rows = take;
        self.cursor += take;
        Ok(true)
    }

    fn seek_to_row(&mut self, row: u64) -> ScanResult<()> {
        self.cursor = (row as usize).min(self.rows);
        Ok(())
    }
}

/// Convenience for a column description with a given kind.
pub fn column(name: &str, kind: SourceKind) -> SourceColumnInfo {
    SourceColumnInfo::new(0, name, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> MemoryFile {
        MemoryFile::new()
            .with_column(
                column("id", SourceKind::Long),
                ColumnVector::Long(vec![1, 2, 3, 4, 5]),
                None,
            )
            .unwrap()
            .with_column(
                column("name", SourceKind::String),
                ColumnVector::bytes_from(["a", "b", "", "d", "e"]),
                Some(vec![false, false, true, false, false]),
            )
            .unwrap()
    }

    #[test]
    fn columns_are_numbered_in_insertion_order() {
        let file = file();
        let indices: Vec<_> = file.columns().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(file.number_of_rows(), 5);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = file()
            .with_column(
                column("short", SourceKind::Long),
                ColumnVector::Long(vec![1]),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ScanError::BatchLayout { .. }));
    }

    #[test]
    fn pulls_are_counted_including_the_final_empty_one() {
        let file = file();
        let mut rows = file.create_row_reader(&RowReaderOptions::include(vec![1])).unwrap();
        let mut batch = rows.create_row_batch(2);
        let mut sizes = Vec::new();
        while rows.next(&mut batch).unwrap() {
            sizes.push(batch.num_rows);
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(file.pulls(), 4);
        assert_eq!(rows.selected_columns()[0].name, "name");
    }

    #[test]
    fn seek_repositions_the_cursor() {
        let file = file();
        let mut rows = file.create_row_reader(&RowReaderOptions::all()).unwrap();
        let mut batch = rows.create_row_batch(10);
        assert!(rows.next(&mut batch).unwrap());
        assert!(!rows.next(&mut batch).unwrap());
        rows.seek_to_row(3).unwrap();
        assert!(rows.next(&mut batch).unwrap());
        assert_eq!(batch.num_rows, 2);
        assert_eq!(batch.fields[0].values, ColumnVector::Long(vec![4, 5]));
    }
}
