//! Batch scan state machine.
//!
//! A [`ScanState`] owns the open reader, the row reader pulling batches from
//! it, and the batch buffer rows are materialized from. Rows come out one at a
//! time from [`ScanState::next`]; a new batch is pulled only when the current
//! one is used up. The scan moves through `Positioned -> Exhausted -> Closed`,
//! and [`ScanState::rescan`] returns an open scan to its first row without
//! reopening the file.

use std::{fmt, path::Path};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    catalog::{AccessorKind, ColumnCatalog, MappedColumn, RejectedColumn},
    decimal::{RawDecimal, render},
    error::{Advisory, ScanError, ScanResult},
    options::ScanOptions,
    projection::{BuiltinCoercions, CoercionLookup, OutputColumn, RequiredColumn, resolve},
    reader::{
        ColumnBatch, ColumnVector, ColumnarReader, FieldVector, ParquetReader, RowReader,
        RowReaderOptions,
    },
    types::{TargetType, map_source_kind},
    value::{Datum, RowValues},
};

/// Phase of an open scan. A scan that has not been begun has no
/// [`ScanState`] at all; [`ScanState::begin`] either returns a positioned
/// scan or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Positioned,
    Exhausted,
    Closed,
}

impl ScanPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanPhase::Positioned => "positioned",
            ScanPhase::Exhausted => "exhausted",
            ScanPhase::Closed => "closed",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Fields drop in declaration order: batch, then row reader, then reader.
pub struct ScanState {
    batch: Option<ColumnBatch>,
    row_reader: Option<Box<dyn RowReader>>,
    reader: Option<Box<dyn ColumnarReader>>,
    catalog: ColumnCatalog,
    projection: Vec<Option<OutputColumn>>,
    batch_size: usize,
    /// `None` until the first batch is pulled.
    batch_rows: Option<usize>,
    batch_row: usize,
    row_num: u64,
    total_rows: u64,
    default_scale: u32,
    phase: ScanPhase,
    advisories: Vec<Advisory>,
    batches_pulled: usize,
}

impl fmt::Debug for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanState")
            .field("phase", &self.phase)
            .field("projection", &self.projection)
            .field("batch_size", &self.batch_size)
            .field("batch_rows", &self.batch_rows)
            .field("batch_row", &self.batch_row)
            .field("row_num", &self.row_num)
            .field("total_rows", &self.total_rows)
            .field("default_scale", &self.default_scale)
            .finish_non_exhaustive()
    }
}

impl ScanState {
    /// Opens the Parquet file at `path` and positions a scan before its first row.
    pub fn begin(
        path: &Path,
        required: &[RequiredColumn],
        options: &ScanOptions,
    ) -> ScanResult<Self> {
        let reader = ParquetReader::open(path)?;
        Self::begin_with_reader(Box::new(reader), required, options, &BuiltinCoercions)
    }

    pub fn begin_with_reader(
        reader: Box<dyn ColumnarReader>,
        required: &[RequiredColumn],
        options: &ScanOptions,
        coercions: &dyn CoercionLookup,
    ) -> ScanResult<Self> {
        options.validate()?;
        let mut advisories = Vec::new();
        let found = reader.format_version();
        let expected = reader.expected_format_version();
        if found != expected {
            let advisory = Advisory::UnsupportedFormatVersion {
                found: found.to_string(),
                expected: expected.to_string(),
            };
            warn!("{advisory}");
            advisories.push(advisory);
        }
        let default_scale = reader.default_decimal_scale();
        if default_scale > 0 {
            let advisory = Advisory::LegacyDecimalScale {
                scale: default_scale,
            };
            info!("{advisory}");
            advisories.push(advisory);
        }

        let row_options = include_list(reader.as_ref(), required, options);
        debug!("Row reader include list: {:?}", row_options.include);
        let row_reader = reader.create_row_reader(&row_options)?;
        let catalog = ColumnCatalog::build(row_reader.selected_columns());
        let projection = resolve(required, &catalog, options.name_match, coercions)?;
        let total_rows = reader.number_of_rows();
        let batch = row_reader.create_row_batch(options.batch_size);

        info!(
            "Opened scan of {} row(s) with {} output column(s), batch size {}",
            total_rows,
            projection.len(),
            options.batch_size
        );
        Ok(Self {
            batch: Some(batch),
            row_reader: Some(row_reader),
            reader: Some(reader),
            catalog,
            projection,
            batch_size: options.batch_size,
            batch_rows: None,
            batch_row: 0,
            row_num: 0,
            total_rows,
            default_scale,
            phase: ScanPhase::Positioned,
            advisories,
            batches_pulled: 0,
        })
    }

    /// Produces the next row, or `None` once the scan is exhausted.
    pub fn next(&mut self) -> ScanResult<Option<RowValues>> {
        match self.phase {
            ScanPhase::Positioned => {}
            ScanPhase::Exhausted => return Ok(None),
            ScanPhase::Closed => {
                return Err(ScanError::InvalidPhase {
                    operation: "fetch from",
                    phase: ScanPhase::Closed.as_str(),
                });
            }
        }
        if self.row_num >= self.total_rows {
            self.phase = ScanPhase::Exhausted;
            return Ok(None);
        }
        let needs_batch = self
            .batch_rows
            .is_none_or(|rows| self.batch_row >= rows);
        if needs_batch && !self.pull_batch()? {
            self.phase = ScanPhase::Exhausted;
            return Ok(None);
        }

        let batch = self.batch.as_ref().ok_or(ScanError::InvalidPhase {
            operation: "fetch from",
            phase: "missing its batch",
        })?;
        let row = materialize_row(
            &self.catalog,
            &self.projection,
            batch,
            self.batch_row,
            self.default_scale,
        )?;
        self.batch_row += 1;
        self.row_num += 1;
        Ok(Some(row))
    }

    fn pull_batch(&mut self) -> ScanResult<bool> {
        let (Some(row_reader), Some(batch)) = (self.row_reader.as_mut(), self.batch.as_mut())
        else {
            return Err(ScanError::InvalidPhase {
                operation: "fetch from",
                phase: "missing its row reader",
            });
        };
        let pulled = match row_reader.next(batch) {
            Ok(pulled) => pulled && batch.num_rows > 0,
            Err(err) => {
                warn!(
                    "Batch pull failed at row {} of {}; ending scan: {err}",
                    self.row_num, self.total_rows
                );
                false
            }
        };
        if pulled {
            self.batches_pulled += 1;
            self.batch_rows = Some(batch.num_rows);
            self.batch_row = 0;
            debug!(
                "Pulled batch {} with {} row(s)",
                self.batches_pulled, batch.num_rows
            );
        }
        Ok(pulled)
    }

    /// Returns an open scan to its first row.
    pub fn rescan(&mut self) -> ScanResult<()> {
        if !matches!(self.phase, ScanPhase::Positioned | ScanPhase::Exhausted) {
            return Err(ScanError::InvalidPhase {
                operation: "rescan",
                phase: self.phase.as_str(),
            });
        }
        self.batch = None;
        let row_reader = self.row_reader.as_mut().ok_or(ScanError::InvalidPhase {
            operation: "rescan",
            phase: "missing its row reader",
        })?;
        row_reader.seek_to_row(0)?;
        self.batch = Some(row_reader.create_row_batch(self.batch_size));
        self.batch_rows = None;
        self.batch_row = 0;
        self.row_num = 0;
        self.phase = ScanPhase::Positioned;
        debug!("Rescan positioned before row 0");
        Ok(())
    }

    /// Releases the batch, the row reader and the reader, in that order.
    pub fn end(&mut self) {
        if self.phase == ScanPhase::Closed {
            return;
        }
        drop(self.batch.take());
        drop(self.row_reader.take());
        drop(self.reader.take());
        info!(
            "Closed scan after {} row(s) in {} batch(es)",
            self.row_num, self.batches_pulled
        );
        self.phase = ScanPhase::Closed;
    }

    /// Comma-separated names of the columns the row reader reads.
    pub fn explain_columns(&self) -> String {
        self.row_reader
            .as_ref()
            .map(|row_reader| {
                row_reader
                    .selected_columns()
                    .iter()
                    .map(|column| column.name.as_str())
                    .join(", ")
            })
            .unwrap_or_default()
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    pub fn rejected(&self) -> &[RejectedColumn] {
        self.catalog.rejected()
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    pub fn projection(&self) -> &[Option<OutputColumn>] {
        &self.projection
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn rows_returned(&self) -> u64 {
        self.row_num
    }

    pub fn batches_pulled(&self) -> usize {
        self.batches_pulled
    }

    pub fn default_scale(&self) -> u32 {
        self.default_scale
    }
}

fn include_list(
    reader: &dyn ColumnarReader,
    required: &[RequiredColumn],
    options: &ScanOptions,
) -> RowReaderOptions {
    if !options.prune_columns || required.is_empty() {
        return RowReaderOptions::all();
    }
    let indices: Vec<usize> = reader
        .columns()
        .iter()
        .filter(|column| map_source_kind(column.kind).is_some())
        .filter(|column| {
            required
                .iter()
                .any(|wanted| options.name_match.matches(&column.name, &wanted.name))
        })
        .map(|column| column.index)
        .collect();
    if indices.is_empty() {
        RowReaderOptions::all()
    } else {
        RowReaderOptions::include(indices)
    }
}

fn materialize_row(
    catalog: &ColumnCatalog,
    projection: &[Option<OutputColumn>],
    batch: &ColumnBatch,
    row: usize,
    legacy_scale: u32,
) -> ScanResult<RowValues> {
    let mut values = Vec::with_capacity(projection.len());
    for slot in projection {
        let Some((column, cast)) =
            slot.and_then(|output| Some((catalog.get(output.position)?, output.cast)))
        else {
            values.push(None);
            continue;
        };
        let field = batch.field(column.index).ok_or_else(|| ScanError::BatchLayout {
            column: column.name.clone(),
            expected: storage_for(column.accessor),
            found: "no field",
        })?;
        if field.is_null(row) {
            values.push(None);
            continue;
        }
        let datum = materialize(column, field, row, legacy_scale)?;
        let datum = match &cast {
            Some(cast) => cast.apply(&column.name, datum)?,
            None => datum,
        };
        values.push(Some(datum));
    }
    Ok(values)
}

fn storage_for(accessor: AccessorKind) -> &'static str {
    match accessor {
        AccessorKind::Boolean | AccessorKind::Int16 | AccessorKind::Int32 | AccessorKind::Int64 => {
            "long"
        }
        AccessorKind::Date => "long",
        AccessorKind::Float32 | AccessorKind::Float64 => "double",
        AccessorKind::Decimal64 => "decimal64",
        AccessorKind::Decimal128 => "decimal128",
        AccessorKind::Timestamp => "timestamp",
        AccessorKind::VarBytes => "bytes",
    }
}

fn cell<T: Copy>(values: &[T], row: usize, column: &MappedColumn) -> ScanResult<T> {
    values.get(row).copied().ok_or_else(|| ScanError::BatchLayout {
        column: column.name.clone(),
        expected: "a value for every batch row",
        found: "a short column",
    })
}

fn materialize(
    column: &MappedColumn,
    field: &FieldVector,
    row: usize,
    legacy_scale: u32,
) -> ScanResult<Datum> {
    let datum = match (column.accessor, &field.values) {
        (AccessorKind::Boolean, ColumnVector::Long(values)) => {
            Datum::Bool(cell(values, row, column)? != 0)
        }
        (AccessorKind::Int16, ColumnVector::Long(values)) => {
            Datum::Int16(cell(values, row, column)? as i16)
        }
        (AccessorKind::Int32, ColumnVector::Long(values)) => {
            Datum::Int32(cell(values, row, column)? as i32)
        }
        (AccessorKind::Int64, ColumnVector::Long(values)) => Datum::Int64(cell(values, row, column)?),
        (AccessorKind::Float32, ColumnVector::Double(values)) => {
            Datum::Float32(cell(values, row, column)? as f32)
        }
        (AccessorKind::Float64, ColumnVector::Double(values)) => {
            Datum::Float64(cell(values, row, column)?)
        }
        (AccessorKind::Decimal64, ColumnVector::Decimal64(values)) => Datum::Numeric(render(
            RawDecimal::Narrow(cell(values, row, column)?),
            column.precision,
            column.scale,
            legacy_scale,
        )),
        (AccessorKind::Decimal128, ColumnVector::Decimal128(values)) => Datum::Numeric(render(
            RawDecimal::Wide(cell(values, row, column)?),
            column.precision,
            column.scale,
            legacy_scale,
        )),
        (AccessorKind::Date, ColumnVector::Long(values)) => {
            let days = cell(values, row, column)?;
            Datum::date_from_unix_days(days).ok_or_else(|| ScanError::Cast {
                column: column.name.clone(),
                reason: format!("day count {days} is outside the date range"),
            })?
        }
        (AccessorKind::Timestamp, ColumnVector::Timestamp { seconds, nanos }) => {
            let secs = cell(seconds, row, column)?;
            let nanos = cell(nanos, row, column)?;
            Datum::timestamp_from_unix(secs, nanos).ok_or_else(|| ScanError::Cast {
                column: column.name.clone(),
                reason: format!("timestamp {secs}s is outside the timestamp range"),
            })?
        }
        (AccessorKind::VarBytes, values @ ColumnVector::Bytes { .. }) => {
            let bytes = values
                .bytes_at(row)
                .ok_or_else(|| ScanError::BatchLayout {
                    column: column.name.clone(),
                    expected: "a value for every batch row",
                    found: "a short column",
                })?
                .to_vec();
            if column.target == TargetType::Bytea {
                Datum::Bytea(bytes)
            } else {
                Datum::Text(bytes)
            }
        }
        (accessor, other) => {
            return Err(ScanError::BatchLayout {
                column: column.name.clone(),
                expected: storage_for(accessor),
                found: other.storage_name(),
            });
        }
    };
    Ok(datum)
}
