//! Host-facing scan entry points.
//!
//! These wrap [`ScanState`] in the call shape a relational host drives a
//! foreign scan with: open once, fetch rows until end of data, optionally
//! rescan, then close.

use std::path::Path;

use crate::{
    catalog::{ColumnCatalog, MappedColumn},
    error::ScanResult,
    options::ScanOptions,
    projection::RequiredColumn,
    reader::{ColumnarReader, ParquetReader},
    scan::ScanState,
    value::RowValues,
};

/// An open scan. Owned by exactly one caller at a time.
#[derive(Debug)]
pub struct ScanHandle {
    state: ScanState,
}

impl ScanHandle {
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn explain_columns(&self) -> String {
        self.state.explain_columns()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Row(RowValues),
    EndOfData,
}

pub fn open_scan(
    path: &Path,
    required: &[RequiredColumn],
    batch_size: usize,
) -> ScanResult<ScanHandle> {
    open_scan_with(path, required, &ScanOptions::with_batch_size(batch_size))
}

pub fn open_scan_with(
    path: &Path,
    required: &[RequiredColumn],
    options: &ScanOptions,
) -> ScanResult<ScanHandle> {
    let state = ScanState::begin(path, required, options)?;
    Ok(ScanHandle { state })
}

/// Wraps an already-begun scan, e.g. one over an in-memory reader.
pub fn handle_from_state(state: ScanState) -> ScanHandle {
    ScanHandle { state }
}

pub fn fetch_row(handle: &mut ScanHandle) -> ScanResult<Fetch> {
    Ok(match handle.state.next()? {
        Some(row) => Fetch::Row(row),
        None => Fetch::EndOfData,
    })
}

pub fn rescan(handle: &mut ScanHandle) -> ScanResult<()> {
    handle.state.rescan()
}

pub fn close_scan(mut handle: ScanHandle) {
    handle.state.end();
}

/// The scannable columns of the file at `path`, in file order.
pub fn describe_columns(path: &Path) -> ScanResult<Vec<MappedColumn>> {
    let reader = ParquetReader::open(path)?;
    Ok(ColumnCatalog::build(reader.columns()).into_columns())
}
