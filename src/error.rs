use std::{fmt, io, path::PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::types::TargetType;

pub type ScanResult<T> = Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("could not open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parquet: {0}")]
    Parquet(#[from] ParquetError),
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
    #[error(
        "column '{column}' is declared as {declared} but the file maps it to {mapped}"
    )]
    TypeMismatch {
        column: String,
        declared: TargetType,
        mapped: TargetType,
    },
    #[error("no coercion path for column '{column}' from {from} to {to}")]
    NoCoercionPath {
        column: String,
        from: String,
        to: String,
    },
    #[error("no supported columns found in '{}'", path.display())]
    NoSupportedColumns { path: PathBuf },
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },
    #[error("cannot cast value in column '{column}': {reason}")]
    Cast { column: String, reason: String },
    #[error("batch column '{column}' holds {found} storage but {expected} was expected")]
    BatchLayout {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot {operation} a scan that is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },
    #[error("{0}")]
    TypeName(String),
}

/// Non-fatal conditions noticed while opening a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    UnsupportedFormatVersion { found: String, expected: String },
    LegacyDecimalScale { scale: u32 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::UnsupportedFormatVersion { found, expected } => write!(
                f,
                "file format version {found} differs from the supported version {expected}"
            ),
            Advisory::LegacyDecimalScale { scale } => write!(
                f,
                "reader lacks decimal scale metadata; decimals are rendered with scale {scale}"
            ),
        }
    }
}
