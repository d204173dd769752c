//! Scan tuning, table options and YAML table definitions.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ScanError, ScanResult},
    projection::{NameMatch, RequiredColumn},
};

pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const FILENAME_OPTION: &str = "filename";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub name_match: NameMatch,
    /// Read only the file columns the projection names.
    pub prune_columns: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            name_match: NameMatch::default(),
            prune_columns: true,
        }
    }
}

impl ScanOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.batch_size == 0 {
            return Err(ScanError::InvalidOption {
                name: "batch_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Validated options attached to a foreign table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub filename: PathBuf,
}

impl TableOptions {
    /// Validates `(name, value)` option pairs. `filename` is the only option;
    /// it is required and must name an existing file.
    pub fn from_pairs<I, K, V>(pairs: I) -> ScanResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filename = None;
        for (name, value) in pairs {
            let (name, value) = (name.as_ref(), value.as_ref());
            if !name.eq_ignore_ascii_case(FILENAME_OPTION) {
                return Err(ScanError::InvalidOption {
                    name: name.to_string(),
                    reason: format!("the only valid option is '{FILENAME_OPTION}'"),
                });
            }
            if filename.is_some() {
                return Err(ScanError::InvalidOption {
                    name: name.to_string(),
                    reason: "specified more than once".into(),
                });
            }
            let path = PathBuf::from(value);
            if let Err(err) = std::fs::metadata(&path) {
                return Err(ScanError::InvalidOption {
                    name: FILENAME_OPTION.into(),
                    reason: format!("{value}: {err}"),
                });
            }
            filename = Some(path);
        }
        let filename = filename.ok_or_else(|| ScanError::InvalidOption {
            name: FILENAME_OPTION.into(),
            reason: "option not specified for table".into(),
        })?;
        Ok(Self { filename })
    }
}

/// A hand-written or generated table description.
///
/// ```yaml
/// table: sales
/// options:
///   filename: data/sales.parquet
/// columns:
///   - name: id
///     type: int4
///   - name: amount
///     type: numeric(10,2)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<RequiredColumn>,
    #[serde(default)]
    pub scan: ScanOptions,
}

impl TableDefinition {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening table definition {path:?}"))?;
        let reader = BufReader::new(file);
        let definition: TableDefinition =
            serde_yaml::from_reader(reader).context("Parsing table definition YAML")?;
        Ok(definition)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating table definition {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing table definition YAML")
    }

    /// Validated table options. A relative `filename` is resolved against `base`.
    pub fn table_options(&self, base: Option<&Path>) -> ScanResult<TableOptions> {
        let pairs = self.options.iter().map(|(name, value)| {
            let value = match base {
                Some(base) if name.eq_ignore_ascii_case(FILENAME_OPTION) => {
                    base.join(value).to_string_lossy().into_owned()
                }
                _ => value.clone(),
            };
            (name.clone(), value)
        });
        TableOptions::from_pairs(pairs)
    }
}
