//! Foreign table DDL generation and directory schema import.
//!
//! Each data file in a directory becomes one `CREATE FOREIGN TABLE`
//! statement whose columns are the file's scannable columns. Statements are
//! returned to the caller to execute; nothing is run here.

use std::{
    fs,
    path::{Path, PathBuf},
};

use heck::ToSnakeCase;
use itertools::Itertools;
use log::{debug, info};

use crate::{
    catalog::{ColumnCatalog, MappedColumn},
    error::{ScanError, ScanResult},
    reader::{ColumnarReader, ParquetReader},
    types::TargetType,
};

pub const DATA_FILE_EXTENSION: &str = "parquet";

/// Which files of a directory an import covers, by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TableFilter {
    #[default]
    All,
    LimitTo(Vec<String>),
    Except(Vec<String>),
}

impl TableFilter {
    /// `stem` is the file name without its extension.
    pub fn includes(&self, stem: &str) -> bool {
        match self {
            TableFilter::All => true,
            TableFilter::LimitTo(tables) => tables.iter().any(|table| names_file(table, stem)),
            TableFilter::Except(tables) => !tables.iter().any(|table| names_file(table, stem)),
        }
    }
}

/// A listed table names a file when it starts with the file stem, ignoring
/// ASCII case.
fn names_file(table: &str, stem: &str) -> bool {
    let (table, stem) = (table.as_bytes(), stem.as_bytes());
    table.len() >= stem.len() && table[..stem.len()].eq_ignore_ascii_case(stem)
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub remote_dir: PathBuf,
    pub local_schema: String,
    pub server: String,
    pub filter: TableFilter,
    /// Convert table names to snake_case.
    pub snake_case_tables: bool,
}

impl ImportRequest {
    pub fn new(
        remote_dir: impl Into<PathBuf>,
        local_schema: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            remote_dir: remote_dir.into(),
            local_schema: local_schema.into(),
            server: server.into(),
            filter: TableFilter::All,
            snake_case_tables: false,
        }
    }
}

pub fn column_sql(column: &MappedColumn) -> String {
    let mut sql = format!("{} {}", column.name, column.target.host_name());
    if column.target == TargetType::Numeric && column.precision > 0 {
        sql.push_str(&format!("({}, {})", column.precision, column.scale));
    }
    let has_length = matches!(column.target, TargetType::Char | TargetType::Varchar);
    if has_length && column.max_length > 0 {
        sql.push_str(&format!(" ({})", column.max_length));
    }
    if !column.has_null {
        sql.push_str(" NOT");
    }
    sql.push_str(" NULL");
    sql
}

/// Table name for a data file: its name up to the first `.`.
pub fn table_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

pub fn create_table_sql(
    local_schema: &str,
    table: &str,
    server: &str,
    path: &Path,
    columns: &[MappedColumn],
) -> ScanResult<String> {
    if columns.is_empty() {
        return Err(ScanError::NoSupportedColumns {
            path: path.to_path_buf(),
        });
    }
    let path_literal = path.to_string_lossy().replace('\'', "''");
    Ok(format!(
        "CREATE FOREIGN TABLE {local_schema}.{table} ({}) SERVER {server} OPTIONS (FILENAME '{path_literal}');",
        columns.iter().map(column_sql).join(", ")
    ))
}

/// Statement for a single data file.
pub fn file_table_sql(request: &ImportRequest, file_name: &str) -> ScanResult<String> {
    let path = request.remote_dir.join(file_name);
    let reader = ParquetReader::open(&path)?;
    let columns = ColumnCatalog::build(reader.columns()).into_columns();
    let table = if request.snake_case_tables {
        table_name(file_name).to_snake_case()
    } else {
        table_name(file_name).to_string()
    };
    create_table_sql(&request.local_schema, &table, &request.server, &path, &columns)
}

/// One `CREATE FOREIGN TABLE` statement per matching data file, in file name order.
pub fn import_schema(request: &ImportRequest) -> ScanResult<Vec<String>> {
    let entries = fs::read_dir(&request.remote_dir).map_err(|source| ScanError::Open {
        path: request.remote_dir.clone(),
        source,
    })?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::Open {
            path: request.remote_dir.clone(),
            source,
        })?;
        let is_file = entry
            .file_type()
            .map(|file_type| file_type.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some((stem, extension)) = file_name.rsplit_once('.') else {
            continue;
        };
        if !extension.eq_ignore_ascii_case(DATA_FILE_EXTENSION) {
            continue;
        }
        if !request.filter.includes(stem) {
            continue;
        }
        candidates.push(file_name);
    }
    candidates.sort();

    let mut statements = Vec::with_capacity(candidates.len());
    for file_name in candidates {
        info!("Parquet file {file_name} found for schema import");
        let sql = file_table_sql(request, &file_name)?;
        debug!("Import SQL: {sql}");
        statements.push(sql);
    }
    if statements.is_empty() {
        info!(
            "No files processed. Did you specify the correct folder path with .{DATA_FILE_EXTENSION} files?"
        );
    } else {
        info!(
            "Schema read successfully from {} .{DATA_FILE_EXTENSION} file(s)",
            statements.len()
        );
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::SourceColumnInfo, types::SourceKind};

    fn columns() -> Vec<MappedColumn> {
        ColumnCatalog::build(&[
            SourceColumnInfo::new(0, "id", SourceKind::Long).with_has_null(false),
            SourceColumnInfo::new(1, "price", SourceKind::Decimal).with_decimal(10, 2),
            SourceColumnInfo::new(2, "code", SourceKind::Varchar).with_max_length(12),
            SourceColumnInfo::new(3, "tags", SourceKind::List),
            SourceColumnInfo::new(4, "seen", SourceKind::Timestamp),
        ])
        .into_columns()
    }

    #[test]
    fn renders_create_statement() {
        let sql = create_table_sql(
            "public",
            "sales",
            "parquet_srv",
            Path::new("/data/sales.parquet"),
            &columns(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE FOREIGN TABLE public.sales (id bigint NOT NULL, price numeric(10, 2) NULL, \
             code character varying (12) NULL, seen timestamp with time zone NULL) \
             SERVER parquet_srv OPTIONS (FILENAME '/data/sales.parquet');"
        );
    }

    #[test]
    fn only_character_types_carry_a_length() {
        let columns = ColumnCatalog::build(&[
            SourceColumnInfo::new(0, "h", SourceKind::Binary)
                .with_max_length(4)
                .with_has_null(false),
            SourceColumnInfo::new(1, "flag", SourceKind::Char).with_max_length(1),
        ])
        .into_columns();
        assert_eq!(column_sql(&columns[0]), "h bytea NOT NULL");
        assert_eq!(column_sql(&columns[1]), "flag character (1) NULL");
    }

    #[test]
    fn empty_column_list_is_an_error() {
        let err = create_table_sql("s", "t", "srv", Path::new("/x.parquet"), &[]).unwrap_err();
        assert!(matches!(err, ScanError::NoSupportedColumns { .. }));
    }

    #[test]
    fn quotes_in_paths_are_escaped() {
        let sql = create_table_sql("s", "t", "srv", Path::new("/o'neil.parquet"), &columns()).unwrap();
        assert!(sql.ends_with("FILENAME '/o''neil.parquet');"));
    }

    #[test]
    fn filters_match_table_names_by_stem_prefix() {
        let limit = TableFilter::LimitTo(vec!["Sales".into()]);
        assert!(limit.includes("sales"));
        assert!(limit.includes("sal"));
        assert!(!limit.includes("sales_2024"));
        assert!(!limit.includes("orders"));

        let except = TableFilter::Except(vec!["orders".into()]);
        assert!(except.includes("sales"));
        assert!(!except.includes("ORDERS"));
        assert!(TableFilter::All.includes("anything"));
    }

    #[test]
    fn table_name_stops_at_first_dot() {
        assert_eq!(table_name("sales.2024.parquet"), "sales");
        assert_eq!(table_name("plain"), "plain");
    }
}
