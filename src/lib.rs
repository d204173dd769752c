pub mod api;
pub mod catalog;
pub mod cli;
pub mod decimal;
pub mod error;
pub mod options;
pub mod projection;
pub mod reader;
pub mod scan;
pub mod schema_sql;
pub mod table;
pub mod types;
pub mod value;

use std::{collections::BTreeMap, env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde_json::json;

use crate::{
    api::Fetch,
    cli::{Cli, Commands, OutputFormat},
    options::{FILENAME_OPTION, ScanOptions, TableDefinition},
    projection::{NameMatch, RequiredColumn},
    schema_sql::{ImportRequest, TableFilter},
    value::RowValues,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("colscan", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Describe(args) => handle_describe(&args),
        Commands::Import(args) => handle_import(&args),
        Commands::Scan(args) => handle_scan(&args),
    }
}

fn handle_describe(args: &cli::DescribeArgs) -> Result<()> {
    info!("Describing '{}'", args.input.display());
    let columns = api::describe_columns(&args.input)
        .with_context(|| format!("Reading columns from {:?}", args.input))?;
    match args.format {
        OutputFormat::Table => {
            let headers = ["#", "name", "type", "size", "nullable", "accessor"]
                .map(String::from)
                .to_vec();
            let rows = columns
                .iter()
                .map(|column| {
                    vec![
                        column.index.to_string(),
                        column.name.clone(),
                        column.natural_type().to_string(),
                        column.size.to_string(),
                        column.has_null.to_string(),
                        format!("{:?}", column.accessor),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
        OutputFormat::Json => {
            let rendered =
                serde_json::to_string_pretty(&columns).context("Serializing columns to JSON")?;
            println!("{rendered}");
        }
    }
    if let Some(path) = &args.emit_definition {
        let definition = TableDefinition {
            table: default_table_name(&args.input).unwrap_or_else(|| "table".to_string()),
            schema: None,
            options: BTreeMap::from([(
                FILENAME_OPTION.to_string(),
                args.input.to_string_lossy().into_owned(),
            )]),
            columns: columns
                .iter()
                .map(|column| RequiredColumn::new(column.name.clone(), column.natural_type()))
                .collect(),
            scan: ScanOptions::default(),
        };
        definition
            .save(path)
            .with_context(|| format!("Writing table definition to {path:?}"))?;
        info!(
            "Table definition for {} column(s) written to {:?}",
            definition.columns.len(),
            path
        );
    }
    Ok(())
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    info!(
        "Importing schema '{}' from '{}'",
        args.schema,
        args.dir.display()
    );
    let filter = if !args.limit_to.is_empty() {
        TableFilter::LimitTo(args.limit_to.clone())
    } else if !args.except.is_empty() {
        TableFilter::Except(args.except.clone())
    } else {
        TableFilter::All
    };
    let request = ImportRequest {
        filter,
        snake_case_tables: args.snake_case,
        ..ImportRequest::new(&args.dir, &args.schema, &args.server)
    };
    let statements = schema_sql::import_schema(&request)
        .with_context(|| format!("Importing schema from {:?}", args.dir))?;
    for statement in &statements {
        println!("{statement}");
    }
    Ok(())
}

fn handle_scan(args: &cli::ScanArgs) -> Result<()> {
    let (path, mut required, mut options) = match &args.table {
        Some(table_path) => {
            let definition = TableDefinition::load(table_path)
                .with_context(|| format!("Loading table definition from {table_path:?}"))?;
            let base = table_path.parent();
            let table_options = definition
                .table_options(base)
                .with_context(|| format!("Validating options of table '{}'", definition.table))?;
            (table_options.filename, definition.columns, definition.scan)
        }
        None => {
            let input = args
                .input
                .clone()
                .ok_or_else(|| anyhow!("either --input or --table is required"))?;
            (input, Vec::new(), ScanOptions::default())
        }
    };
    if !args.columns.is_empty() {
        required = args.columns.clone();
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if args.case_insensitive {
        options.name_match = NameMatch::CaseInsensitive;
    }
    if args.no_prune {
        options.prune_columns = false;
    }
    debug!("Scan options: {options:?}");
    debug!("Required columns: {required:?}");

    let mut handle = api::open_scan_with(&path, &required, &options)
        .with_context(|| format!("Opening scan of {path:?}"))?;
    if args.explain {
        println!("Reader columns: {}", handle.explain_columns());
    }
    let headers = output_headers(&required, handle.state());

    let mut passes = vec![collect_rows(&mut handle, args.limit)?];
    if args.rescan {
        api::rescan(&mut handle).context("Rescanning")?;
        passes.push(collect_rows(&mut handle, args.limit)?);
    }
    let returned: usize = passes.iter().map(Vec::len).sum();
    let batches = handle.state().batches_pulled();
    api::close_scan(handle);

    for rows in &passes {
        emit_rows(args.format, &headers, rows)?;
    }
    info!(
        "Scanned {} row(s) from {:?} in {} batch(es)",
        returned, path, batches
    );
    Ok(())
}

fn output_headers(required: &[RequiredColumn], state: &scan::ScanState) -> Vec<String> {
    if required.is_empty() {
        state.catalog().names().map(str::to_string).collect()
    } else {
        required.iter().map(|column| column.name.clone()).collect()
    }
}

fn collect_rows(handle: &mut api::ScanHandle, limit: Option<usize>) -> Result<Vec<RowValues>> {
    let mut rows = Vec::new();
    while limit.is_none_or(|limit| rows.len() < limit) {
        match api::fetch_row(handle).context("Fetching row")? {
            Fetch::Row(row) => rows.push(row),
            Fetch::EndOfData => break,
        }
    }
    Ok(rows)
}

fn emit_rows(format: OutputFormat, headers: &[String], rows: &[RowValues]) -> Result<()> {
    match format {
        OutputFormat::Table => table::print_rows(headers, rows),
        OutputFormat::Json => {
            for row in rows {
                let object = headers
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        let value = cell.as_ref().map(|datum| datum.to_json()).unwrap_or(json!(null));
                        (name.clone(), value)
                    })
                    .collect::<serde_json::Map<_, _>>();
                let line = serde_json::to_string(&object).context("Serializing row to JSON")?;
                println!("{line}");
            }
        }
    }
    Ok(())
}

/// Table name a data file at `path` is imported under.
pub fn default_table_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| schema_sql::table_name(&name.to_string_lossy()).to_string())
}
