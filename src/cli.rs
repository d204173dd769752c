use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use crate::projection::RequiredColumn;

#[derive(Debug, Parser)]
#[command(author, version, about = "Scan columnar Parquet files into typed rows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the scannable columns of a Parquet file and their mapped types
    Describe(DescribeArgs),
    /// Generate CREATE FOREIGN TABLE statements for a directory of Parquet files
    Import(ImportArgs),
    /// Materialize rows from a Parquet file through the batch scan engine
    Scan(ScanArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Parquet file to inspect
    #[arg(short, long)]
    pub input: PathBuf,
    /// Output format for the column listing
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Write a YAML table definition covering every scannable column
    #[arg(long = "emit-definition")]
    pub emit_definition: Option<PathBuf>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("table_list").args(["limit_to", "except"])))]
pub struct ImportArgs {
    /// Directory containing .parquet files
    #[arg(short, long)]
    pub dir: PathBuf,
    /// Local schema the foreign tables are created in
    #[arg(short, long, default_value = "public")]
    pub schema: String,
    /// Foreign server name
    #[arg(long)]
    pub server: String,
    /// Only import these tables
    #[arg(long = "limit-to", value_delimiter = ',')]
    pub limit_to: Vec<String>,
    /// Import every table except these
    #[arg(long, value_delimiter = ',')]
    pub except: Vec<String>,
    /// Convert table names to snake_case
    #[arg(long = "snake-case")]
    pub snake_case: bool,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "table"])))]
pub struct ScanArgs {
    /// Parquet file to scan
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// YAML table definition naming the file and its columns
    #[arg(short, long)]
    pub table: Option<PathBuf>,
    /// Output column as name:type (repeatable), e.g. amount:numeric(10,2)
    #[arg(short = 'c', long = "column", action = clap::ArgAction::Append)]
    pub columns: Vec<RequiredColumn>,
    /// Rows per batch pulled from the file
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
    /// Match column names ignoring ASCII case
    #[arg(long = "case-insensitive")]
    pub case_insensitive: bool,
    /// Read every file column instead of only the requested ones
    #[arg(long = "no-prune")]
    pub no_prune: bool,
    /// Stop after this many rows
    #[arg(long)]
    pub limit: Option<usize>,
    /// Scan the file a second time through a rescan and print both passes
    #[arg(long)]
    pub rescan: bool,
    /// Print the columns the row reader reads
    #[arg(long)]
    pub explain: bool,
    /// Output format for rows
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
