use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::loader::LoadMode;

#[derive(Debug, Parser)]
#[command(author, version, about = "Copy values between spreadsheet tables using mapping plans", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a workbook and print its tables
    Inspect(InspectArgs),
    /// Check every rule of a mapping plan against the given workbooks
    Validate(ValidateArgs),
    /// Execute a mapping plan and write the updated target tables
    Map(MapArgs),
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// How workbooks are read (auto detects multi-sheet reports)
    #[arg(long, value_enum, default_value = "auto")]
    pub mode: LoadMode,
    /// Maximum data rows kept per table
    #[arg(long = "max-rows")]
    pub max_rows: Option<usize>,
    /// Maximum workbook size in megabytes
    #[arg(long = "max-size-mb")]
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Workbook to load
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub load: LoadArgs,
    /// Rows shown per table
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
    /// Only show the sheet whose name contains this text
    #[arg(long)]
    pub sheet: Option<String>,
    /// Show inferred column types instead of rows
    #[arg(long)]
    pub types: bool,
    /// Stack every table into one, tagging rows with their origin
    #[arg(long)]
    pub combine: bool,
    /// Search text cells of every table for this term (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
    /// Column whose value is reported beside each search hit
    #[arg(long = "target-column", requires = "search")]
    pub target_column: Option<String>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Mapping plan file (.json, .yaml or .yml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Source workbooks
    #[arg(short = 's', long = "source", required = true, action = clap::ArgAction::Append)]
    pub sources: Vec<PathBuf>,
    /// Target workbooks
    #[arg(short = 't', long = "target", required = true, action = clap::ArgAction::Append)]
    pub targets: Vec<PathBuf>,
    #[command(flatten)]
    pub load: LoadArgs,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    /// Mapping plan file (.json, .yaml or .yml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Source workbooks
    #[arg(short = 's', long = "source", required = true, action = clap::ArgAction::Append)]
    pub sources: Vec<PathBuf>,
    /// Target workbooks
    #[arg(short = 't', long = "target", required = true, action = clap::ArgAction::Append)]
    pub targets: Vec<PathBuf>,
    /// Directory receiving one workbook per target table
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,
    #[command(flatten)]
    pub load: LoadArgs,
    /// Exit non-zero when any rule fails
    #[arg(long)]
    pub strict: bool,
}
