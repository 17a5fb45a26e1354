pub mod cli;
pub mod coordinate;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod loader;
pub mod observer;
pub mod plan;
pub mod process;
pub mod table;
pub mod table_set;
pub mod writer;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    table::{Table, render_table},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Validate(args) => process::validate(&args),
        Commands::Map(args) => process::map(&args),
    }
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let loader = process::loader_from_args(&args.load);
    let tables = loader
        .load(&args.input)
        .with_context(|| format!("Loading workbook {:?}", args.input))?;
    let summary = tables.summary();
    info!(
        "'{}': {} table(s), {} row(s), {} distinct column(s)",
        args.input.display(),
        summary.total_tables,
        summary.total_rows,
        summary.total_columns
    );

    if let Some(term) = &args.search {
        let hits = tables.search(term, args.target_column.as_deref());
        let headers = ["table", "row", "column", "match", "value"]
            .map(String::from)
            .to_vec();
        let rows = hits
            .iter()
            .map(|hit| {
                vec![
                    hit.table.clone(),
                    hit.row.to_string(),
                    hit.column.clone(),
                    hit.matched.as_display(),
                    data::display_cell(hit.target.as_ref()),
                ]
            })
            .collect::<Vec<_>>();
        print!("{}", render_table(&headers, &rows));
        println!("{} match(es) for '{term}'", hits.len());
        return Ok(());
    }

    if args.combine {
        print_table("combined", &tables.combined(), args);
        return Ok(());
    }

    if let Some(hint) = &args.sheet {
        let file_name = args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let table = tables
            .table_for_file(&file_name, Some(hint))
            .filter(|table| table.name().to_lowercase().contains(&hint.to_lowercase()))
            .ok_or_else(|| {
                anyhow!(
                    "No sheet matching '{hint}' in {file_name} (loaded: {})",
                    tables.keys().collect::<Vec<_>>().join(", ")
                )
            })?;
        print_table(table.name(), table, args);
        return Ok(());
    }

    for (key, table) in tables.iter() {
        print_table(key, table, args);
    }
    Ok(())
}

fn print_table(key: &str, table: &Table, args: &cli::InspectArgs) {
    println!(
        "== {key} ({} row(s) x {} column(s)) ==",
        table.row_count(),
        table.column_count()
    );
    if args.types {
        let headers = ["column", "type"].map(String::from).to_vec();
        let rows = table
            .infer_column_types()
            .into_iter()
            .map(|(name, kind)| vec![name, kind.to_string()])
            .collect::<Vec<_>>();
        print!("{}", render_table(&headers, &rows));
    } else {
        print!(
            "{}",
            render_table(&table.headers(), &table.display_rows(Some(args.limit)))
        );
    }
}
