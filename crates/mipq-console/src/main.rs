//! mipq console: run a multi-inequality query over a JSON Lines dataset.

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use mipq_core::api::{MipQuery, Query, QueryConfig};
use mipq_core::encoding::json::expr_from_json;
use serde_json::Value;

mod display;
mod loader;

use display::OutputMode;

/// mipq console. Loads a schema and a dataset into an in-memory backend and
/// runs a query with inequality filters on any number of properties.
#[derive(Parser, Debug)]
#[command(name = "mipq", version)]
struct Cli {
    /// JSON file with one model schema or an array of them.
    #[arg(long)]
    schema: PathBuf,

    /// JSON Lines file of records for the queried model.
    #[arg(long)]
    data: PathBuf,

    /// Model to query.
    #[arg(short, long)]
    model: String,

    /// Base query filter as a JSON expression (can be repeated).
    #[arg(short, long)]
    base: Vec<String>,

    /// Filter as a JSON expression (can be repeated).
    #[arg(short, long)]
    filter: Vec<String>,

    /// Output results as machine-parseable JSON.
    #[arg(short, long)]
    json: bool,

    /// Print how the filters are split between backend and residual
    /// evaluation instead of running the query.
    #[arg(long)]
    explain: bool,

    /// Fail on records missing a residually filtered property instead of
    /// skipping them.
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };

    if let Err(e) = run(&cli, &mode) {
        display::render_error(&e, &mode);
        process::exit(1);
    }
}

fn run(cli: &Cli, mode: &OutputMode) -> Result<(), Box<dyn Error>> {
    let backend = loader::load_backend(&cli.schema, &cli.data, &cli.model)?;

    let mut base = Query::new(cli.model.clone());
    for raw in &cli.base {
        let json = parse_json_arg("--base", raw)?;
        base = base.filter(expr_from_json(&json, &cli.model, &backend)?);
    }
    let filters = cli
        .filter
        .iter()
        .map(|raw| parse_json_arg("--filter", raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = QueryConfig {
        skip_null_comparisons: !cli.strict,
        ..QueryConfig::default()
    };
    let query = MipQuery::new(&backend, base)
        .with_config(config)
        .filter_json(&filters)?;

    if cli.explain {
        display::render_plan(&query.plan(), mode);
        return Ok(());
    }

    let mut stream = query.iter()?;
    let records = stream
        .by_ref()
        .collect::<mipq_core::error::Result<Vec<_>>>()?;
    display::render_records(&records, stream.skipped(), mode);
    Ok(())
}

fn parse_json_arg(flag: &str, raw: &str) -> Result<Value, Box<dyn Error>> {
    serde_json::from_str(raw).map_err(|e| format!("{flag} is not valid JSON: {e}").into())
}
