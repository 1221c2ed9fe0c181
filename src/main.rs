//! CLI: evaluate one oblivious band-join query over a directory of CSVs.

use clap::Parser;
use oblijoin::{execute, io};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Data-oblivious multi-way band-join engine.
#[derive(Parser)]
#[command(name = "oblijoin", version, about)]
struct Cli {
    /// SQL query file (SELECT * with equi-/band-join predicates).
    query_file: PathBuf,
    /// Directory of input tables; each *.csv stem is a table name.
    input_dir: PathBuf,
    /// Output CSV for the join result.
    output_file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(rows) => {
            println!("Result: {rows} rows");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("oblijoin: [{}] {err}", err.kind());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<usize, oblijoin::ObliviousJoinError> {
    let sql = std::fs::read_to_string(&cli.query_file)
        .map_err(|e| oblijoin::ObliviousJoinError::io(cli.query_file.display().to_string(), e))?;
    let tables = io::load_dir(&cli.input_dir)?;
    let result = execute(&sql, &tables)?;
    io::save_csv(&result, &cli.output_file)?;
    Ok(result.len())
}
