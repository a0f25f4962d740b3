//! filter_rows - keep the rows of a tab-delimited file that satisfy a condition.
//!
//! # Usage
//!
//! ```bash
//! filter_rows input.tsv output.tsv "(c2-c3) < 115487120 and c1=='chr7'"
//! ```
//!
//! Columns are referenced as `c1..cN`. Escaped tokens (`__gt__`, `__sq__`, ...)
//! submitted by web forms are accepted in place of operators and quotes.

use std::path::PathBuf;
use std::process::ExitCode;

use benchway::filtering::FilterError;
use clap::{error::ErrorKind, Parser};
use tracing_subscriber::EnvFilter;

/// Filter tab-delimited rows with a column condition
#[derive(Parser)]
#[command(name = "filter_rows")]
#[command(version)]
#[command(override_usage = "filter_rows input_file output_file condition")]
struct Cli {
    /// Tab-delimited input file
    input_file: PathBuf,
    /// File receiving the kept rows
    output_file: PathBuf,
    /// Condition over columns c1..cN, e.g. "c1=='chr7' and c3 > 100"
    #[arg(allow_hyphen_values = true)]
    condition: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            eprintln!("{}", FilterError::Usage);
            return ExitCode::FAILURE;
        }
    };
    init_tracing();

    match benchway::run_filter(&cli.input_file, &cli.output_file, &cli.condition) {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
