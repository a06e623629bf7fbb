//! Unique replica checker CLI entrypoint.
//!
//! - `urc check` - audit an RSE for files with no other available replica
//! - `urc report` - summarize a saved report and re-derive its CSV

#![forbid(unsafe_code)]

mod check;
mod report;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Find files whose only available Rucio replica sits at one RSE.
#[derive(Parser)]
#[command(name = "urc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an RSE for unique replicas.
    ///
    /// Lists every dataset at the RSE, looks up the replicas of each of its
    /// files, and records the files that are available nowhere else. Results
    /// go to a JSON report with a CSV next to it.
    ///
    /// Example: urc check --rse CERN-PROD --workers 10 --rate-limit 50
    Check(check::CheckArgs),

    /// Summarize a saved report.
    ///
    /// Example: urc report --input unique_replicas.json --csv flat.csv
    Report(report::ReportArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check(args) => check::run(args).await,
        Commands::Report(args) => report::run(&args).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
