//! `urc report` command implementation.
//!
//! # Usage
//!
//! ```text
//! # Human-readable summary
//! urc report --input unique_replicas.json
//!
//! # JSON summary, plus a fresh CSV
//! urc report --input unique_replicas.json --json --csv unique.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use urc_audit::{ReportSummary, load_report, write_csv};

/// Arguments for the `urc report` command.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report written by `urc check`.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Write the flat `scope,name` CSV to this path.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Output JSON instead of human-readable format.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Run the report command.
pub fn run(args: &ReportArgs) -> Result<()> {
    let report = load_report(&args.input)
        .with_context(|| format!("reading report {}", args.input.display()))?;
    let summary = report.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_human_readable(&summary);
    }

    if let Some(path) = &args.csv {
        write_csv(path, &report).with_context(|| format!("writing {}", path.display()))?;
        eprintln!("CSV written to {}", path.display());
    }

    Ok(())
}

fn print_human_readable(summary: &ReportSummary) {
    let stats = &summary.statistics;
    println!("Unique Replica Report");
    println!("=====================");
    println!("RSE:                {}", summary.rse);
    println!("Timestamp:          {}", summary.timestamp.to_rfc3339());
    println!();
    println!("Datasets found:     {}", stats.datasets_found);
    println!("Datasets processed: {}", stats.datasets_processed);
    println!("Files checked:      {}", stats.files_checked);
    println!("Unique files found: {}", stats.unique_files_found);
    println!("Errors:             {}", stats.errors);
    println!("Skipped:            {}", stats.skipped);
    println!();
    println!(
        "Found {} unique files across {} scopes",
        summary.total,
        summary.scopes.len()
    );
    if !summary.scopes.is_empty() {
        println!();
        println!("Unique files by scope:");
        for scope in &summary.scopes {
            println!("  {}: {} files", scope.scope, scope.files);
        }
    }
}
