use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reconciler_core::reporter::StdoutReporter;
use reconciler_core::EngineOptions;

#[derive(Parser, Debug)]
#[command(name = "reconciler", version)]
#[command(about = "Reconciles a configuration-as-code project against one or more live environments")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the project's configs against the manifest's environments.
    Deploy {
        /// Root directory containing manifest.yaml and the project directories.
        #[arg(long, default_value = ".")]
        manifest: PathBuf,

        /// Environment to deploy (repeatable). Omit to deploy every environment in the manifest.
        #[arg(long = "environment")]
        environments: Vec<String>,

        /// Keep deploying independent configs after one fails instead of halting the run.
        #[arg(long)]
        continue_on_error: bool,

        /// Maximum number of in-flight HTTP requests per environment. 0 means unbounded.
        #[arg(long, default_value_t = 8)]
        concurrent_requests: i64,

        /// Where to write the JSONL deployment report. Defaults to <manifest>/deployment-report.jsonl.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the engine ran but at least one environment
/// reported deployment errors, so `main` can exit non-zero without treating
/// a partial failure as a hard error.
fn run(cli: Cli) -> Result<bool> {
    let Commands::Deploy {
        manifest,
        environments,
        continue_on_error,
        concurrent_requests,
        report,
    } = cli.cmd;

    let options = EngineOptions {
        concurrent_requests,
        continue_on_error,
        report_path: report,
        environments,
    };

    let reporter = StdoutReporter::new();
    let results = reconciler_core::deploy(&manifest, &options, &reporter)?;

    Ok(results.values().all(|errors| errors.is_empty()))
}
