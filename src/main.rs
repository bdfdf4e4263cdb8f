use anyhow::Context;
use clap::Parser;
use peepshot::{setup_logging, Cli, CliRunner, RunOutcome};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Logging follows the merged config, so `"verbose": true` in a config
    // file counts as much as `--verbose`.
    let runner = match CliRunner::new(&args).await.context("invalid configuration") {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = setup_logging(runner.config.verbose) {
        eprintln!("Failed to initialise logging: {e}");
    }

    info!("Starting peepshot v{}", env!("CARGO_PKG_VERSION"));

    match run(&runner).await {
        Ok(outcome) => {
            match &outcome {
                RunOutcome::Completed { records, report } => {
                    println!("Captured {} targets, report: {}", records.len(), report.display());
                }
                RunOutcome::Interrupted { records, report } => {
                    eprintln!(
                        "Interrupted: wrote partial report with {} targets to {}",
                        records.len(),
                        report.display()
                    );
                }
            }
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(runner: &CliRunner) -> anyhow::Result<RunOutcome> {
    let outcome = runner.run().await.context("scan failed")?;
    Ok(outcome)
}
