//! Reconciliation scanner CLI.
//!
//! Exit code 0 even when individual documents failed — per-document
//! failures are data in the audit report, not process errors. Non-zero
//! exit only when the registry cannot be loaded or the ledger is
//! unreachable at startup.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vatfix::core::EngineError;
use vatfix::ledger::{JsonRpcConfig, JsonRpcLedger};
use vatfix::registry::Registry;
use vatfix::scanner::{CandidateQuery, ReconciliationScanner, ScanOptions};

#[derive(Debug, Parser)]
#[command(name = "vatfix-scan", about = "Scan ledger documents and correct their VAT classification")]
struct Cli {
    /// Report what would change without issuing any mutating call.
    #[arg(long)]
    dry_run: bool,

    /// Cap the candidate set before processing begins.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Candidate fetch page size.
    #[arg(long, default_value_t = 80)]
    batch_size: u32,

    /// Minimum pause before each mutating call, in milliseconds.
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Worker threads (1 = sequential).
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Registry JSON file. Omit to load the registry from the ledger.
    #[arg(long, value_name = "PATH")]
    registry: Option<PathBuf>,

    /// Write the audit report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Document number prefix filter, e.g. "VDE".
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Earliest document date to include (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    date_from: Option<NaiveDate>,

    /// Latest document date to include (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    date_to: Option<NaiveDate>,

    /// Ledger base URL.
    #[arg(long, env = "VATFIX_LEDGER_URL")]
    url: String,

    /// Ledger database name.
    #[arg(long, env = "VATFIX_LEDGER_DB")]
    database: String,

    /// Ledger login.
    #[arg(long, env = "VATFIX_LEDGER_LOGIN")]
    login: String,

    /// Ledger API key.
    #[arg(long, env = "VATFIX_LEDGER_API_KEY", hide_env_values = true)]
    api_key: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EngineError> {
    let client = JsonRpcLedger::connect(JsonRpcConfig::new(
        &cli.url,
        &cli.database,
        &cli.login,
        &cli.api_key,
    ))?;

    let registry = match &cli.registry {
        Some(path) => Registry::load_file(path)?,
        None => Registry::load_from_ledger(&client)?,
    };
    tracing::info!(codes = registry.len(), "registry loaded");

    let query = CandidateQuery {
        name_prefix: cli.prefix.clone(),
        date_from: cli.date_from,
        date_to: cli.date_to,
        ..CandidateQuery::default()
    };
    let options = ScanOptions {
        dry_run: cli.dry_run,
        limit: cli.limit,
        batch_size: cli.batch_size,
        mutation_delay: Duration::from_millis(cli.delay_ms),
        concurrency: cli.concurrency.max(1),
        ..ScanOptions::default()
    };

    let report = ReconciliationScanner::new(&client, &registry).run(&query, &options)?;
    println!("{report}");

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "audit report written");
    }

    // Per-document failures are surfaced in the report, not the exit code.
    if report.error_count() > 0 {
        tracing::warn!(errors = report.error_count(), "some documents failed; see report");
    }
    Ok(())
}
