//! OTS loss agent - per-core fiber loss report from an NFM-T instance
//!
//! Authenticates against the NFM-T REST gateway, runs the loss engine for
//! one LD type and exports the rows to `output_<unix-ts>.csv`.
//!
//! Usage:
//!   otsloss -u admin -p password -i 192.168.0.1 -l RA2P

mod config;
mod export;
mod nfmt;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use config::{AgentConfig, CliOverrides, PASSWORD_ENV};
use nfmt::NfmtClient;
use otsloss_core::{LossEngine, LossError, PmWindow, Report, TelemetryClient};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit status when no row could be computed
const EXIT_EMPTY_REPORT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "otsloss",
    version,
    about = "Compute per-core OTS fiber loss from NFM-T characteristics and PM data"
)]
struct Args {
    /// NFM-T address [default: 127.0.0.1]
    #[arg(short = 'i', long)]
    host: Option<String>,

    /// NFM-T username [default: admin]
    #[arg(short, long)]
    username: Option<String>,

    /// NFM-T password (falls back to OTSLOSS_PASSWORD, then the OS keyring)
    #[arg(short, long)]
    password: Option<String>,

    /// LD type token to select OTS connections [default: RA2P]
    #[arg(short = 'l', long)]
    ld_type: Option<String>,

    /// Directory receiving the CSV report [default: .]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// PM lookback in minutes, at most one week [default: 60]
    #[arg(
        long,
        value_parser = clap::value_parser!(i64).range(1..=PmWindow::MAX_LOOKBACK_MINUTES)
    )]
    lookback_minutes: Option<i64>,

    /// Config file [default: <config dir>/otsloss/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store the password in the OS keyring for later runs
    #[arg(long)]
    save_password: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.host.clone(),
            username: self.username.clone(),
            amplifier_type: self.ld_type.clone(),
            output_dir: self.output_dir.clone(),
            lookback_minutes: self.lookback_minutes,
        }
    }
}

async fn run(args: Args) -> Result<PathBuf> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => AgentConfig::config_file_path()?,
    };
    let mut config = AgentConfig::load_from(&config_path).await?;
    config.apply_overrides(args.overrides());
    config.validate()?;

    let password = config
        .resolve_password(args.password.clone(), std::env::var(PASSWORD_ENV).ok())
        .with_context(|| {
            format!(
                "no password for {}@{}: use -p, {} or --save-password",
                config.nfmt.username, config.nfmt.host, PASSWORD_ENV
            )
        })?;

    if args.save_password {
        config.remember_password(&password)?;
        config.save_to(&config_path).await?;
        info!("Password stored in the OS keyring, config saved to {}", config_path.display());
    }

    let window = PmWindow::lookback(Utc::now(), config.report.lookback_minutes)?;
    let client = NfmtClient::connect(&config.nfmt, &password, &config.report.granularity)
        .await
        .with_context(|| format!("Failed to connect to NFM-T at {}", config.nfmt.host))?;
    let client = Arc::new(client);

    let engine = LossEngine::new(
        Arc::clone(&client),
        config.report.amplifier_type.clone(),
        window,
    );
    let outcome = run_and_export(&engine, &config.report.output_dir).await;

    if let Err(e) = client.revoke().await {
        warn!("Token revocation on {} failed: {}", client.host(), e);
    }

    let (report, path) = outcome.with_context(|| format!("NFM-T {}", config.nfmt.host))?;
    info!("SUCCESS: Loss report file has been exported!");
    info!(
        "{} rows for {} OTS ({} skipped without PM data) written to {}",
        report.records.len(),
        report.selected,
        report.skipped.len(),
        path.display()
    );
    Ok(path)
}

/// Runs `engine` and writes the CSV under `output_dir`; nothing is written
/// when the run fails
async fn run_and_export<C: TelemetryClient>(
    engine: &LossEngine<C>,
    output_dir: &Path,
) -> Result<(Report, PathBuf)> {
    let report = engine
        .run()
        .await
        .with_context(|| format!("Loss run for LD type {} failed", engine.ld_type()))?;
    let path = export::export_report(output_dir, &report.records, Utc::now())?;
    Ok((report, path))
}

/// Exit status and operator headline for a failed run
fn classify_failure(err: &anyhow::Error) -> (u8, &'static str) {
    match err.downcast_ref::<LossError>() {
        Some(LossError::EmptyReport { .. }) => {
            (EXIT_EMPTY_REPORT, "error - no PM Data has been collected")
        }
        Some(loss) if loss.is_fatal_data() => (1, "NFM-T returned corrupt data"),
        Some(LossError::InvalidLookback(_)) => (1, "invalid settings"),
        Some(_) => (1, "NFM-T request failed"),
        None => (1, "run failed"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging unavailable: {}", e);
    }

    match run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let (status, headline) = classify_failure(&err);
            error!("{}: {:#}", headline, err);
            ExitCode::from(status)
        }
    }
}
