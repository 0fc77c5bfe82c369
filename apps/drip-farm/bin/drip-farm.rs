use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use core_logic::database::{ClaimLog, DatabaseManager};
use core_logic::error::StorageError;
use core_logic::{setup_logger, setup_quiet_logger, MetricsCollector, WorkerRunner};
use dotenv::dotenv;
use drip_farm::config::{FarmConfig, DEFAULT_CONFIG_PATH};
use drip_farm::report::{self, DEFAULT_LAST_ENTRIES};
use drip_farm::{DriverRegistry, ReqwestTransport, Scheduler, WalletBook};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Periodic faucet claimer", long_about = None)]
struct Args {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the claim loop (default)
    Run(RunArgs),
    /// Summarize the claim log
    Report {
        #[arg(short, long, default_value_t = DEFAULT_LAST_ENTRIES)]
        last: usize,
    },
    /// List registered drivers
    Drivers,
}

#[derive(ClapArgs, Debug, Default)]
struct RunArgs {
    /// Stop after this many ticks
    #[arg(short, long)]
    ticks: Option<u64>,
    /// Ask for wallets missing from config and environment
    #[arg(long)]
    prompt_wallets: bool,
    #[arg(short, long)]
    quiet: bool,
    /// Write a metrics snapshot (JSON) to this path while running
    #[arg(long)]
    export_metrics: Option<String>,
    #[arg(long, default_value_t = 60)]
    metrics_interval: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();

    match dispatch(args).await {
        Ok(code) => code,
        Err(e) => {
            // The logger may not be up yet, so go straight to stderr
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<StorageError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

async fn dispatch(args: Args) -> Result<ExitCode> {
    match args.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(run) => run_farm(&args.config, run).await,
        Commands::Report { last } => run_report(&args.config, last).await,
        Commands::Drivers => {
            for name in DriverRegistry::with_defaults().names() {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_farm(config_path: &str, run: RunArgs) -> Result<ExitCode> {
    let config = FarmConfig::from_path(config_path).context("Failed to load config")?;

    // Keep guard alive for file logging until main returns
    let _log_guard = if run.quiet {
        setup_quiet_logger();
        None
    } else {
        setup_logger(&config.logging.log_dir)
    };

    for warning in config.validate()? {
        warn!("{}", warning);
    }

    let faucets = config.enabled_faucets();
    if faucets.is_empty() {
        warn!("No faucets enabled in config. Exiting.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut wallets = WalletBook::new(config.wallets.clone());
    let overridden = wallets.apply_env();
    if overridden > 0 {
        info!("{} wallet(s) taken from environment", overridden);
    }
    if run.prompt_wallets {
        wallets.prompt_missing(&faucets)?;
    }

    let db = Arc::new(DatabaseManager::new(&config.logging.db_path).await?);
    let transport = Arc::new(ReqwestTransport::new(&config.effective_transport())?);

    let token = WorkerRunner::shutdown_token();
    let exporter = run
        .export_metrics
        .clone()
        .map(|path| spawn_metrics_export(path, run.metrics_interval, token.clone()));

    let mut scheduler = Scheduler::new(
        faucets,
        wallets,
        DriverRegistry::with_defaults(),
        transport,
        db.clone(),
    )
    .with_tick_period(config.tick_period());

    let outcome = scheduler.run(token.clone(), run.ticks).await;

    token.cancel();
    if let Some(handle) = exporter {
        let _ = handle.await;
    }
    let db_metrics = db.get_metrics();
    info!(
        "Claim log: {} insert(s), {} error(s) ({:.1}%), avg query {}ms",
        db_metrics.total_inserts,
        db_metrics.total_errors,
        db_metrics.error_rate(),
        db_metrics.avg_query_time_ms
    );
    db.close().await;

    let summary = outcome?;
    info!(
        "Stopped after {} tick(s), {} record(s){}",
        summary.ticks,
        summary.records,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

fn spawn_metrics_export(
    path: String,
    interval_secs: u64,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));
    tokio::spawn(async move {
        let metrics = MetricsCollector::global();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
            if let Err(e) = metrics.export_to_file(&path).await {
                warn!("Metrics export to {} failed: {}", path, e);
            }
        }
        // Final snapshot on shutdown
        if let Err(e) = metrics.export_to_file(&path).await {
            warn!("Metrics export to {} failed: {}", path, e);
        }
    })
}

async fn run_report(config_path: &str, last: usize) -> Result<ExitCode> {
    let db_path = if std::path::Path::new(config_path).exists() {
        FarmConfig::from_path(config_path)
            .context("Failed to load config")?
            .logging
            .db_path
    } else {
        FarmConfig::default().logging.db_path
    };

    let Some(db) = DatabaseManager::open_existing(&db_path).await? else {
        println!("[WARN] Log file not found: {}", db_path);
        return Ok(ExitCode::SUCCESS);
    };
    let rows = db.load_all().await?;
    if rows.is_empty() {
        println!("[INFO] No log entries found in {}", db_path);
        db.close().await;
        return Ok(ExitCode::SUCCESS);
    }
    let recent = db.recent(last).await?;
    db.close().await;

    print!("{}", report::render(&report::summarize(&rows), &recent, last));
    Ok(ExitCode::SUCCESS)
}
