//! costwatch - Cloud cost report and budget alerts

mod cli;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use costwatch_core::{
    CoreError, CostEngine, DedupStateStore, MemoryStateStore, Settings, SqliteStateStore,
};
use costwatch_types::PeriodKey;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "costwatch",
    version,
    about = "Cloud cost report with deduplicated budget alerts",
    long_about = "Aggregates one run's billing export into month-to-date, forecast, credits,\n\
                  week-over-week and per-service figures, flags cost anomalies, and raises\n\
                  budget threshold alerts at most once per level per month.\n\
                  \n\
                  Examples:\n\
                    costwatch report --input costs.json            # Daily report\n\
                    costwatch report --input costs.json --json     # Machine-readable output\n\
                    costwatch monitor --input costs.json --every 3600\n\
                    costwatch state show --period 2026-03\n\
                    costwatch state prune --before 2025-01\n\
                  \n\
                  Environment Variables:\n\
                    COSTWATCH_BUDGET_AMOUNT              # Monthly budget (required)\n\
                    COSTWATCH_BUDGET_THRESHOLDS          # Comma list, default 50,75,90,100\n\
                    COSTWATCH_ANOMALY_THRESHOLD_PERCENT  # Default 30\n\
                    COSTWATCH_STATE_DB                   # Alert state database path\n\
                    RUST_LOG                             # Log filter, overrides -v"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/costwatch/config.toml)
    #[arg(long, global = true, env = "COSTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, global = true, env = "COSTWATCH_NO_COLOR")]
    no_color: bool,
}

#[derive(Args, Clone)]
struct StateArgs {
    /// Alert state database (default: <data dir>/costwatch/state.db)
    #[arg(long)]
    state_db: Option<PathBuf>,

    /// Keep alert state in memory only; alerts are not deduplicated across runs
    #[arg(long, conflicts_with = "state_db")]
    no_state: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the cost report and evaluate all alerts
    Report {
        /// Cost data JSON file, or - for stdin
        #[arg(long, short)]
        input: PathBuf,

        /// Override the configured monthly budget
        #[arg(long)]
        budget: Option<Decimal>,

        #[command(flatten)]
        state: StateArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Archive the report under <dir>/reports/<date>.json
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },
    /// Check the ad-hoc budget limit periodically
    Monitor {
        /// Cost data JSON file, re-read on every check
        #[arg(long, short)]
        input: PathBuf,

        /// Override the configured monthly budget
        #[arg(long)]
        budget: Option<Decimal>,

        #[command(flatten)]
        state: StateArgs,

        /// Seconds between checks
        #[arg(long, default_value = "300")]
        every: u64,

        /// Check once and exit
        #[arg(long)]
        once: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or clean up stored alert state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show alert state per period
    Show {
        /// Only this period (YYYY-MM)
        #[arg(long, value_parser = PeriodKey::parse)]
        period: Option<PeriodKey>,

        #[arg(long)]
        state_db: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete alert state of periods before a month
    Prune {
        /// First period to keep (YYYY-MM)
        #[arg(long, value_parser = PeriodKey::parse)]
        before: PeriodKey,

        #[arg(long)]
        state_db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        if let Some(hint) = err.downcast_ref::<CoreError>().and_then(CoreError::suggestion) {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8, no_color: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let default_filter = format!("costwatch={0},costwatch_core={0}", level);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let no_color = cli.no_color;
    let config = cli.config;

    match cli.command {
        Command::Report {
            input,
            budget,
            state,
            json,
            archive_dir,
        } => run_report(config.as_deref(), &input, budget, &state, json, archive_dir, no_color),
        Command::Monitor {
            input,
            budget,
            state,
            every,
            once,
            json,
        } => {
            run_monitor(config.as_deref(), input, budget, &state, every, once, json, no_color)
                .await
        }
        Command::State { action } => run_state(config.as_deref(), action, no_color),
    }
}

fn load_settings(config: Option<&Path>, budget: Option<Decimal>) -> Result<Settings> {
    let mut settings = Settings::load(config)?;
    // CLI flags win over file and environment
    if budget.is_some() {
        settings.budget_amount = budget;
    }
    Ok(settings)
}

fn open_store(settings: &Settings, state: &StateArgs) -> Result<Arc<dyn DedupStateStore>> {
    if state.no_state {
        warn!("Alert state kept in memory only, alerts will repeat on the next run");
        return Ok(Arc::new(MemoryStateStore::new()));
    }

    let path = state
        .state_db
        .clone()
        .or_else(|| settings.state_db_path())
        .context("Could not determine alert state location, pass --state-db")?;
    let store = SqliteStateStore::open(&path)
        .with_context(|| format!("Failed to open alert state: {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_engine(settings: &Settings, state: &StateArgs) -> Result<CostEngine> {
    let budget = settings.budget_config()?;
    let store = open_store(settings, state)?;
    Ok(CostEngine::new(store, budget, settings.aggregation_config()))
}

fn run_report(
    config: Option<&Path>,
    input: &Path,
    budget: Option<Decimal>,
    state: &StateArgs,
    json: bool,
    archive_dir: Option<PathBuf>,
    no_color: bool,
) -> Result<()> {
    let settings = load_settings(config, budget)?;
    let engine = build_engine(&settings, state)?;
    let raw = cli::read_input(input)?;

    let evaluation = engine.evaluate(&raw)?;

    // Archival failure is reported, never fatal
    if let Some(dir) = archive_dir {
        match costwatch_core::write_report_json(&dir, &evaluation) {
            Ok(path) => info!(path = %path.display(), "Report archived"),
            Err(e) => warn!(error = %format!("{:#}", e), "Failed to archive report"),
        }
    }

    println!("{}", cli::format_report(&evaluation, json, no_color));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_monitor(
    config: Option<&Path>,
    input: PathBuf,
    budget: Option<Decimal>,
    state: &StateArgs,
    every: u64,
    once: bool,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let settings = load_settings(config, budget)?;
    let engine = Arc::new(build_engine(&settings, state)?);

    let mut interval = tokio::time::interval(Duration::from_secs(every.max(1)));
    info!(every_secs = every.max(1), input = %input.display(), "Monitor started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                check_once(&engine, &input, json, no_color).await?;
                if once {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Monitor stopped");
                return Ok(());
            }
        }
    }
}

/// One monitor tick. Unreadable input and transient state errors skip the tick.
async fn check_once(
    engine: &Arc<CostEngine>,
    input: &Path,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let raw = match cli::read_input(input) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Skipping check");
            return Ok(());
        }
    };

    let engine = Arc::clone(engine);
    let result = tokio::task::spawn_blocking(move || engine.monitor(&raw))
        .await
        .context("Monitor check panicked")?;

    match result {
        Ok(evaluation) => {
            if json {
                println!("{}", serde_json::to_string(&evaluation)?);
            } else if evaluation.has_alerts() {
                println!(
                    "{}",
                    cli::format_events(&evaluation.events, &evaluation.snapshot.currency, no_color)
                );
            }
            Ok(())
        }
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Alert state unavailable, skipping check");
            Ok(())
        }
        Err(CoreError::IncompleteInput { field, reason }) => {
            warn!(%field, %reason, "Incomplete cost data, skipping check");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_state(config: Option<&Path>, action: StateAction, no_color: bool) -> Result<()> {
    let settings = Settings::load(config)?;
    let open = |explicit: Option<PathBuf>| -> Result<SqliteStateStore> {
        let path = explicit
            .or_else(|| settings.state_db_path())
            .context("Could not determine alert state location, pass --state-db")?;
        if !path.exists() {
            bail!("No alert state database at {}", path.display());
        }
        SqliteStateStore::open(&path)
            .with_context(|| format!("Failed to open alert state: {}", path.display()))
    };

    match action {
        StateAction::Show {
            period,
            state_db,
            json,
        } => {
            let store = open(state_db)?;
            let periods = match period {
                Some(period) => vec![period],
                None => store.periods()?,
            };

            let mut states = Vec::with_capacity(periods.len());
            for period in &periods {
                if let Some(stored) = store.read(period)? {
                    states.push(stored);
                }
            }
            println!("{}", cli::format_state_table(&states, json, no_color));
        }
        StateAction::Prune { before, state_db } => {
            let store = open(state_db)?;
            let removed = store.prune_before(&before)?;
            let location = store
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "Removed alert state for {} period(s) before {} from {}",
                removed, before, location
            );
        }
    }

    Ok(())
}
