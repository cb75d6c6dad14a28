//! Contract Renewal: runs the auto-renewal sweep over a JSON line store and
//! reports line states.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use contract_core::config::AppConfig;
use contract_lines::permissions::permissions_for;
use contract_lines::{
    resolve_state, Clock, Domain, EngineSettings, FixedClock, LineEngine, LineStore, MemoryStore,
    RenewalJob, SystemClock,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "contract-renewal")]
#[command(about = "Contract line lifecycle and auto-renewal")]
#[command(version)]
struct Cli {
    /// Config file (overrides CONTRACT_RENEWAL_CONFIG)
    #[arg(long)]
    config: Option<String>,

    /// Line store JSON file (overrides config)
    #[arg(long, env = "CONTRACT_RENEWAL__STORE__PATH")]
    store: Option<String>,

    /// Evaluate as of this date instead of the system date
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Renew by planning a successor line instead of extending in place
    #[arg(long, default_value_t = false)]
    create_new_line_on_renew: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Renew every auto-renew line whose termination notice date has passed
    RenewDueLines,

    /// Run the renewal sweep on the configured interval until interrupted
    Schedule {
        /// Seconds between sweeps (overrides config)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Print the state and allowed transitions of every line
    States,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "contract_renewal=info,contract_lines=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let (mut config, load_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(config.logging.json);
    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    if let Some(path) = cli.store.clone() {
        config.store.path = path;
    }
    if cli.create_new_line_on_renew {
        config.renewal.create_new_line_on_renew = true;
    }
    config.validate().context("invalid configuration")?;

    let clock: Arc<dyn Clock> = match cli.today {
        Some(today) => Arc::new(FixedClock(today)),
        None => Arc::new(SystemClock),
    };

    info!(
        store = %config.store.path,
        today = %clock.today(),
        create_new_line_on_renew = config.renewal.create_new_line_on_renew,
        "Contract renewal starting up"
    );

    let store = Arc::new(
        MemoryStore::load_json(&config.store.path)
            .with_context(|| format!("loading line store {}", config.store.path))?,
    );
    let engine = Arc::new(
        LineEngine::new(store.clone(), EngineSettings::from(&config)).with_clock(clock.clone()),
    );

    match cli.command {
        Commands::RenewDueLines => {
            sweep(&engine, &store, &config.store.path)?;
        }
        Commands::Schedule { interval_secs } => {
            let secs = interval_secs.unwrap_or(config.schedule.interval_secs).max(1);
            info!(interval_secs = secs, "Renewal schedule started");
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = sweep(&engine, &store, &config.store.path) {
                            error!(error = %e, "Renewal sweep failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Renewal schedule stopped");
                        break;
                    }
                }
            }
        }
        Commands::States => {
            let today = clock.today();
            for line in store.find(&Domain::True).context("listing lines")? {
                let terminated = store
                    .contract(line.contract_id)?
                    .is_some_and(|c| c.is_terminated);
                let row = serde_json::json!({
                    "id": line.id,
                    "contract_id": line.contract_id,
                    "name": line.name,
                    "date_start": line.date_start,
                    "date_end": line.date_end,
                    "state": resolve_state(&line, today),
                    "permissions": permissions_for(&line, terminated, today),
                });
                println!("{row}");
            }
        }
    }

    Ok(())
}

/// One renewal pass, persisted when anything changed.
fn sweep(engine: &Arc<LineEngine>, store: &MemoryStore, path: &str) -> anyhow::Result<()> {
    let report = RenewalJob::new(engine.clone())
        .run(engine.today())
        .context("running renewal sweep")?;
    if !report.renewed.is_empty() {
        store
            .save_json(path)
            .with_context(|| format!("saving line store {path}"))?;
    }
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
