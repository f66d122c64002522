//! textcast — send one message to every contact over the enabled channels.
//!
//! Reads:
//! - `config/config.json` — channel credentials and enable flags
//! - `data/contacts.csv`  — `phone_number` and `phone_number@carrier` columns
//! - `data/messages.csv`  — `message` column; the first row is sent

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use textcast_core::config::{default_config_path, load_dotenv};
use textcast_core::{load_data, ConfigSnapshot, ConfigWatcher, SnapshotStore};
use textcast_notify::{Clock, Dispatcher, RecordingClock, TokioClock};

// ── CLI ─────────────────────────────────────────────────────────────

/// Multi-channel SMS dispatcher.
#[derive(Parser, Debug)]
#[command(name = "textcast", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, env = "TEXTCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Contacts CSV file.
    #[arg(long, env = "TEXTCAST_CONTACTS", default_value = "data/contacts.csv")]
    contacts: PathBuf,

    /// Messages CSV file.
    #[arg(long, env = "TEXTCAST_MESSAGES", default_value = "data/messages.csv")]
    messages: PathBuf,

    /// Watch the config file and hot-swap the snapshot while running.
    #[arg(long)]
    watch: bool,

    /// Log the dispatch plan without contacting any provider.
    #[arg(long)]
    dry_run: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let store = Arc::new(SnapshotStore::new(ConfigSnapshot::load(&config_path)?));
    store.current().log_summary();

    let _watcher = if cli.watch {
        Some(ConfigWatcher::spawn(Arc::clone(&store), config_path.clone())?)
    } else {
        None
    };

    let data = load_data(&cli.contacts, &cli.messages);
    let message = data.message();
    let recipients = data.recipients();

    // Pin the snapshot: a reload during the batch applies to the next run.
    let snapshot = store.current();
    let clock: Arc<dyn Clock> = if cli.dry_run {
        Arc::new(RecordingClock::new())
    } else {
        Arc::new(TokioClock)
    };
    let dispatcher = Dispatcher::from_snapshot(&snapshot, clock);

    if cli.dry_run {
        let plan = dispatcher.plan(&recipients);
        for planned in plan.iter() {
            info!(
                channel = %planned.channel,
                recipient = %planned.recipient.redacted(),
                "planned send"
            );
        }
        info!(attempts = plan.len(), "dry run complete");
        return Ok(());
    }

    let report = dispatcher.run_batch(&recipients, &message).await;
    println!(
        "attempts={} delivered={} rejected={} transient_failures={} invalid_addresses={}",
        report.total(),
        report.delivered,
        report.rejected,
        report.transient_failures,
        report.invalid_addresses
    );

    info!("textcast exited cleanly");
    Ok(())
}
