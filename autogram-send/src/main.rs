//! autogram-send - Background daemon for automated Instagram publishing
//!
//! Generates posts for active schedules and publishes due posts through
//! the Instagram Graph API at the scheduled time.

use clap::Parser;
use libautogram::config::{Config, GenerationConfig, StorageConfig};
use libautogram::generator::{ContentGenerator, HttpGenerator, HttpImageStore};
use libautogram::publisher::GraphApiPublisher;
use libautogram::{Database, Orchestrator, Result, Scheduler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "autogram-send")]
#[command(version)]
#[command(about = "Background daemon for automated Instagram publishing")]
#[command(long_about = "\
autogram-send - Background daemon for automated Instagram publishing

DESCRIPTION:
    autogram-send is a long-running daemon that monitors the Autogram queue
    and automatically publishes scheduled posts through the Instagram Graph
    API at the right time.

    It polls the database at regular intervals, claims posts that are due,
    drives each one through container creation and publishing, retries
    failures up to the configured budget, and records the final media id.

    With [generation] and [storage] configured it also materializes
    upcoming posts for active schedules, generating captions and slide
    images automatically.

USAGE:
    # Run in foreground (logs to stderr)
    autogram-send

    # Run with custom poll interval
    autogram-send --poll-interval 30

    # Enable verbose logging
    autogram-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes current post)

CONFIGURATION:
    Configuration file: ~/.config/autogram/config.toml
    Database location: ~/.local/share/autogram/autogram.db

    [publisher]
    max_retries = 3        # attempts before a post is marked failed
    inter_post_delay_secs = 5

    [scheduler]
    poll_interval_secs = 60
    stale_claim_secs = 600

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: from config)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Run one generation pass and one publish tick, then exit")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load()?;
    if let Some(poll_interval) = cli.poll_interval {
        config.scheduler.poll_interval_secs = poll_interval;
    }

    let db = Database::new(&config.database.path).await?;

    info!("autogram-send daemon starting");
    info!("Poll interval: {}s", config.scheduler.poll_interval_secs);

    let publisher = Arc::new(GraphApiPublisher::new(&config.publisher)?);
    let orchestrator = Orchestrator::new(db.clone(), publisher, config.publisher.clone())?;

    let mut scheduler = Scheduler::new(
        db.clone(),
        orchestrator,
        config.publisher.clone(),
        config.scheduler.clone(),
    );

    match (config.generation.clone(), config.storage.clone()) {
        (Some(generation), Some(storage)) => {
            scheduler = scheduler
                .with_generator(build_generator(&config, generation, storage)?);
            info!("content generation enabled");
        }
        _ => info!("content generation disabled (no [generation]/[storage] config)"),
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    if cli.once {
        let now = chrono::Utc::now().timestamp();
        let summary = scheduler.run_once(now).await?;
        info!(
            attempted = summary.attempted,
            published = summary.published,
            "autogram-send: processed posts once, exiting"
        );
    } else {
        scheduler.run(shutdown).await?;
    }

    info!("autogram-send daemon stopped");
    Ok(())
}

fn build_generator(
    config: &Config,
    generation: GenerationConfig,
    storage: StorageConfig,
) -> Result<Arc<dyn ContentGenerator>> {
    let timeout = config.publisher.request_timeout();
    let store = HttpImageStore::new(storage, timeout)?;
    Ok(Arc::new(HttpGenerator::new(generation, store, timeout)?))
}

/// Initialize logging based on verbosity level; `AUTOGRAM_LOG_FORMAT` and
/// `AUTOGRAM_LOG_LEVEL` pick the output format and default level.
fn init_logging(verbose: bool) {
    use libautogram::logging::{LogFormat, LoggingConfig};

    let format = std::env::var("AUTOGRAM_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("AUTOGRAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libautogram::AutogramError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::SeqCst);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}
