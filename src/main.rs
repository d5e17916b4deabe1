//! Cell Healer - self-healing controller for backend-managed network cells
//!
//! Polls the management backend, restarts cells that report `FAILED` and
//! prohibits the ones that will not come back so an operator can look at them.
//!
//! # Usage
//!
//! ```bash
//! # Run against the backend named in ./healer.toml
//! cargo run --release
//!
//! # Single reconciliation pass, then exit
//! ./cell-healer --once --config /etc/cell-healer/healer.toml
//! ```
//!
//! # Environment Variables
//!
//! - `CELL_HEALER_CONFIG`: Config file path when `--config` is not given
//! - `CELL_HEALER_PASSWORD`: Backend password, overrides the config file
//! - `RUST_LOG`: Console logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cell_healer::backend::{CellBackend, HttpBackend};
use cell_healer::config::{ConfigSource, HealerConfig};
use cell_healer::logging;
use cell_healer::reconciler::Reconciler;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "cell-healer")]
#[command(about = "Self-healing reconciliation controller for network cells")]
#[command(version)]
struct CliArgs {
    /// Config file (default: $CELL_HEALER_CONFIG, then ./healer.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not rewrite the loaded config file in canonical form
    #[arg(long)]
    no_normalize: bool,

    /// Run a single reconciliation tick and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl CliArgs {
    /// Canonical rewriting of the config file is skipped for read-only runs.
    fn normalize_config(&self) -> bool {
        !self.no_normalize && !self.print_config
    }
}

// ============================================================================
// Startup
// ============================================================================

/// Resolve configuration. An explicit `--config` must load; the implicit
/// search falls back to defaults.
fn load_config(explicit: Option<&PathBuf>) -> Result<(HealerConfig, ConfigSource)> {
    match explicit {
        Some(path) => {
            let config = HealerConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            info!(path = %path.display(), "Loaded healer config");
            Ok((config, ConfigSource::File(path.clone())))
        }
        None => Ok(HealerConfig::load()),
    }
}

/// Cancel `token` on Ctrl+C.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Shutdown signal received, finishing current cell");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Could not install Ctrl+C handler"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Config is read before the file sink exists, so startup messages go to
    // a console-only subscriber.
    let (config, source) = tracing::subscriber::with_default(logging::bootstrap_subscriber(), || {
        let (config, source) = load_config(args.config.as_ref())?;
        if args.normalize_config() {
            match config.persist_normalized(&source) {
                Ok(true) => info!(source = %source, "Rewrote config in canonical form"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Could not normalize config file"),
            }
        }
        Ok::<_, anyhow::Error>((config, source))
    })?;

    let mut config = config;
    config.apply_env_overrides();

    if args.print_config {
        let mut shown = config.clone();
        if !shown.backend.password.is_empty() {
            shown.backend.password = "********".to_string();
        }
        print!("{}", shown.to_toml()?);
        return Ok(());
    }

    let _log_guard = logging::init(&config.logging)?;

    info!("🚀 Starting Cell Healer v{}", env!("CARGO_PKG_VERSION"));
    info!("   Config:         {}", source);
    info!("   Backend:        {}", config.backend.base_url());
    info!(
        "   Timeouts:       stop {}s, start {}s, poll {}s",
        config.timers.stop_timeout_secs, config.timers.start_timeout_secs, config.timers.poll_interval_secs
    );
    info!("   Retry budget:   {}", config.healing.retry_budget);
    info!("   Tick interval:  {}s", config.timers.tick_interval_secs);
    if config.logging.file_enabled {
        info!("   Log directory:  {}", config.logging.directory);
    }

    let backend: Arc<dyn CellBackend> = Arc::new(
        HttpBackend::new(&config.backend).context("Failed to build backend client")?,
    );

    let cancel_token = CancellationToken::new();
    spawn_signal_handler(cancel_token.clone());

    let mut reconciler = Reconciler::new(backend, &config, cancel_token);

    if args.once {
        match reconciler.run_tick().await {
            Some(report) => info!("{}", report),
            None => warn!("Cancelled before the backend could be reached"),
        }
        for id in reconciler.prohibited().ids() {
            warn!(cell = %id, "Cell remains prohibited from healing");
        }
    } else {
        let ticks = reconciler.run().await;
        info!(ticks, "Reconciliation loop finished");
    }

    info!("✓ Shutdown complete");
    Ok(())
}
