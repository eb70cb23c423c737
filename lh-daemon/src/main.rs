//! lumenhub daemon (lumenhubd)
//!
//! Runs the lighting hub: loads configuration and the persisted lighting
//! state, discovers the actuators, then polls the RF receiver and the sensor
//! socket until SIGINT/SIGTERM.
//!
//! # Startup
//! - Parse CLI, initialize logging (journald when available, else stdout)
//! - Load and validate config, load lighting state
//! - One health refresh so the first ticks see real reachability
//! - Bind the actuator socket, restore the remembered levels
//! - Spawn the health monitor, run the control loop
//!
//! # Shutdown
//! The signal handler only raises a flag. The control loop exits at its next
//! tick, running ramps are given a moment to finish and the state is
//! persisted one final time.

mod cli;
mod control_loop;
mod rf;

use anyhow::Context;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use lh_core::alert::{AlertSink, SilentAlerts, SoundPlayer};
use lh_core::health::{ArpScanDiscovery, PingProbe};
use lh_core::{
    ActuatorDirectory, EventRouter, HealthMonitor, HubConfig, HubContext, Reachability,
    RemoteDecoder, RfSource, StateLimits, StateStore, UdpLink,
};

use crate::cli::Cli;
use crate::control_loop::ControlLoop;
use crate::rf::{LineRfSource, NullRfSource};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "LUMENHUB_LOG";

/// Longest we wait for running ramps at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Logging
// ============================================================================

fn log_filter() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Returns whether logs go to the systemd journal
fn init_logging(log_level: &str) -> bool {
    // Try to use journald first (for systemd systems), fall back to stdout
    if std::path::Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(log_level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(log_level)
        .init();
    false
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if cli.print_default_config {
        match HubConfig::default().to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let log_level = log_filter();
    let journald = init_logging(&log_level);
    info!("STARTUP: lumenhubd {} starting", VERSION);
    info!(
        "STARTUP: Logging to {} (filter {})",
        if journald { "systemd journal" } else { "stdout" },
        log_level
    );

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // PHASE 1: Configuration and persisted state
    let mut config = HubConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {:?}", cli.config))?;
    cli.apply_overrides(&mut config);
    config.validate().context("validating configuration")?;

    let limits = StateLimits {
        delay_levels: config.delay_levels.len(),
        volume_max: config.adjust.volume_max,
    };
    let state = StateStore::load(&config.paths.settings_file, limits);
    info!("STARTUP: State file: {:?}", state.path());

    // PHASE 2: Shutdown flag
    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        signal_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    // PHASE 3: Actuator discovery and first reachability snapshot
    let directory = ActuatorDirectory::from_config(&config);
    let reachability = Reachability::new();
    let health = HealthMonitor::new(
        directory.clone(),
        reachability.clone(),
        Arc::new(ArpScanDiscovery),
        Arc::new(PingProbe {
            timeout_secs: config.timing.probe_timeout_secs,
        }),
        config.timing.health_interval(),
    );
    health.refresh_once().await;
    for (name, up) in reachability.snapshot() {
        info!("STARTUP: Actuator {} {}", name, if up { "reachable" } else { "unreachable" });
    }

    // PHASE 4: Link, context, router
    let link = Arc::new(
        UdpLink::bind(config.network.bind_address, directory.clone(), reachability.clone())
            .await
            .context("binding actuator socket")?,
    );
    info!("STARTUP: Listening on {}", link.local_addr()?);

    let alerts: Arc<dyn AlertSink> = if config.alerts.enabled {
        Arc::new(SoundPlayer::new(config.alerts.clone(), &config.delay_levels))
    } else {
        Arc::new(SilentAlerts)
    };

    let rf_source: Box<dyn RfSource> = match &config.paths.rf_source {
        Some(path) => Box::new(LineRfSource::spawn(path.clone(), Arc::clone(&shutdown))),
        None => {
            warn!("STARTUP: No RF source configured, remote input disabled");
            Box::new(NullRfSource)
        }
    };
    let decoder = RemoteDecoder::new(rf_source, config.remote.passthrough.clone());

    let ctx = HubContext::with_network(
        config,
        state,
        directory,
        reachability,
        link.clone(),
        alerts,
    );
    let router = EventRouter::new(ctx.clone());
    router.restore().await;

    // PHASE 5: Background health monitor and control loop
    let health_handle = tokio::spawn(health.run(Arc::clone(&shutdown)));
    ControlLoop::new(ctx.clone(), router, decoder, link)
        .run(Arc::clone(&shutdown))
        .await;

    // PHASE 6: Orderly shutdown
    health_handle.abort();
    if tokio::time::timeout(SHUTDOWN_GRACE, ctx.fades.wait_all_idle())
        .await
        .is_err()
    {
        warn!("SHUTDOWN: Ramps still running after {:?}", SHUTDOWN_GRACE);
    }
    ctx.state.persist().context("persisting lighting state")?;

    let stats = ctx.fades.stats();
    info!(
        started = stats.started,
        rejected = stats.rejected,
        preempted = stats.preempted,
        "SHUTDOWN: lumenhubd stopped"
    );
    Ok(())
}
