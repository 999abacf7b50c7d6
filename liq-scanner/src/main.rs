//! Liquidation scanner (liq-scanner) - Main entry point
//!
//! Terminal front end for a scanning session. Every stdin line is treated
//! as one scan submitted with Enter; lines starting with `:` are commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use liq_common::config::{load_toml_config, ConfigOverrides, ScannerConfig};
use liq_common::events::{EventBus, RejectReason, ScanEvent};
use liq_scanner::cache::LedgerCache;
use liq_scanner::report::{GroupProgress, MissingReport};
use liq_scanner::{
    HttpBackend, Scheduler, SchedulerConfig, SchedulerHandle, Session, SyncController, SyncMode,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BUS_CAPACITY: usize = 256;

/// Upper bound on printing the events left after the scheduler stops
const PRINTER_DRAIN: Duration = Duration::from_secs(2);

/// Command-line arguments for liq-scanner
#[derive(Parser, Debug)]
#[command(name = "liq-scanner")]
#[command(about = "Reconcile scanned guides against the liquidation manifest")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "LIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Backend endpoint URL
    #[arg(short, long, env = "LIQ_ENDPOINT")]
    endpoint: Option<String>,

    /// Ledger cache file
    #[arg(long, env = "LIQ_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file_config =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let overrides = ConfigOverrides {
        endpoint: args.endpoint,
        cache_path: args.cache_path,
        log_level: args.log_level,
    };
    let config = ScannerConfig::resolve(&overrides, &file_config)
        .context("Invalid configuration")?;

    // Logs go to stderr; stdout is the operator's view
    let default_filter = format!("liq_scanner={0},liq_common={0}", config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        endpoint = %config.endpoint,
        mode = %config.mode,
        cache = %config.cache_path.display(),
        "Starting liquidation scanner"
    );

    let backend =
        Arc::new(HttpBackend::from_config(&config).context("Failed to create backend client")?);
    let events = EventBus::new(EVENT_BUS_CAPACITY);

    let mut session = Session::restore(LedgerCache::new(&config.cache_path), events.clone());
    if !session.ledger().is_empty() {
        println!("Restored {} scanned guides", session.ledger().len());
    }

    // Nothing can be matched without a manifest
    let snapshot = SyncController::new(backend.clone(), events.clone())
        .load_manifest(&mut session, SyncMode::Blocking)
        .await
        .context("Failed to load manifest")?;
    println!(
        "Manifest loaded: {} groups, {} guides",
        snapshot.groups().len(),
        snapshot.guide_count()
    );

    let mut printer = tokio::spawn(print_events(events.subscribe()));
    let (handle, scheduler) =
        Scheduler::new(session, backend, events, SchedulerConfig::from(&config)).spawn();

    tokio::select! {
        result = read_commands(&handle) => result?,
        _ = shutdown_signal() => {}
    }

    handle.shutdown();
    let session = scheduler.await.context("Scheduler task failed")?;
    let records = session.ledger().len();
    drop(session);

    // The printer stops once every event sender is gone
    if tokio::time::timeout(PRINTER_DRAIN, &mut printer).await.is_err() {
        warn!("Event printer did not drain in time");
        printer.abort();
    }

    info!(records, "Shutdown complete");
    Ok(())
}

/// Feed stdin lines to the scheduler until `:quit` or end of input
async fn read_commands(handle: &SchedulerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        match line {
            "" => {}
            ":quit" => break,
            ":sync" => handle.sync_now().await?,
            ":clear" => handle.clear().await?,
            ":send" => {
                // Outcome is printed from the event stream
                let _ = handle.submit().await?;
            }
            ":missing" => print_missing(&handle.missing_report().await?),
            ":groups" => print_progress(&handle.group_progress().await?),
            other if other.starts_with(':') => {
                println!("Unknown command {}", other);
                println!("Commands: :sync :clear :send :missing :groups :quit");
            }
            scan => handle.enter(scan).await?,
        }
    }
    Ok(())
}

async fn print_events(mut rx: broadcast::Receiver<ScanEvent>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            ScanEvent::ScanAccepted {
                sequence,
                code,
                hora,
                vehicle_plate,
                city,
                color_label,
                ..
            } => println!(
                "#{:<4} OK   {}  {}  {} / {} / {}",
                sequence, code, hora, color_label, vehicle_plate, city
            ),
            ScanEvent::ScanRejected { code, reason, .. } => match reason {
                RejectReason::NotFound => println!("      ERR  {}  not in manifest", code),
                RejectReason::Duplicate => println!("      ERR  {}  already scanned", code),
            },
            ScanEvent::ManifestSynced { groups, guides, silent: false, .. } => {
                println!("Manifest updated: {} groups, {} guides", groups, guides)
            }
            ScanEvent::ManifestSynced { .. } => {}
            ScanEvent::SyncFailed { error, silent: false, .. } => {
                println!("Manifest update failed: {}", error)
            }
            ScanEvent::SyncFailed { .. } => {}
            ScanEvent::SessionCleared { removed, .. } => {
                println!("Cleared {} scanned guides", removed)
            }
            ScanEvent::SubmissionSent { groups, sheet, blocks, .. } => println!(
                "Sent {} groups to sheet {} ({} blocks)",
                groups, sheet, blocks
            ),
            ScanEvent::SubmissionFailed { error, .. } => println!("Send failed: {}", error),
        }
    }
}

fn print_missing(report: &MissingReport) {
    if report.groups.is_empty() {
        println!("No manifest groups");
        return;
    }
    for group in &report.groups {
        println!(
            "{} [{} / {}] liquidated {}/{}",
            group.color_label, group.vehicle_plate, group.city, group.liquidated, group.total
        );
        for code in &group.not_found {
            println!("    {}", code);
        }
    }
    println!("Missing total: {}", report.total_missing());
}

fn print_progress(progress: &[GroupProgress]) {
    for group in progress {
        println!(
            "{:<12} {:<8} {:<16} {}/{}",
            group.color_label, group.vehicle_plate, group.city, group.scanned, group.total
        );
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
