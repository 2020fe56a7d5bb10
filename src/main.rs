//! Rxn - reactive dispatch diagnostics
//!
//! CLI entry point for benchmarking the dispatch engine and inspecting configuration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use rxn::cli::{Cli, Command, OutputFormat};
use rxn::config::Config;
use rxn::dispatch::DispatchMetrics;
use rxn::event::RxnEvent;
use rxn::owner::Entity;

fn setup_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Bench {
            subscribers,
            publishes,
            waiters,
            format,
        } => cmd_bench(&config, subscribers, publishes, waiters, format).await,
        Command::Config => cmd_config(&config),
    }
}

/// Result of one bench run
#[derive(Debug, Serialize)]
struct BenchReport {
    subscribers: usize,
    publishes: usize,
    waiters: usize,
    elapsed_ms: f64,
    publishes_per_sec: f64,
    callbacks_run: u64,
    metrics: DispatchMetrics,
}

async fn cmd_bench(
    config: &Config,
    subscribers: usize,
    publishes: usize,
    waiters: usize,
    format: OutputFormat,
) -> Result<()> {
    debug!(subscribers, publishes, waiters, "cmd_bench: called");

    let event: RxnEvent<u64> = RxnEvent::with_config(config);
    let owner = event.as_owner().context("Failed to obtain event owner")?;
    let host = Entity::new("bench");
    let callbacks_run = Arc::new(AtomicU64::new(0));

    for _ in 0..subscribers {
        let counter = Arc::clone(&callbacks_run);
        event.on_invoked(&host, move |_: &u64| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }

    let started = Instant::now();
    for n in 0..publishes as u64 {
        let pending: Vec<_> = (0..waiters).map(|_| event.wait(Duration::ZERO)).collect();
        owner.invoke(n);
        for waiting in pending {
            let payload = waiting.await.context("Waiter failed")?;
            debug_assert_eq!(payload, n);
        }
    }
    let elapsed = started.elapsed();

    let elapsed_secs = elapsed.as_secs_f64();
    let report = BenchReport {
        subscribers,
        publishes,
        waiters,
        elapsed_ms: elapsed_secs * 1000.0,
        publishes_per_sec: if elapsed_secs > 0.0 {
            publishes as f64 / elapsed_secs
        } else {
            0.0
        },
        callbacks_run: callbacks_run.load(Ordering::Relaxed),
        metrics: event.metrics(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{}", "Rxn Dispatch Bench".bold());
            println!("------------------");
            println!("Subscribers:      {}", report.subscribers);
            println!("Publishes:        {}", report.publishes);
            println!("Waiters/publish:  {}", report.waiters);
            println!("Elapsed:          {:.2} ms", report.elapsed_ms);
            println!("Throughput:       {:.0} publishes/s", report.publishes_per_sec);
            println!();
            println!("Deliveries:       {}", report.metrics.deliveries.to_string().green());
            println!("Callback panics:  {}", report.metrics.callback_panics);
            println!("Waiters resolved: {}", report.metrics.waiters_resolved);
            println!("Pruned:           {}", report.metrics.pruned);
        }
    }

    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
