//! Deep-sleep energy saving xApp
//!
//! Runs the deep-sleep engine against an in-process RAN controller.
//!
//! - With `--trace`, replays a JSON-lines E2 event trace on a manual clock
//! - Otherwise simulates `--nodes` gNBs with seeded bursty downlink traffic
//! - Logs a per-node energy report every `report.interval_s`
//! - Serves Prometheus metrics on `--metrics-addr` when given

mod loopback;
mod metrics;
mod replay;
mod reporter;
mod simulate;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use deepsleep_common::trace::parse_trace;
use deepsleep_engine::clock::{Clock, ManualClock, MonotonicClock};
use deepsleep_engine::{E2EventHandler, EnergySaver, EngineConfig};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::loopback::LoopbackRic;
use crate::simulate::{SimulationConfig, TrafficProfile};

/// Deep-sleep energy saving xApp.
#[derive(Parser, Debug)]
#[command(name = "deepsleep-xapp", about = "Deep-sleep energy saving xApp")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, env = "DEEPSLEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Replay this JSON-lines E2 event trace instead of simulating traffic.
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Replay pacing as a multiple of real time. Unpaced when omitted.
    #[arg(long)]
    speed: Option<f64>,

    /// Number of simulated gNBs.
    #[arg(long, default_value_t = 4)]
    nodes: u32,

    /// Simulation length in seconds. Runs until Ctrl-C when omitted.
    #[arg(long)]
    duration_s: Option<u64>,

    /// Seed for the traffic simulator.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Interval between simulated indications, in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Per-UE HARQ retransmission probability during simulated bursts.
    #[arg(long, default_value_t = 0.0)]
    harq_prob: f64,

    /// Prometheus metrics listen address, e.g. 127.0.0.1:9187.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// nb_ids whose MAC subscriptions the controller rejects.
    #[arg(long, value_delimiter = ',')]
    reject_subscriptions: Vec<u32>,

    /// Make every transmit-chain control request fail.
    #[arg(long, default_value_t = false)]
    fail_controls: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    if !(0.0..=1.0).contains(&cli.harq_prob) {
        anyhow::bail!("--harq-prob must be within [0, 1], got {}", cli.harq_prob);
    }

    let mode = if cli.trace.is_some() { "replay" } else { "simulate" };
    tracing::info!(
        mode,
        idle_timeout_us = config.policy.idle_timeout_us(),
        report_interval_s = config.report.interval.as_secs(),
        "deepsleep-xapp starting"
    );

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let ric = Arc::new(LoopbackRic::new(
        cli.reject_subscriptions.iter().copied().collect::<HashSet<_>>(),
        cli.fail_controls,
    ));

    // Replay runs on a manual clock driven by trace timestamps.
    let manual_clock = cli.trace.as_ref().map(|_| Arc::new(ManualClock::new(0)));
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(clock) => clock.clone() as Arc<dyn Clock>,
        None => Arc::new(MonotonicClock::new()),
    };
    let saver = Arc::new(
        EnergySaver::new(config, ric.clone(), clock).context("failed to start energy saver")?,
    );

    // ── Task 1: Periodic report ─────────────────────────────────
    let reporter_handle = tokio::spawn(reporter::run(saver.clone(), shutdown_rx.clone()));

    // ── Task 2: Metrics server ──────────────────────────────────
    if let Some(addr) = cli.metrics_addr {
        let metrics_saver = saver.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::run(metrics_saver, addr).await {
                tracing::error!("metrics server failed: {e:#}");
            }
        });
    }

    // ── Task 3: Event source ────────────────────────────────────
    match (cli.trace, manual_clock) {
        (Some(path), Some(clock)) => {
            let input = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read trace {}", path.display()))?;
            let records = parse_trace(&input)
                .with_context(|| format!("invalid trace {}", path.display()))?;
            tracing::info!(records = records.len(), path = %path.display(), "replaying trace");

            let replay_saver = saver.clone();
            let replay_ric = ric.clone();
            let replay_shutdown = shutdown_rx.clone();
            let speed = cli.speed;
            let summary = tokio::task::spawn_blocking(move || {
                replay::replay(
                    &records,
                    &*replay_saver,
                    &replay_ric,
                    &clock,
                    speed,
                    &replay_shutdown,
                )
            })
            .await
            .context("trace replay task failed")?;
            tracing::info!(
                events = summary.events,
                indications = summary.indications,
                span_ms = summary.span_us / 1_000,
                interrupted = summary.interrupted,
                "trace replay finished"
            );
        }
        _ => {
            let sim = SimulationConfig {
                nodes: cli.nodes,
                seed: cli.seed,
                tick: Duration::from_millis(cli.tick_ms.max(1)),
                duration: cli.duration_s.map(Duration::from_secs),
                profile: TrafficProfile {
                    harq_probability: cli.harq_prob,
                    ..TrafficProfile::default()
                },
            };
            let handler: Arc<dyn E2EventHandler> = saver.clone();
            simulate::run(sim, handler, ric.clone(), shutdown_rx.clone()).await;
        }
    }

    // ── Shutdown ────────────────────────────────────────────────
    saver.flush();
    reporter::log_report(&saver);
    reporter_handle.abort();
    saver.shutdown();

    tracing::info!("deepsleep-xapp stopped");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = EngineConfig::from_toml_str(&input)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded configuration");
    Ok(config)
}
