//! Periodic energy-saving report.
//!
//! Every `report.interval_s`, logs one line per monitored node plus the
//! engine counters.

use std::sync::Arc;

use deepsleep_engine::stats::NodeSnapshot;
use deepsleep_engine::EnergySaver;
use tokio::sync::watch;

/// Run the report loop until shutdown.
pub async fn run(saver: Arc<EnergySaver>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(saver.config().report.interval);
    // The first tick completes immediately; there is nothing to report yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }
        log_report(&saver);
    }
}

/// Log the current state of every node and the engine counters.
pub fn log_report(saver: &EnergySaver) {
    let reduction = saver.config().report.energy_reduction_percent;
    let nodes = saver.snapshots();
    let counters = saver.counters();

    tracing::info!(
        nodes = nodes.len(),
        indications = counters.indications,
        entries = counters.entries,
        exits = counters.exits,
        controls_sent = counters.controls_sent,
        controls_failed = counters.controls_failed,
        controls_dropped = counters.controls_dropped,
        "energy saving report"
    );

    for snap in &nodes {
        let tx_chain = if snap.tx_active() { "ACTIVE" } else { "DISABLED" };
        let deep_sleep = if snap.deep_sleep_active() { "ACTIVE" } else { "INACTIVE" };
        let idle_ms = snap.idle_for_us / 1_000;
        match savings_percent(snap, reduction) {
            Some(savings) => tracing::info!(
                node = %snap.node,
                tx_chain,
                deep_sleep,
                cycles = snap.cycle_count,
                harq_failures = snap.failure_count,
                idle_ms,
                "estimated energy savings {savings:.1}%"
            ),
            None => tracing::info!(
                node = %snap.node,
                tx_chain,
                deep_sleep,
                cycles = snap.cycle_count,
                harq_failures = snap.failure_count,
                idle_ms,
                "no deep-sleep cycles yet"
            ),
        }
    }
}

/// Savings estimate in percent, once the node has slept at least once.
fn savings_percent(snap: &NodeSnapshot, reduction_percent: u8) -> Option<f64> {
    (snap.cycle_count > 0).then(|| snap.estimated_savings(reduction_percent) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepsleep_common::models::NodeId;
    use deepsleep_engine::PowerState;

    fn snapshot(cycle_count: u32, total_sleep_us: u64) -> NodeSnapshot {
        NodeSnapshot {
            node: NodeId::gnb(1),
            power: PowerState::Active,
            cycle_count,
            failure_count: 0,
            idle_for_us: 0,
            total_sleep_us,
            observed_us: 10_000_000,
        }
    }

    #[test]
    fn no_estimate_before_first_cycle() {
        assert_eq!(savings_percent(&snapshot(0, 0), 37), None);
    }

    #[test]
    fn estimate_scales_with_sleep_share() {
        let savings = savings_percent(&snapshot(2, 5_000_000), 37).unwrap();
        assert!((savings - 18.5).abs() < 1e-9);
    }
}
