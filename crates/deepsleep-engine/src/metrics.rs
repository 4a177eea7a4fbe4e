//! # Prometheus Metrics
//!
//! Renders per-node energy-saving state and engine counters in Prometheus
//! text exposition format.

use std::fmt::Write;

use crate::stats::{CounterSnapshot, NodeSnapshot};

fn node_labels(s: &NodeSnapshot) -> String {
    format!("node=\"{}\",nb_id=\"{}\"", s.node, s.node.nb_id)
}

/// Render node snapshots and engine counters.
pub fn render_prometheus(
    nodes: &[NodeSnapshot],
    counters: &CounterSnapshot,
    energy_reduction_percent: u8,
) -> String {
    let mut out = String::with_capacity(2048);

    // ── Per-node gauges ─────────────────────────────────────────

    writeln!(
        out,
        "# HELP deepsleep_tx_active Whether the transmit chain is powered (1) or in deep sleep (0)."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_tx_active gauge").unwrap();
    for s in nodes {
        let v = if s.tx_active() { 1 } else { 0 };
        writeln!(out, "deepsleep_tx_active{{{}}} {v}", node_labels(s)).unwrap();
    }

    writeln!(
        out,
        "# HELP deepsleep_cycles_total Deep-sleep periods entered since the node connected."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_cycles_total counter").unwrap();
    for s in nodes {
        writeln!(
            out,
            "deepsleep_cycles_total{{{}}} {}",
            node_labels(s),
            s.cycle_count
        )
        .unwrap();
    }

    writeln!(
        out,
        "# HELP deepsleep_harq_failures HARQ failures counted since the last deep-sleep exit."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_harq_failures gauge").unwrap();
    for s in nodes {
        writeln!(
            out,
            "deepsleep_harq_failures{{{}}} {}",
            node_labels(s),
            s.failure_count
        )
        .unwrap();
    }

    writeln!(
        out,
        "# HELP deepsleep_idle_seconds Current time without PDSCH scheduling."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_idle_seconds gauge").unwrap();
    for s in nodes {
        writeln!(
            out,
            "deepsleep_idle_seconds{{{}}} {:.6}",
            node_labels(s),
            s.idle_for_us as f64 / 1e6
        )
        .unwrap();
    }

    writeln!(
        out,
        "# HELP deepsleep_sleep_seconds_total Time spent with the transmit chain powered down."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_sleep_seconds_total counter").unwrap();
    for s in nodes {
        writeln!(
            out,
            "deepsleep_sleep_seconds_total{{{}}} {:.6}",
            node_labels(s),
            s.total_sleep_us as f64 / 1e6
        )
        .unwrap();
    }

    writeln!(
        out,
        "# HELP deepsleep_estimated_savings_ratio Estimated fraction of radio energy saved."
    )
    .unwrap();
    writeln!(out, "# TYPE deepsleep_estimated_savings_ratio gauge").unwrap();
    for s in nodes {
        writeln!(
            out,
            "deepsleep_estimated_savings_ratio{{{}}} {:.6}",
            node_labels(s),
            s.estimated_savings(energy_reduction_percent)
        )
        .unwrap();
    }

    // ── Engine counters ─────────────────────────────────────────

    writeln!(out, "# HELP deepsleep_nodes Nodes currently monitored.").unwrap();
    writeln!(out, "# TYPE deepsleep_nodes gauge").unwrap();
    writeln!(out, "deepsleep_nodes {}", nodes.len()).unwrap();

    let counters_table: [(&str, &str, u64); 9] = [
        (
            "deepsleep_indications_total",
            "MAC indications received.",
            counters.indications,
        ),
        (
            "deepsleep_unmonitored_indications_total",
            "MAC indications dropped for unmonitored nodes.",
            counters.unmonitored_indications,
        ),
        (
            "deepsleep_entries_total",
            "ACTIVE to DEEP_SLEEP transitions.",
            counters.entries,
        ),
        (
            "deepsleep_exits_total",
            "DEEP_SLEEP to ACTIVE transitions.",
            counters.exits,
        ),
        (
            "deepsleep_controls_sent_total",
            "Transmit chain commands accepted by the controller.",
            counters.controls_sent,
        ),
        (
            "deepsleep_controls_failed_total",
            "Transmit chain commands that failed to send.",
            counters.controls_failed,
        ),
        (
            "deepsleep_controls_dropped_total",
            "Transmit chain commands dropped before sending.",
            counters.controls_dropped,
        ),
        (
            "deepsleep_subscriptions_total",
            "Successful MAC statistics subscriptions.",
            counters.subscriptions_ok,
        ),
        (
            "deepsleep_subscription_failures_total",
            "Failed MAC statistics subscriptions.",
            counters.subscriptions_failed,
        ),
    ];
    for (name, help, value) in counters_table {
        writeln!(out, "# HELP {name} {help}").unwrap();
        writeln!(out, "# TYPE {name} counter").unwrap();
        writeln!(out, "{name} {value}").unwrap();
    }

    out
}
