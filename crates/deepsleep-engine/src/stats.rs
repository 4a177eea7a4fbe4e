//! Engine-wide counters and per-node snapshots for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

use deepsleep_common::models::NodeId;

use crate::state::{EnergySaveState, PowerState};

/// Monotonic event counters shared by the adapter and the dispatcher.
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub indications: AtomicU64,
    /// Indications from nodes with no energy-saving state.
    pub unmonitored_indications: AtomicU64,
    pub entries: AtomicU64,
    pub exits: AtomicU64,
    pub controls_sent: AtomicU64,
    pub controls_failed: AtomicU64,
    /// Commands dropped because the dispatch queue was full or closed.
    pub controls_dropped: AtomicU64,
    pub subscriptions_ok: AtomicU64,
    pub subscriptions_failed: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            indications: load(&self.indications),
            unmonitored_indications: load(&self.unmonitored_indications),
            entries: load(&self.entries),
            exits: load(&self.exits),
            controls_sent: load(&self.controls_sent),
            controls_failed: load(&self.controls_failed),
            controls_dropped: load(&self.controls_dropped),
            subscriptions_ok: load(&self.subscriptions_ok),
            subscriptions_failed: load(&self.subscriptions_failed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub indications: u64,
    pub unmonitored_indications: u64,
    pub entries: u64,
    pub exits: u64,
    pub controls_sent: u64,
    pub controls_failed: u64,
    pub controls_dropped: u64,
    pub subscriptions_ok: u64,
    pub subscriptions_failed: u64,
}

/// Point-in-time copy of one node's energy-saving state.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub node: NodeId,
    pub power: PowerState,
    pub cycle_count: u32,
    pub failure_count: u32,
    /// Current no-PDSCH duration; zero while PDSCH is flowing.
    pub idle_for_us: u64,
    pub total_sleep_us: u64,
    pub observed_us: u64,
}

impl NodeSnapshot {
    pub fn capture(node: NodeId, state: &EnergySaveState, now_us: u64) -> Self {
        NodeSnapshot {
            node,
            power: state.power(),
            cycle_count: state.cycle_count(),
            failure_count: state.failure_count(),
            idle_for_us: state.idle_for_us(now_us),
            total_sleep_us: state.total_sleep_us(now_us),
            observed_us: state.observed_us(now_us),
        }
    }

    pub fn tx_active(&self) -> bool {
        self.power == PowerState::Active
    }

    pub fn deep_sleep_active(&self) -> bool {
        self.power == PowerState::DeepSleep
    }

    /// Fraction of observed time spent in deep sleep, in [0, 1].
    pub fn sleep_ratio(&self) -> f64 {
        if self.observed_us == 0 {
            return 0.0;
        }
        (self.total_sleep_us as f64 / self.observed_us as f64).clamp(0.0, 1.0)
    }

    /// Estimated fraction of radio energy saved, assuming deep sleep cuts
    /// consumption by `reduction_percent` while it lasts.
    pub fn estimated_savings(&self, reduction_percent: u8) -> f64 {
        self.sleep_ratio() * f64::from(reduction_percent.min(100)) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SchedulingSummary;
    use crate::state::Policy;

    #[test]
    fn counter_snapshot_reflects_increments() {
        let counters = EngineCounters::new();
        EngineCounters::incr(&counters.indications);
        EngineCounters::incr(&counters.indications);
        EngineCounters::incr(&counters.entries);
        let snap = counters.snapshot();
        assert_eq!(snap.indications, 2);
        assert_eq!(snap.entries, 1);
        assert_eq!(snap.exits, 0);
    }

    #[test]
    fn savings_estimate_scales_with_sleep_ratio() {
        let mut state = EnergySaveState::new();
        let policy = Policy::default();
        state.apply(0, &SchedulingSummary::IDLE, &policy);
        state.apply(500_000, &SchedulingSummary::IDLE, &policy);
        let snap = NodeSnapshot::capture(NodeId::gnb(1), &state, 1_000_000);
        assert!(snap.deep_sleep_active());
        assert!((snap.sleep_ratio() - 0.5).abs() < 1e-9);
        assert!((snap.estimated_savings(37) - 0.185).abs() < 1e-9);
    }

    #[test]
    fn unobserved_node_has_no_savings() {
        let snap = NodeSnapshot::capture(NodeId::gnb(1), &EnergySaveState::new(), 5);
        assert_eq!(snap.sleep_ratio(), 0.0);
        assert_eq!(snap.estimated_savings(37), 0.0);
        assert!(snap.tx_active());
    }
}
