//! Seeded downlink traffic generator.
//!
//! Each simulated node alternates between bursts of PDSCH scheduling and
//! idle gaps of random length. A node's generator is seeded from the global
//! seed and its nb_id, so a run is reproducible for a given seed and node
//! count. Indications are fed to the engine on a fixed tick from one tokio
//! task per node.

use std::sync::Arc;
use std::time::Duration;

use deepsleep_common::models::{MacIndication, NodeDescriptor, NodeId, UeMacStats, MAC_RAN_FUNCTION_ID};
use deepsleep_common::trace::E2Event;
use deepsleep_engine::E2EventHandler;
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use tokio::sync::watch;

use crate::loopback::LoopbackRic;

/// Shape of the generated traffic.
#[derive(Debug, Clone)]
pub struct TrafficProfile {
    pub ues: u16,
    /// Burst length bounds in ms, inclusive.
    pub busy_ms: (u64, u64),
    /// Idle gap bounds in ms, inclusive.
    pub idle_ms: (u64, u64),
    /// Probability that a UE needs a HARQ retransmission in a busy tick.
    pub harq_probability: f64,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        TrafficProfile {
            ues: 4,
            busy_ms: (20, 300),
            idle_ms: (100, 1_500),
            harq_probability: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Busy { remaining_ms: u64 },
    Idle { remaining_ms: u64 },
}

/// Per-node traffic model.
pub struct TrafficModel {
    profile: TrafficProfile,
    rng: StdRng,
    phase: Phase,
}

impl TrafficModel {
    pub fn new(profile: TrafficProfile, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let remaining_ms = draw(&mut rng, profile.busy_ms);
        TrafficModel {
            profile,
            rng,
            phase: Phase::Busy { remaining_ms },
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Busy { .. })
    }

    /// Advance the model by one tick of `tick_ms` and build the indication
    /// for it.
    pub fn next_indication(&mut self, tick_ms: u64) -> MacIndication {
        let busy = self.is_busy();
        let ue_stats = (0..self.profile.ues)
            .map(|i| {
                let scheduled = busy && self.rng.random::<bool>();
                let retransmit =
                    scheduled && self.rng.random::<f64>() < self.profile.harq_probability;
                UeMacStats {
                    rnti: 0x4601 + i,
                    dl_aggr_tbs: if scheduled {
                        self.rng.random_range(32..=8_192)
                    } else {
                        0
                    },
                    dl_harq_round: if retransmit { 1 } else { 0 },
                }
            })
            .collect();
        self.step(tick_ms);
        MacIndication::new(ue_stats)
    }

    fn step(&mut self, tick_ms: u64) {
        self.phase = match self.phase {
            Phase::Busy { remaining_ms } if remaining_ms > tick_ms => Phase::Busy {
                remaining_ms: remaining_ms - tick_ms,
            },
            Phase::Idle { remaining_ms } if remaining_ms > tick_ms => Phase::Idle {
                remaining_ms: remaining_ms - tick_ms,
            },
            Phase::Busy { .. } => Phase::Idle {
                remaining_ms: draw(&mut self.rng, self.profile.idle_ms),
            },
            Phase::Idle { .. } => Phase::Busy {
                remaining_ms: draw(&mut self.rng, self.profile.busy_ms),
            },
        };
    }
}

fn draw(rng: &mut StdRng, (lo, hi): (u64, u64)) -> u64 {
    if hi <= lo {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

/// Simulation run parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub nodes: u32,
    pub seed: u64,
    pub tick: Duration,
    /// Stop after this long; `None` runs until shutdown.
    pub duration: Option<Duration>,
    pub profile: TrafficProfile,
}

/// Connect `config.nodes` simulated gNBs and drive them until the duration
/// elapses or shutdown is signalled, then disconnect them.
pub async fn run(
    config: SimulationConfig,
    handler: Arc<dyn E2EventHandler>,
    ric: Arc<LoopbackRic>,
    shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        nodes = config.nodes,
        seed = config.seed,
        tick_ms = config.tick.as_millis() as u64,
        "starting traffic simulation"
    );

    let mut tasks = Vec::with_capacity(config.nodes as usize);
    for nb_id in 1..=config.nodes {
        let node = NodeDescriptor::with_ran_functions(NodeId::gnb(nb_id), &[2, 3, MAC_RAN_FUNCTION_ID]);
        let model = TrafficModel::new(config.profile.clone(), config.seed.wrapping_add(u64::from(nb_id)));
        tasks.push(tokio::spawn(drive_node(
            node,
            model,
            config.tick,
            config.duration,
            handler.clone(),
            ric.clone(),
            shutdown.clone(),
        )));
    }

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("simulated node task failed: {e}");
        }
    }
    tracing::info!("traffic simulation finished");
}

async fn drive_node(
    node: NodeDescriptor,
    mut model: TrafficModel,
    tick: Duration,
    duration: Option<Duration>,
    handler: Arc<dyn E2EventHandler>,
    ric: Arc<LoopbackRic>,
    mut shutdown: watch::Receiver<bool>,
) {
    let tick_ms = (tick.as_millis() as u64).max(1);
    ric.deliver(&*handler, &E2Event::SetupRequest { node: node.clone() });
    ric.deliver(&*handler, &E2Event::Connected { node: node.clone() });

    let deadline = duration.map(|d| tokio::time::Instant::now() + d);
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        let indication = model.next_indication(tick_ms);
        handler.on_indication(&node, &indication);
    }

    ric.deliver(&*handler, &E2Event::Disconnected { node });
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepsleep_engine::extract;

    #[test]
    fn same_seed_same_traffic() {
        let mut a = TrafficModel::new(TrafficProfile::default(), 42);
        let mut b = TrafficModel::new(TrafficProfile::default(), 42);
        for _ in 0..2_000 {
            assert_eq!(a.next_indication(10), b.next_indication(10));
        }
    }

    #[test]
    fn idle_phases_schedule_nothing() {
        let profile = TrafficProfile {
            harq_probability: 0.5,
            ..TrafficProfile::default()
        };
        let mut model = TrafficModel::new(profile, 7);
        let mut idle_ticks = 0;
        for _ in 0..5_000 {
            let busy = model.is_busy();
            let summary = extract::summarize(&model.next_indication(10));
            if !busy {
                idle_ticks += 1;
                assert!(!summary.pdsch_scheduled);
                assert!(!summary.harq_failure);
            }
        }
        assert!(idle_ticks > 0);
    }

    #[test]
    fn no_retransmissions_by_default() {
        let mut model = TrafficModel::new(TrafficProfile::default(), 3);
        for _ in 0..5_000 {
            assert!(!extract::summarize(&model.next_indication(10)).harq_failure);
        }
    }

    #[test]
    fn phases_alternate() {
        let profile = TrafficProfile {
            busy_ms: (30, 30),
            idle_ms: (50, 50),
            ..TrafficProfile::default()
        };
        let mut model = TrafficModel::new(profile, 1);
        let phases: Vec<bool> = (0..16)
            .map(|_| {
                let busy = model.is_busy();
                model.next_indication(10);
                busy
            })
            .collect();
        let busy = [true; 3];
        let idle = [false; 5];
        let expected: Vec<bool> = [&busy[..], &idle[..], &busy[..], &idle[..]].concat();
        assert_eq!(phases, expected);
    }
}
