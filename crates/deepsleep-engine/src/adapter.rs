//! Subscription and lifecycle adapter.
//!
//! [`EnergySaver`] is the [`E2EventHandler`] handed to the controller
//! library. It subscribes to MAC statistics when a node connects, runs each
//! indication through the extractor and the node's state machine, and hands
//! resulting transmit-chain commands to the dispatcher.

use std::sync::Arc;

use deepsleep_common::control::MacSubscription;
use deepsleep_common::models::{MacIndication, NodeDescriptor, NodeId, MAC_RAN_FUNCTION_ID};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatch::{self, ControlCommand, ControlDispatcher};
use crate::emitter::ControlEmitter;
use crate::extract;
use crate::registry::{self, NodeRegistry};
use crate::ric::{E2EventHandler, RicClient, RicError};
use crate::state::Transition;
use crate::stats::{CounterSnapshot, EngineCounters, NodeSnapshot};

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("node {node} does not advertise RAN function {ran_function}")]
    Unsupported { node: NodeId, ran_function: u16 },
    #[error("failed to encode subscription trigger: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Ric(#[from] RicError),
}

pub struct EnergySaver {
    config: EngineConfig,
    ric: Arc<dyn RicClient>,
    clock: Arc<dyn Clock>,
    registry: NodeRegistry,
    dispatcher: ControlDispatcher,
    counters: Arc<EngineCounters>,
}

impl EnergySaver {
    /// Build the engine. Starts the dispatch worker unless the config asks
    /// for inline dispatch.
    pub fn new(
        config: EngineConfig,
        ric: Arc<dyn RicClient>,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        let counters = Arc::new(EngineCounters::new());
        let emitter = ControlEmitter::new(ric.clone());
        let dispatcher = if config.dispatch.inline {
            ControlDispatcher::inline(emitter, counters.clone())
        } else {
            ControlDispatcher::spawn(emitter, counters.clone(), config.dispatch.queue_capacity)?
        };

        tracing::info!(
            idle_timeout_us = config.policy.idle_timeout_us(),
            max_harq_failures = config.policy.max_harq_failures(),
            inline_dispatch = config.dispatch.inline,
            "energy saver ready"
        );

        Ok(EnergySaver {
            config,
            ric,
            clock,
            registry: NodeRegistry::new(),
            dispatcher,
            counters,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Snapshot of every monitored node at the engine clock's current time.
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.registry.snapshots(self.clock.now_us())
    }

    /// Wait for queued transmit-chain commands to be attempted.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }

    /// Drain queued commands and stop the dispatch worker.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    /// Request the MAC statistics feed from `node`.
    pub fn subscribe(&self, node: &NodeDescriptor) -> Result<(), SubscribeError> {
        if !node.may_support(MAC_RAN_FUNCTION_ID) {
            return Err(SubscribeError::Unsupported {
                node: node.id,
                ran_function: MAC_RAN_FUNCTION_ID,
            });
        }
        let trigger = serde_json::to_vec(&MacSubscription::every_tti(self.config.tti_us))?;
        self.ric.subscribe(&node.id, MAC_RAN_FUNCTION_ID, &trigger)?;
        Ok(())
    }

    /// Fold one indication into the node's state at `now_us`.
    ///
    /// Returns the transition taken, if any. Indications from nodes that are
    /// not monitored are counted and dropped.
    pub fn process(
        &self,
        node: &NodeId,
        indication: &MacIndication,
        now_us: u64,
    ) -> Option<Transition> {
        EngineCounters::incr(&self.counters.indications);

        let Some(handle) = self.registry.get(node) else {
            EngineCounters::incr(&self.counters.unmonitored_indications);
            tracing::debug!(node = %node, "indication from unmonitored node dropped");
            return None;
        };

        for ue in &indication.ue_stats {
            if ue.dl_aggr_tbs > 0 {
                tracing::trace!(node = %node, rnti = ue.rnti, tbs = ue.dl_aggr_tbs, "PDSCH scheduled");
            }
            if ue.dl_harq_round > 0 {
                tracing::trace!(node = %node, rnti = ue.rnti, round = ue.dl_harq_round, "DL HARQ retransmission");
            }
        }

        let summary = extract::summarize(indication);

        // Commands are dispatched under the node lock so their order always
        // matches the order of the transitions that produced them.
        let mut state = registry::lock(&handle);
        let transition = state.apply(now_us, &summary, &self.config.policy);

        tracing::debug!(
            node = %node,
            ues = indication.ue_stats.len(),
            pdsch = summary.pdsch_scheduled,
            failing_users = summary.failing_users,
            idle_us = state.idle_for_us(now_us),
            failures = state.failure_count(),
            power = state.power().as_str(),
            "indication processed"
        );

        let transition = transition?;
        match transition {
            Transition::EnterDeepSleep { idle_us, cycle } => {
                EngineCounters::incr(&self.counters.entries);
                tracing::info!(
                    node = %node,
                    idle_us,
                    failures = state.failure_count(),
                    cycle,
                    "entering deep sleep"
                );
            }
            Transition::ExitDeepSleep {
                slept_us,
                failures_cleared,
            } => {
                EngineCounters::incr(&self.counters.exits);
                tracing::info!(
                    node = %node,
                    slept_us,
                    failures_cleared,
                    "exiting deep sleep, PDSCH activity resumed"
                );
            }
        }

        let command = ControlCommand {
            node: *node,
            enabled: transition.tx_enabled(),
        };
        if let Err(e) = self.dispatcher.dispatch(command) {
            tracing::warn!(
                node = %node,
                enabled = command.enabled,
                error = %e,
                hardware = dispatch::unapplied_outcome(command.enabled),
                "transmit chain command dropped, not retried until the next transition"
            );
        }
        drop(state);

        Some(transition)
    }
}

impl E2EventHandler for EnergySaver {
    fn on_setup_request(&self, node: &NodeDescriptor) {
        tracing::info!(
            node = %node.id,
            ran_functions = node.ran_functions.len(),
            "E2 setup request"
        );
    }

    fn on_node_connected(&self, node: &NodeDescriptor) {
        tracing::info!(node = %node.id, "E2 node connected");
        // State exists before the subscription is acknowledged; the first
        // indication may arrive before `subscribe` returns.
        let fresh = self.registry.insert(node.id);
        match self.subscribe(node) {
            Ok(()) => {
                EngineCounters::incr(&self.counters.subscriptions_ok);
                tracing::info!(node = %node.id, fresh, "subscribed to MAC statistics");
            }
            Err(e) => {
                self.registry.remove(&node.id);
                EngineCounters::incr(&self.counters.subscriptions_failed);
                tracing::warn!(node = %node.id, error = %e, "MAC statistics subscription failed, node left unmonitored");
            }
        }
    }

    fn on_node_disconnected(&self, node: &NodeDescriptor) {
        match self.registry.remove(&node.id) {
            Some(state) => {
                if state.deep_sleep_active() {
                    tracing::warn!(node = %node.id, "E2 node disconnected while in deep sleep");
                }
                tracing::info!(
                    node = %node.id,
                    cycles = state.cycle_count(),
                    "E2 node disconnected, energy state discarded"
                );
            }
            None => tracing::info!(node = %node.id, "E2 node disconnected (was not monitored)"),
        }
    }

    fn on_indication(&self, node: &NodeDescriptor, indication: &MacIndication) {
        let now_us = self.clock.now_us();
        self.process(&node.id, indication, now_us);
    }
}
