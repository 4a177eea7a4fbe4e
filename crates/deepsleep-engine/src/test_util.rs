//! Helpers for exercising the engine without a controller library.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use deepsleep_common::control::{MacControlRequest, MacSubscription};
use deepsleep_common::models::{MacIndication, NodeId, UeMacStats};

use crate::config::EngineConfig;
use crate::ric::{RicClient, RicError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubscription {
    pub node: NodeId,
    pub ran_function: u16,
    pub trigger: MacSubscription,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedControl {
    pub node: NodeId,
    pub ran_function: u16,
    pub request: MacControlRequest,
}

/// [`RicClient`] that decodes and records every accepted request.
#[derive(Debug, Default)]
pub struct RecordingRic {
    subscriptions: Mutex<Vec<RecordedSubscription>>,
    controls: Mutex<Vec<RecordedControl>>,
    control_attempts: AtomicU64,
    reject_subscriptions: AtomicBool,
    fail_controls: AtomicBool,
}

impl RecordingRic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent subscription request fail.
    pub fn reject_subscriptions(&self, reject: bool) {
        self.reject_subscriptions.store(reject, Ordering::Relaxed);
    }

    /// Make every subsequent control request fail.
    pub fn fail_controls(&self, fail: bool) {
        self.fail_controls.store(fail, Ordering::Relaxed);
    }

    pub fn subscriptions(&self) -> Vec<RecordedSubscription> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Control requests that were accepted, in submission order.
    pub fn controls(&self) -> Vec<RecordedControl> {
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Control requests attempted, including rejected ones.
    pub fn control_attempts(&self) -> u64 {
        self.control_attempts.load(Ordering::Relaxed)
    }
}

impl RicClient for RecordingRic {
    fn subscribe(&self, node: &NodeId, ran_function: u16, trigger: &[u8]) -> Result<(), RicError> {
        if self.reject_subscriptions.load(Ordering::Relaxed) {
            return Err(RicError::Rejected(*node));
        }
        let trigger: MacSubscription = serde_json::from_slice(trigger)
            .map_err(|e| RicError::Transport(format!("undecodable trigger: {e}")))?;
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedSubscription {
                node: *node,
                ran_function,
                trigger,
            });
        Ok(())
    }

    fn send_control(
        &self,
        node: &NodeId,
        ran_function: u16,
        payload: &[u8],
    ) -> Result<(), RicError> {
        self.control_attempts.fetch_add(1, Ordering::Relaxed);
        if self.fail_controls.load(Ordering::Relaxed) {
            return Err(RicError::Rejected(*node));
        }
        let request: MacControlRequest = serde_json::from_slice(payload)
            .map_err(|e| RicError::Transport(format!("undecodable control: {e}")))?;
        self.controls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedControl {
                node: *node,
                ran_function,
                request,
            });
        Ok(())
    }
}

/// [`RicClient`] whose control sends park until [`BlockingRic::open`] is
/// called. Subscriptions pass straight through.
#[derive(Debug)]
pub struct BlockingRic {
    inner: RecordingRic,
    started_tx: Sender<NodeId>,
    started_rx: Receiver<NodeId>,
    gate_tx: Mutex<Option<Sender<()>>>,
    gate_rx: Receiver<()>,
}

impl BlockingRic {
    pub fn new() -> Self {
        let (started_tx, started_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        BlockingRic {
            inner: RecordingRic::new(),
            started_tx,
            started_rx,
            gate_tx: Mutex::new(Some(gate_tx)),
            gate_rx,
        }
    }

    /// Wait up to `timeout` for a control send to start; returns its node.
    pub fn wait_for_send(&self, timeout: Duration) -> Option<NodeId> {
        self.started_rx.recv_timeout(timeout).ok()
    }

    /// Release every parked and future send.
    pub fn open(&self) {
        self.gate_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn controls(&self) -> Vec<RecordedControl> {
        self.inner.controls()
    }
}

impl Default for BlockingRic {
    fn default() -> Self {
        Self::new()
    }
}

impl RicClient for BlockingRic {
    fn subscribe(&self, node: &NodeId, ran_function: u16, trigger: &[u8]) -> Result<(), RicError> {
        self.inner.subscribe(node, ran_function, trigger)
    }

    fn send_control(
        &self,
        node: &NodeId,
        ran_function: u16,
        payload: &[u8],
    ) -> Result<(), RicError> {
        let _ = self.started_tx.send(*node);
        // Returns once the gate sender is dropped.
        let _ = self.gate_rx.recv();
        self.inner.send_control(node, ran_function, payload)
    }
}

/// Default config with controls sent on the calling thread.
pub fn inline_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.dispatch.inline = true;
    config
}

/// Indication with one UE and nothing scheduled.
pub fn idle() -> MacIndication {
    MacIndication::new(vec![UeMacStats {
        rnti: 0x4601,
        dl_aggr_tbs: 0,
        dl_harq_round: 0,
    }])
}

/// Indication with one UE scheduled for `tbs` bytes.
pub fn busy(tbs: u64) -> MacIndication {
    MacIndication::new(vec![UeMacStats {
        rnti: 0x4601,
        dl_aggr_tbs: tbs,
        dl_harq_round: 0,
    }])
}

/// Indication with `failing` idle UEs each in HARQ round 1.
pub fn retransmitting(failing: u16) -> MacIndication {
    MacIndication::new(
        (0..failing)
            .map(|i| UeMacStats {
                rnti: 0x4601 + i,
                dl_aggr_tbs: 0,
                dl_harq_round: 1,
            })
            .collect(),
    )
}
