//! In-process stand-in for the RAN-control-interface library.
//!
//! Tracks which nodes are connected, decodes every request the engine
//! submits, and remembers the transmit-chain setting last applied per node.
//! Failure injection covers the subscription and control error paths.

use std::collections::HashSet;

use dashmap::{DashMap, DashSet};
use deepsleep_common::control::{MacControlRequest, MacSubscription};
use deepsleep_common::models::{MacIndication, NodeId};
use deepsleep_common::trace::E2Event;
use deepsleep_engine::{E2EventHandler, RicClient, RicError};

pub struct LoopbackRic {
    connected: DashSet<NodeId>,
    /// Last transmit-chain setting accepted per node.
    tx_enabled: DashMap<NodeId, bool>,
    reject_subscriptions: HashSet<u32>,
    fail_controls: bool,
}

impl LoopbackRic {
    /// `reject_subscriptions` lists nb_ids whose subscriptions are refused.
    pub fn new(reject_subscriptions: HashSet<u32>, fail_controls: bool) -> Self {
        LoopbackRic {
            connected: DashSet::new(),
            tx_enabled: DashMap::new(),
            reject_subscriptions,
            fail_controls,
        }
    }

    pub fn node_connected(&self, node: NodeId) {
        self.connected.insert(node);
    }

    pub fn node_disconnected(&self, node: &NodeId) {
        self.connected.remove(node);
        self.tx_enabled.remove(node);
    }

    /// Hand `event` to `handler` the way the controller library would,
    /// keeping the connection table in step.
    pub fn deliver(&self, handler: &dyn E2EventHandler, event: &E2Event) {
        match event {
            E2Event::SetupRequest { node } => handler.on_setup_request(node),
            E2Event::Connected { node } => {
                self.node_connected(node.id);
                handler.on_node_connected(node);
            }
            E2Event::Indication { node, ue_stats } => {
                let indication = MacIndication::new(ue_stats.clone());
                handler.on_indication(node, &indication);
            }
            E2Event::Disconnected { node } => {
                handler.on_node_disconnected(node);
                self.node_disconnected(&node.id);
            }
        }
    }

    /// Transmit-chain setting the node was last told to apply.
    pub fn tx_enabled(&self, node: &NodeId) -> Option<bool> {
        self.tx_enabled.get(node).map(|v| *v)
    }

    fn check_connected(&self, node: &NodeId) -> Result<(), RicError> {
        if self.connected.contains(node) {
            Ok(())
        } else {
            Err(RicError::NotConnected(*node))
        }
    }
}

impl RicClient for LoopbackRic {
    fn subscribe(&self, node: &NodeId, ran_function: u16, trigger: &[u8]) -> Result<(), RicError> {
        self.check_connected(node)?;
        if self.reject_subscriptions.contains(&node.nb_id) {
            return Err(RicError::Rejected(*node));
        }
        let trigger: MacSubscription = serde_json::from_slice(trigger)
            .map_err(|e| RicError::Transport(format!("malformed subscription trigger: {e}")))?;
        tracing::debug!(
            node = %node,
            ran_function,
            period_ms = trigger.period_ms,
            "loopback: subscription accepted"
        );
        Ok(())
    }

    fn send_control(
        &self,
        node: &NodeId,
        ran_function: u16,
        payload: &[u8],
    ) -> Result<(), RicError> {
        self.check_connected(node)?;
        if self.fail_controls {
            return Err(RicError::Transport("control channel unavailable".into()));
        }
        let request: MacControlRequest = serde_json::from_slice(payload)
            .map_err(|e| RicError::Transport(format!("malformed control request: {e}")))?;
        let Some(enabled) = request.transmit_chain_enabled() else {
            return Err(RicError::Transport(
                "control request carries no wildcard power directive".into(),
            ));
        };
        self.tx_enabled.insert(*node, enabled);
        tracing::debug!(node = %node, ran_function, enabled, "loopback: control applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepsleep_common::models::MAC_RAN_FUNCTION_ID;

    fn trigger() -> Vec<u8> {
        serde_json::to_vec(&MacSubscription::every_tti(1000)).unwrap()
    }

    fn control(enabled: bool) -> Vec<u8> {
        serde_json::to_vec(&MacControlRequest::transmit_chain(enabled)).unwrap()
    }

    #[test]
    fn requests_to_disconnected_nodes_fail() {
        let ric = LoopbackRic::new(HashSet::new(), false);
        let node = NodeId::gnb(1);
        let trigger = trigger();
        assert!(matches!(
            ric.subscribe(&node, MAC_RAN_FUNCTION_ID, &trigger),
            Err(RicError::NotConnected(_))
        ));
        ric.node_connected(node);
        assert!(ric.subscribe(&node, MAC_RAN_FUNCTION_ID, &trigger).is_ok());
    }

    #[test]
    fn rejects_configured_nodes() {
        let ric = LoopbackRic::new(HashSet::from([2]), false);
        ric.node_connected(NodeId::gnb(2));
        assert!(matches!(
            ric.subscribe(&NodeId::gnb(2), MAC_RAN_FUNCTION_ID, &trigger()),
            Err(RicError::Rejected(_))
        ));
    }

    #[test]
    fn tracks_applied_setting() {
        let ric = LoopbackRic::new(HashSet::new(), false);
        let node = NodeId::gnb(1);
        ric.node_connected(node);
        ric.send_control(&node, MAC_RAN_FUNCTION_ID, &control(false))
            .unwrap();
        assert_eq!(ric.tx_enabled(&node), Some(false));

        ric.node_disconnected(&node);
        assert_eq!(ric.tx_enabled(&node), None);
    }

    #[test]
    fn injected_control_failure() {
        let ric = LoopbackRic::new(HashSet::new(), true);
        let node = NodeId::gnb(1);
        ric.node_connected(node);
        assert!(ric
            .send_control(&node, MAC_RAN_FUNCTION_ID, &control(true))
            .is_err());
        assert_eq!(ric.tx_enabled(&node), None);
    }
}
