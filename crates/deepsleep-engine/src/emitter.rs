//! Control emitter: turns a transmit-chain decision into a MAC control
//! request and submits it.

use std::sync::Arc;

use deepsleep_common::control::MacControlRequest;
use deepsleep_common::models::{NodeId, MAC_RAN_FUNCTION_ID};
use thiserror::Error;

use crate::ric::{RicClient, RicError};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode control request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("control request to {node} failed: {source}")]
    Submit {
        node: NodeId,
        #[source]
        source: RicError,
    },
}

/// Acknowledgement that the controller accepted a transmit-chain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub node: NodeId,
    pub enabled: bool,
    /// Encoded payload size in bytes.
    pub payload_len: usize,
}

/// Builds and submits transmit-chain requests. Holds no decision state.
#[derive(Clone)]
pub struct ControlEmitter {
    ric: Arc<dyn RicClient>,
}

impl ControlEmitter {
    pub fn new(ric: Arc<dyn RicClient>) -> Self {
        ControlEmitter { ric }
    }

    /// Command `node` to power its transmit chain up or down.
    ///
    /// The encoded payload is owned by this call and dropped on every
    /// return path. No retry on failure.
    pub fn set_transmit_chain(&self, node: &NodeId, enabled: bool) -> Result<Ack, SendError> {
        let (action, tx_power) = if enabled {
            ("enabling", "nominal")
        } else {
            ("disabling", "minimum")
        };
        tracing::info!(node = %node, tx_power, "{action} transmit chain");

        let request = MacControlRequest::transmit_chain(enabled);
        let payload = serde_json::to_vec(&request)?;

        self.ric
            .send_control(node, MAC_RAN_FUNCTION_ID, &payload)
            .map_err(|source| SendError::Submit { node: *node, source })?;

        Ok(Ack {
            node: *node,
            enabled,
            payload_len: payload.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::RecordingRic;

    #[test]
    fn disable_sends_minimum_power_to_mac_function() {
        let ric = Arc::new(RecordingRic::new());
        let emitter = ControlEmitter::new(ric.clone());
        let node = NodeId::gnb(1);

        let ack = emitter.set_transmit_chain(&node, false).unwrap();
        assert_eq!(ack.node, node);
        assert!(!ack.enabled);
        assert!(ack.payload_len > 0);

        let sent = ric.controls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].node, node);
        assert_eq!(sent[0].ran_function, MAC_RAN_FUNCTION_ID);
        assert_eq!(sent[0].request.transmit_chain_enabled(), Some(false));
    }

    #[test]
    fn enable_sends_nominal_power() {
        let ric = Arc::new(RecordingRic::new());
        let emitter = ControlEmitter::new(ric.clone());
        emitter.set_transmit_chain(&NodeId::gnb(2), true).unwrap();
        assert_eq!(ric.controls()[0].request.transmit_chain_enabled(), Some(true));
    }

    #[test]
    fn rejection_is_reported_not_retried() {
        let ric = Arc::new(RecordingRic::new());
        ric.fail_controls(true);
        let emitter = ControlEmitter::new(ric.clone());
        let node = NodeId::gnb(3);

        match emitter.set_transmit_chain(&node, false) {
            Err(SendError::Submit { node: n, source }) => {
                assert_eq!(n, node);
                assert!(matches!(source, RicError::Rejected(_)));
            }
            other => panic!("expected submit error, got {other:?}"),
        }
        assert_eq!(ric.control_attempts(), 1);
    }
}
