//! Seams to the RAN-control-interface library.
//!
//! The library calls into an [`E2EventHandler`] and is called back through
//! a [`RicClient`]. Payloads cross this boundary already encoded; framing
//! and transport belong to the library.

use deepsleep_common::models::{MacIndication, NodeDescriptor, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RicError {
    #[error("request rejected by node {0}")]
    Rejected(NodeId),
    #[error("node {0} is not connected")]
    NotConnected(NodeId),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound calls into the controller library.
pub trait RicClient: Send + Sync {
    /// Subscribe to `ran_function` indications on `node`.
    fn subscribe(&self, node: &NodeId, ran_function: u16, trigger: &[u8]) -> Result<(), RicError>;

    /// Submit a control request to `ran_function` on `node`.
    fn send_control(
        &self,
        node: &NodeId,
        ran_function: u16,
        payload: &[u8],
    ) -> Result<(), RicError>;
}

/// Callbacks invoked by the controller library, one per event kind.
///
/// The library is the sole caller. Indications for a given node must be
/// delivered one at a time; different nodes may be delivered concurrently.
pub trait E2EventHandler: Send + Sync {
    fn on_setup_request(&self, node: &NodeDescriptor);
    fn on_node_connected(&self, node: &NodeDescriptor);
    fn on_node_disconnected(&self, node: &NodeDescriptor);
    fn on_indication(&self, node: &NodeDescriptor, indication: &MacIndication);
}
