//! # Deep-Sleep Decision Engine
//!
//! Watches per-TTI MAC scheduling telemetry from E2 nodes and decides when a
//! node's transmit chain can be powered down and when it must come back.
//!
//! ```text
//! controller library ──events──▶ EnergySaver (adapter)
//!                                  │  extract::summarize
//!                                  │  EnergySaveState::apply   (per-node lock)
//!                                  ▼
//!                           ControlDispatcher ──▶ ControlEmitter ──▶ RicClient::send_control
//! ```
//!
//! The policy is a single fixed heuristic: no PDSCH for the idle timeout and
//! zero observed HARQ retransmissions enters deep sleep; any PDSCH exits it.

pub mod adapter;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod emitter;
pub mod extract;
pub mod metrics;
pub mod registry;
pub mod ric;
pub mod state;
pub mod stats;
pub mod test_util;

pub use adapter::EnergySaver;
pub use config::EngineConfig;
pub use ric::{E2EventHandler, RicClient, RicError};
pub use state::{EnergySaveState, PowerState, Transition};
