//! Shared types for the deep-sleep energy saver.
//!
//! This crate contains:
//! - **Node models**: E2 node identity, descriptors and advertised RAN functions
//! - **MAC indications**: per-UE scheduling statistics delivered every TTI
//! - **MAC control**: the transmit-chain configuration request and the
//!   statistics subscription trigger
//! - **Traces**: JSON-lines records of E2 events used for offline replay

pub mod control;
pub mod models;
pub mod trace;
