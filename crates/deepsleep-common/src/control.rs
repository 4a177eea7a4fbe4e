//! MAC service-model requests sent from the xApp to a node.
//!
//! Both requests are encoded as JSON before they cross the collaborator
//! boundary; the collaborator owns the actual E2AP framing.

use serde::{Deserialize, Serialize};

/// RNTI that addresses every UE served by the node.
pub const RNTI_ALL_UES: u16 = 0xFFFF;

// ── Control ─────────────────────────────────────────────────────────

/// Transmit power directive applied to the selected UEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPowerLevel {
    /// Transmit chain effectively off (deep sleep).
    Minimum,
    /// Normal operating power.
    Nominal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrbConfig {
    /// Number of data radio bearers to reconfigure. 0 leaves bearers untouched.
    pub num_drb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeConfig {
    pub rnti: u16,
    pub drb_config: DrbConfig,
    pub tx_power: TxPowerLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacControlHeader {
    pub version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MacControlMessage {
    UeConfig(Vec<UeConfig>),
}

/// A complete MAC control request (header + message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacControlRequest {
    pub header: MacControlHeader,
    pub message: MacControlMessage,
}

impl MacControlRequest {
    /// Request that powers the transmit chain up (`enabled`) or down.
    ///
    /// Applies to all UEs and never touches bearers. The request carries the
    /// absolute desired setting rather than a toggle.
    pub fn transmit_chain(enabled: bool) -> Self {
        let tx_power = if enabled {
            TxPowerLevel::Nominal
        } else {
            TxPowerLevel::Minimum
        };
        MacControlRequest {
            header: MacControlHeader::default(),
            message: MacControlMessage::UeConfig(vec![UeConfig {
                rnti: RNTI_ALL_UES,
                drb_config: DrbConfig::default(),
                tx_power,
            }]),
        }
    }

    /// The transmit-chain setting this request asks for, if it is a
    /// wildcard power directive.
    pub fn transmit_chain_enabled(&self) -> Option<bool> {
        let MacControlMessage::UeConfig(configs) = &self.message;
        configs
            .iter()
            .find(|c| c.rnti == RNTI_ALL_UES)
            .map(|c| c.tx_power == TxPowerLevel::Nominal)
    }
}

// ── Subscription ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacStatsKind {
    StatsV0,
}

/// Event trigger for the MAC statistics subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacSubscription {
    pub kind: MacStatsKind,
    /// Reporting period in milliseconds.
    pub period_ms: u32,
    pub action_ids: Vec<u16>,
}

impl MacSubscription {
    /// Subscription reporting once per TTI of `tti_us` microseconds.
    pub fn every_tti(tti_us: u32) -> Self {
        MacSubscription {
            kind: MacStatsKind::StatsV0,
            period_ms: (tti_us / 1000).max(1),
            action_ids: vec![0],
        }
    }
}
