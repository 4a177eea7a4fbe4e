//! E2 node identity and MAC scheduling statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RAN function ID of the MAC service model.
pub const MAC_RAN_FUNCTION_ID: u16 = 26;

// ── Node identity ───────────────────────────────────────────────────

/// Public Land Mobile Network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    pub mcc: u16,
    pub mnc: u16,
    /// Number of digits in the MNC (2 or 3).
    #[serde(default = "default_mnc_digit_len")]
    pub mnc_digit_len: u8,
}

fn default_mnc_digit_len() -> u8 {
    2
}

impl Default for Plmn {
    fn default() -> Self {
        // Test PLMN 001/01.
        Plmn {
            mcc: 1,
            mnc: 1,
            mnc_digit_len: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Gnb,
    GnbCu,
    GnbDu,
    Enb,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Gnb => "gnb",
            NodeType::GnbCu => "gnb-cu",
            NodeType::GnbDu => "gnb-du",
            NodeType::Enb => "enb",
        }
    }
}

/// Globally unique identifier of an E2 node.
///
/// Two split units (CU and DU) of the same gNB share `plmn` and `nb_id`
/// and differ in `node_type` / `cu_du_id`, so each gets its own
/// energy-saving state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    #[serde(default)]
    pub plmn: Plmn,
    pub nb_id: u32,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cu_du_id: Option<u64>,
}

impl NodeId {
    /// Monolithic gNB with the test PLMN.
    pub fn gnb(nb_id: u32) -> Self {
        NodeId {
            plmn: Plmn::default(),
            nb_id,
            node_type: NodeType::Gnb,
            cu_du_id: None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.plmn.mnc_digit_len as usize;
        write!(
            f,
            "{}:{:03}-{:0width$}:{}",
            self.node_type.as_str(),
            self.plmn.mcc,
            self.plmn.mnc,
            self.nb_id,
        )?;
        if let Some(unit) = self.cu_du_id {
            write!(f, "/{unit}")?;
        }
        Ok(())
    }
}

/// RAN function advertised by a node during E2 setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RanFunction {
    pub id: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub oid: String,
}

/// Everything the controller library tells us about a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    /// RAN functions from the E2 setup request. Empty when unknown.
    #[serde(default)]
    pub ran_functions: Vec<RanFunction>,
}

impl NodeDescriptor {
    pub fn new(id: NodeId) -> Self {
        NodeDescriptor {
            id,
            ran_functions: Vec::new(),
        }
    }

    pub fn with_ran_functions(id: NodeId, ids: &[u16]) -> Self {
        NodeDescriptor {
            id,
            ran_functions: ids
                .iter()
                .map(|&id| RanFunction {
                    id,
                    oid: String::new(),
                })
                .collect(),
        }
    }

    /// Whether the node can serve `ran_function`.
    ///
    /// A node that advertised nothing is given the benefit of the doubt.
    pub fn may_support(&self, ran_function: u16) -> bool {
        self.ran_functions.is_empty() || self.ran_functions.iter().any(|f| f.id == ran_function)
    }
}

// ── MAC statistics ──────────────────────────────────────────────────

/// Per-UE MAC scheduling statistics for one reporting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeMacStats {
    /// Radio network temporary identifier of the UE.
    pub rnti: u16,
    /// Aggregated downlink transport block size scheduled on PDSCH, in bytes.
    #[serde(default)]
    pub dl_aggr_tbs: u64,
    /// Downlink HARQ round. 0 means first transmission.
    #[serde(default)]
    pub dl_harq_round: u8,
}

/// One MAC statistics indication from a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacIndication {
    /// Node-side timestamp, when the node provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tstamp_us: Option<u64>,
    #[serde(default)]
    pub ue_stats: Vec<UeMacStats>,
}

impl MacIndication {
    pub fn new(ue_stats: Vec<UeMacStats>) -> Self {
        MacIndication {
            tstamp_us: None,
            ue_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let id = NodeId {
            plmn: Plmn {
                mcc: 208,
                mnc: 95,
                mnc_digit_len: 2,
            },
            nb_id: 3584,
            node_type: NodeType::GnbDu,
            cu_du_id: Some(1),
        };
        assert_eq!(id.to_string(), "gnb-du:208-95:3584/1");
        assert_eq!(NodeId::gnb(7).to_string(), "gnb:001-01:7");
    }

    #[test]
    fn split_units_are_distinct_nodes() {
        let mut du = NodeId::gnb(1);
        du.node_type = NodeType::GnbDu;
        assert_ne!(du, NodeId::gnb(1));
    }

    #[test]
    fn may_support_ran_function() {
        let id = NodeId::gnb(1);
        assert!(NodeDescriptor::new(id).may_support(MAC_RAN_FUNCTION_ID));
        assert!(NodeDescriptor::with_ran_functions(id, &[2, 26]).may_support(MAC_RAN_FUNCTION_ID));
        assert!(!NodeDescriptor::with_ran_functions(id, &[2, 3]).may_support(MAC_RAN_FUNCTION_ID));
    }

    #[test]
    fn ue_stats_fields_default_to_zero() {
        let ue: UeMacStats = serde_json::from_str(r#"{"rnti": 17}"#).unwrap();
        assert_eq!(ue.dl_aggr_tbs, 0);
        assert_eq!(ue.dl_harq_round, 0);
    }
}
