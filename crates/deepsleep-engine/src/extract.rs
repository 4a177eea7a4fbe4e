//! Telemetry extraction: one MAC indication in, one scheduling summary out.

use deepsleep_common::models::{MacIndication, UeMacStats};

/// What the decision state machine needs to know about one indication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulingSummary {
    /// At least one UE had downlink data scheduled on PDSCH.
    pub pdsch_scheduled: bool,
    /// At least one UE needed a downlink HARQ retransmission.
    pub harq_failure: bool,
    /// Number of UEs with a HARQ round above zero.
    pub failing_users: u32,
}

impl SchedulingSummary {
    /// Summary of an indication with no PDSCH and no retransmissions.
    pub const IDLE: SchedulingSummary = SchedulingSummary {
        pdsch_scheduled: false,
        harq_failure: false,
        failing_users: 0,
    };
}

/// Distill an indication. Every UE entry is examined; an empty indication
/// is idle.
pub fn summarize(indication: &MacIndication) -> SchedulingSummary {
    summarize_ues(&indication.ue_stats)
}

pub fn summarize_ues(ue_stats: &[UeMacStats]) -> SchedulingSummary {
    let mut summary = SchedulingSummary::IDLE;
    for ue in ue_stats {
        if ue.dl_aggr_tbs > 0 {
            summary.pdsch_scheduled = true;
        }
        if ue.dl_harq_round > 0 {
            summary.harq_failure = true;
            summary.failing_users = summary.failing_users.saturating_add(1);
        }
    }
    summary
}
