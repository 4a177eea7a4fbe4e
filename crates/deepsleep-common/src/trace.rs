//! JSON-lines traces of E2 events.
//!
//! One record per line, `#` comments and blank lines ignored:
//!
//! ```text
//! {"t_us": 0, "event": "connected", "node": {"id": {"nb_id": 1}}}
//! {"t_us": 1000, "event": "indication", "node": {"id": {"nb_id": 1}}, "ue_stats": [{"rnti": 17, "dl_aggr_tbs": 120}]}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{MacIndication, NodeDescriptor, UeMacStats};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("trace line {line}: timestamp {t_us} goes backwards (previous {prev_us})")]
    NonMonotonic { line: usize, t_us: u64, prev_us: u64 },
}

/// An event delivered by the controller library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum E2Event {
    SetupRequest {
        node: NodeDescriptor,
    },
    Connected {
        node: NodeDescriptor,
    },
    Indication {
        node: NodeDescriptor,
        #[serde(default)]
        ue_stats: Vec<UeMacStats>,
    },
    Disconnected {
        node: NodeDescriptor,
    },
}

impl E2Event {
    pub fn node(&self) -> &NodeDescriptor {
        match self {
            E2Event::SetupRequest { node }
            | E2Event::Connected { node }
            | E2Event::Indication { node, .. }
            | E2Event::Disconnected { node } => node,
        }
    }

    /// The MAC indication carried by this event, if any.
    pub fn indication(&self, t_us: u64) -> Option<MacIndication> {
        match self {
            E2Event::Indication { ue_stats, .. } => Some(MacIndication {
                tstamp_us: Some(t_us),
                ue_stats: ue_stats.clone(),
            }),
            _ => None,
        }
    }
}

/// A timestamped trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Microseconds since the start of the trace.
    pub t_us: u64,
    #[serde(flatten)]
    pub event: E2Event,
}

/// Parse a JSON-lines trace. Timestamps must be non-decreasing.
pub fn parse_trace(input: &str) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    let mut prev_us = 0u64;
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(line).map_err(|source| TraceError::Parse {
            line: idx + 1,
            source,
        })?;
        if record.t_us < prev_us {
            return Err(TraceError::NonMonotonic {
                line: idx + 1,
                t_us: record.t_us,
                prev_us,
            });
        }
        prev_us = record.t_us;
        records.push(record);
    }
    Ok(records)
}
