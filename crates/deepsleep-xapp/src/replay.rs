//! JSON-lines trace replay.
//!
//! Records are delivered in order with the engine clock set to each
//! record's timestamp. With a speed factor, the replay sleeps between
//! records so the trace plays back at that multiple of real time.

use std::time::Duration;

use deepsleep_common::trace::{E2Event, TraceRecord};
use deepsleep_engine::clock::ManualClock;
use deepsleep_engine::E2EventHandler;
use tokio::sync::watch;

use crate::loopback::LoopbackRic;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub indications: usize,
    /// Trace time covered, first to last record.
    pub span_us: u64,
    pub interrupted: bool,
}

/// Play `records` through `handler`. Blocking; run it off the async runtime.
pub fn replay(
    records: &[TraceRecord],
    handler: &dyn E2EventHandler,
    ric: &LoopbackRic,
    clock: &ManualClock,
    speed: Option<f64>,
    shutdown: &watch::Receiver<bool>,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let Some(first) = records.first() else {
        return summary;
    };
    let mut prev_us = first.t_us;

    for record in records {
        if *shutdown.borrow() {
            summary.interrupted = true;
            break;
        }
        if let Some(gap) = pacing(record.t_us - prev_us, speed) {
            std::thread::sleep(gap);
        }
        prev_us = record.t_us;

        clock.set(record.t_us);
        if matches!(record.event, E2Event::Indication { .. }) {
            summary.indications += 1;
        }
        tracing::trace!(t_us = record.t_us, node = %record.event.node().id, "replaying event");
        ric.deliver(handler, &record.event);
        summary.events += 1;
        summary.span_us = record.t_us - first.t_us;
    }

    summary
}

/// Wall-clock delay for a trace gap of `gap_us` at `speed`x real time.
fn pacing(gap_us: u64, speed: Option<f64>) -> Option<Duration> {
    let speed = speed.filter(|s| s.is_finite() && *s > 0.0)?;
    if gap_us == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(gap_us as f64 / 1e6 / speed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use deepsleep_common::trace::parse_trace;
    use deepsleep_engine::{EnergySaver, EngineConfig};

    const TRACE: &str = r#"
# one gNB goes idle for half a second, then traffic resumes
{"t_us": 0, "event": "setup_request", "node": {"id": {"nb_id": 1}, "ran_functions": [{"id": 26}]}}
{"t_us": 0, "event": "connected", "node": {"id": {"nb_id": 1}, "ran_functions": [{"id": 26}]}}
{"t_us": 0, "event": "indication", "node": {"id": {"nb_id": 1}}, "ue_stats": [{"rnti": 17921}]}
{"t_us": 500000, "event": "indication", "node": {"id": {"nb_id": 1}}, "ue_stats": [{"rnti": 17921}]}
{"t_us": 501000, "event": "indication", "node": {"id": {"nb_id": 1}}, "ue_stats": [{"rnti": 17921, "dl_aggr_tbs": 120}]}
"#;

    fn engine() -> (Arc<LoopbackRic>, Arc<ManualClock>, EnergySaver) {
        let ric = Arc::new(LoopbackRic::new(HashSet::new(), false));
        let clock = Arc::new(ManualClock::new(0));
        let mut config = EngineConfig::default();
        config.dispatch.inline = true;
        let saver = EnergySaver::new(config, ric.clone(), clock.clone()).unwrap();
        (ric, clock, saver)
    }

    #[test]
    fn replays_sleep_and_wake() {
        let records = parse_trace(TRACE).unwrap();
        let (ric, clock, saver) = engine();
        let (_tx, rx) = watch::channel(false);

        let summary = replay(&records, &saver, &ric, &clock, None, &rx);
        assert_eq!(summary.events, 5);
        assert_eq!(summary.indications, 3);
        assert_eq!(summary.span_us, 501_000);
        assert!(!summary.interrupted);

        let counters = saver.counters();
        assert_eq!(counters.entries, 1);
        assert_eq!(counters.exits, 1);
        assert_eq!(counters.controls_sent, 2);
        let node = records[0].event.node().id;
        assert_eq!(ric.tx_enabled(&node), Some(true));
    }

    #[test]
    fn bundled_trace_parses_and_gates_on_harq() {
        let records = parse_trace(include_str!("../../../traces/scenario.jsonl")).unwrap();
        let (ric, clock, saver) = engine();
        let (_tx, rx) = watch::channel(false);

        let summary = replay(&records, &saver, &ric, &clock, None, &rx);
        assert_eq!(summary.span_us, 1_500_000);
        let counters = saver.counters();
        assert_eq!(counters.subscriptions_ok, 2);
        assert_eq!(counters.entries, 1);
        assert_eq!(counters.exits, 1);
        assert!(saver.registry().is_empty());
    }

    #[test]
    fn stops_on_shutdown() {
        let records = parse_trace(TRACE).unwrap();
        let (ric, clock, saver) = engine();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = replay(&records, &saver, &ric, &clock, None, &rx);
        assert_eq!(summary.events, 0);
        assert!(summary.interrupted);
    }

    #[test]
    fn pacing_scales_gaps() {
        assert_eq!(pacing(1_000_000, None), None);
        assert_eq!(pacing(1_000_000, Some(0.0)), None);
        assert_eq!(pacing(0, Some(1.0)), None);
        assert_eq!(pacing(1_000_000, Some(2.0)), Some(Duration::from_millis(500)));
    }
}
