//! Control dispatch: keeps transmit-chain commands off the ingestion path.
//!
//! In worker mode a background thread owns the [`ControlEmitter`] and drains
//! a bounded crossbeam queue, so a slow controller never stalls indication
//! handling for other nodes. Inline mode sends on the caller's thread and is
//! used where determinism matters more than latency (tests, trace replay).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use deepsleep_common::models::NodeId;
use thiserror::Error;

use crate::emitter::ControlEmitter;
use crate::stats::EngineCounters;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("control dispatch queue is full")]
    Full,
    #[error("control dispatch worker has stopped")]
    Disconnected,
}

/// Desired transmit-chain setting for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCommand {
    pub node: NodeId,
    pub enabled: bool,
}

enum Job {
    Send(ControlCommand),
    Flush(Sender<()>),
    Shutdown,
}

enum Mode {
    Inline(ControlEmitter),
    Worker {
        tx: Sender<Job>,
        handle: Mutex<Option<thread::JoinHandle<()>>>,
        stopped: AtomicBool,
    },
}

pub struct ControlDispatcher {
    mode: Mode,
    counters: Arc<EngineCounters>,
}

impl ControlDispatcher {
    /// Send commands synchronously on the calling thread.
    pub fn inline(emitter: ControlEmitter, counters: Arc<EngineCounters>) -> Self {
        ControlDispatcher {
            mode: Mode::Inline(emitter),
            counters,
        }
    }

    /// Start a background worker with a queue of `capacity` commands.
    pub fn spawn(
        emitter: ControlEmitter,
        counters: Arc<EngineCounters>,
        capacity: usize,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded(capacity.max(1));
        let worker_counters = counters.clone();
        let handle = thread::Builder::new()
            .name("deepsleep-dispatch".into())
            .spawn(move || dispatch_worker(rx, emitter, worker_counters))?;

        Ok(ControlDispatcher {
            mode: Mode::Worker {
                tx,
                handle: Mutex::new(Some(handle)),
                stopped: AtomicBool::new(false),
            },
            counters,
        })
    }

    /// Hand a command to the emitter. Never blocks in worker mode.
    ///
    /// A returned error means the command was not attempted; send failures
    /// after that point are logged and counted by the emitter path.
    pub fn dispatch(&self, command: ControlCommand) -> Result<(), DispatchError> {
        match &self.mode {
            Mode::Inline(emitter) => {
                execute(emitter, &self.counters, command);
                Ok(())
            }
            Mode::Worker { tx, stopped, .. } => {
                if stopped.load(Ordering::Relaxed) {
                    EngineCounters::incr(&self.counters.controls_dropped);
                    return Err(DispatchError::Disconnected);
                }
                tx.try_send(Job::Send(command)).map_err(|e| {
                    EngineCounters::incr(&self.counters.controls_dropped);
                    match e {
                        TrySendError::Full(_) => DispatchError::Full,
                        TrySendError::Disconnected(_) => DispatchError::Disconnected,
                    }
                })
            }
        }
    }

    /// Block until every command queued so far has been attempted.
    pub fn flush(&self) {
        if let Mode::Worker { tx, stopped, .. } = &self.mode {
            if stopped.load(Ordering::Relaxed) {
                return;
            }
            let (ack_tx, ack_rx) = bounded(1);
            if tx.send(Job::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }

    /// Drain queued commands and stop the worker. Idempotent.
    pub fn shutdown(&self) {
        if let Mode::Worker {
            tx,
            handle,
            stopped,
        } = &self.mode
        {
            if stopped.swap(true, Ordering::Relaxed) {
                return;
            }
            let _ = tx.send(Job::Shutdown);
            let handle = handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    tracing::error!("control dispatch worker panicked");
                }
            }
        }
    }
}

impl Drop for ControlDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_worker(rx: Receiver<Job>, emitter: ControlEmitter, counters: Arc<EngineCounters>) {
    tracing::debug!("control dispatch worker started");
    while let Ok(job) = rx.recv() {
        match job {
            Job::Send(command) => execute(&emitter, &counters, command),
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
            Job::Shutdown => break,
        }
    }
    tracing::debug!("control dispatch worker stopped");
}

fn execute(emitter: &ControlEmitter, counters: &EngineCounters, command: ControlCommand) {
    match emitter.set_transmit_chain(&command.node, command.enabled) {
        Ok(ack) => {
            EngineCounters::incr(&counters.controls_sent);
            tracing::info!(
                node = %ack.node,
                enabled = ack.enabled,
                bytes = ack.payload_len,
                "transmit chain command sent"
            );
        }
        Err(e) => {
            EngineCounters::incr(&counters.controls_failed);
            tracing::warn!(
                node = %command.node,
                enabled = command.enabled,
                error = %e,
                hardware = unapplied_outcome(command.enabled),
                "failed to send transmit chain command, not retried until the next transition"
            );
        }
    }
}

/// What the radio is left doing when a command for `enabled` never lands.
pub fn unapplied_outcome(enabled: bool) -> &'static str {
    if enabled {
        "transmit chain may still be powered down while the node is reported active"
    } else {
        "transmit chain may still be powered up while the node is reported in deep sleep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::test_util::{BlockingRic, RecordingRic};

    fn command(nb_id: u32, enabled: bool) -> ControlCommand {
        ControlCommand {
            node: NodeId::gnb(nb_id),
            enabled,
        }
    }

    #[test]
    fn inline_sends_immediately() {
        let ric = Arc::new(RecordingRic::new());
        let counters = Arc::new(EngineCounters::new());
        let dispatcher = ControlDispatcher::inline(ControlEmitter::new(ric.clone()), counters.clone());

        dispatcher.dispatch(command(1, false)).unwrap();
        assert_eq!(ric.controls().len(), 1);
        assert_eq!(counters.snapshot().controls_sent, 1);
    }

    #[test]
    fn worker_preserves_order_and_flushes() {
        let ric = Arc::new(RecordingRic::new());
        let counters = Arc::new(EngineCounters::new());
        let dispatcher =
            ControlDispatcher::spawn(ControlEmitter::new(ric.clone()), counters.clone(), 16).unwrap();

        dispatcher.dispatch(command(1, false)).unwrap();
        dispatcher.dispatch(command(1, true)).unwrap();
        dispatcher.dispatch(command(2, false)).unwrap();
        dispatcher.flush();

        let sent: Vec<_> = ric
            .controls()
            .iter()
            .map(|c| (c.node.nb_id, c.request.transmit_chain_enabled()))
            .collect();
        assert_eq!(sent, vec![(1, Some(false)), (1, Some(true)), (2, Some(false))]);
        assert_eq!(counters.snapshot().controls_sent, 3);
    }

    #[test]
    fn send_failures_are_counted() {
        let ric = Arc::new(RecordingRic::new());
        ric.fail_controls(true);
        let counters = Arc::new(EngineCounters::new());
        let dispatcher = ControlDispatcher::inline(ControlEmitter::new(ric.clone()), counters.clone());

        assert!(dispatcher.dispatch(command(1, false)).is_ok());
        let snap = counters.snapshot();
        assert_eq!(snap.controls_sent, 0);
        assert_eq!(snap.controls_failed, 1);
    }

    #[test]
    fn dispatch_after_shutdown_is_rejected() {
        let ric = Arc::new(RecordingRic::new());
        let counters = Arc::new(EngineCounters::new());
        let dispatcher =
            ControlDispatcher::spawn(ControlEmitter::new(ric.clone()), counters.clone(), 4).unwrap();

        dispatcher.dispatch(command(1, false)).unwrap();
        dispatcher.shutdown();
        // Queued work is drained before the worker exits.
        assert_eq!(ric.controls().len(), 1);

        assert_eq!(
            dispatcher.dispatch(command(1, true)),
            Err(DispatchError::Disconnected)
        );
        assert_eq!(counters.snapshot().controls_dropped, 1);
        dispatcher.shutdown();
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let ric = Arc::new(BlockingRic::new());
        let counters = Arc::new(EngineCounters::new());
        let dispatcher =
            ControlDispatcher::spawn(ControlEmitter::new(ric.clone()), counters.clone(), 1).unwrap();

        // The worker takes the first command and parks inside send_control.
        dispatcher.dispatch(command(1, false)).unwrap();
        assert_eq!(ric.wait_for_send(Duration::from_secs(5)), Some(NodeId::gnb(1)));

        // One slot left in the queue, then it is full.
        dispatcher.dispatch(command(2, false)).unwrap();
        let started = Instant::now();
        assert_eq!(dispatcher.dispatch(command(3, false)), Err(DispatchError::Full));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(counters.snapshot().controls_dropped, 1);

        ric.open();
        dispatcher.flush();
        let sent: Vec<_> = ric.controls().iter().map(|c| c.node.nb_id).collect();
        assert_eq!(sent, vec![1, 2]);
        let snap = counters.snapshot();
        assert_eq!(snap.controls_sent, 2);
        assert_eq!(snap.controls_dropped, 1);
        dispatcher.shutdown();
    }

    #[test]
    fn unapplied_outcome_names_the_stale_power_state() {
        assert!(unapplied_outcome(true).contains("powered down"));
        assert!(unapplied_outcome(true).contains("reported active"));
        assert!(unapplied_outcome(false).contains("powered up"));
        assert!(unapplied_outcome(false).contains("deep sleep"));
    }
}
