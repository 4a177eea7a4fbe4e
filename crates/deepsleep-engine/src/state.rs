//! # Deep-Sleep Decision State Machine
//!
//! One [`EnergySaveState`] per monitored node. Each MAC indication is folded
//! in with [`EnergySaveState::apply`], which returns the transition to act
//! on, if any.
//!
//! ```text
//!            idle >= timeout && failures <= max
//!   ACTIVE ─────────────────────────────────────▶ DEEP_SLEEP
//!      ▲                                              │
//!      └──────────────── PDSCH scheduled ─────────────┘
//!                     (failure count cleared)
//! ```
//!
//! The HARQ failure count only ever resets on the DEEP_SLEEP → ACTIVE edge.
//! With the default zero tolerance, a single retransmission seen while
//! ACTIVE blocks entry for as long as the node stays ACTIVE.

use crate::config::ConfigError;
use crate::extract::SchedulingSummary;

/// Idle time without PDSCH before the transmit chain may be powered down.
pub const DEFAULT_IDLE_TIMEOUT_US: u64 = 500_000;

/// HARQ failures tolerated before entry is blocked.
pub const DEFAULT_MAX_HARQ_FAILURES: u32 = 0;

/// Thresholds for the deep-sleep heuristic.
///
/// `idle_timeout_us` is never zero. Idle duration reads as zero while PDSCH
/// is flowing, so a zero timeout would admit entry during activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    idle_timeout_us: u64,
    max_harq_failures: u32,
}

impl Policy {
    pub fn new(idle_timeout_us: u64, max_harq_failures: u32) -> Result<Self, ConfigError> {
        if idle_timeout_us == 0 {
            return Err(ConfigError::Invalid {
                field: "policy.idle_timeout_us",
                reason: "must be greater than zero",
            });
        }
        Ok(Policy {
            idle_timeout_us,
            max_harq_failures,
        })
    }

    /// Inclusive idle duration required for entry, in microseconds.
    pub fn idle_timeout_us(&self) -> u64 {
        self.idle_timeout_us
    }

    /// Entry is allowed while `failure_count <= max_harq_failures`.
    pub fn max_harq_failures(&self) -> u32 {
        self.max_harq_failures
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            idle_timeout_us: DEFAULT_IDLE_TIMEOUT_US,
            max_harq_failures: DEFAULT_MAX_HARQ_FAILURES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PowerState {
    /// Transmit chain powered.
    #[default]
    Active,
    /// Transmit chain powered down.
    DeepSleep,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Active => "active",
            PowerState::DeepSleep => "deep_sleep",
        }
    }
}

/// A state change the caller must act on by commanding the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// ACTIVE → DEEP_SLEEP; disable the transmit chain.
    EnterDeepSleep {
        /// Idle duration that satisfied the timeout.
        idle_us: u64,
        /// Deep-sleep cycle number, starting at 1.
        cycle: u32,
    },
    /// DEEP_SLEEP → ACTIVE; enable the transmit chain.
    ExitDeepSleep {
        /// Length of the deep-sleep period just ended.
        slept_us: u64,
        /// HARQ failures accumulated during the period, now cleared.
        failures_cleared: u32,
    },
}

impl Transition {
    /// The transmit-chain setting this transition calls for.
    pub fn tx_enabled(&self) -> bool {
        matches!(self, Transition::ExitDeepSleep { .. })
    }
}

/// Energy-saving state of a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnergySaveState {
    power: PowerState,
    last_activity_us: Option<u64>,
    idle_since_us: Option<u64>,
    failure_count: u32,
    cycle_count: u32,

    // Accounting only; never consulted by the policy.
    first_seen_us: Option<u64>,
    last_seen_us: Option<u64>,
    sleep_started_us: Option<u64>,
    closed_sleep_us: u64,
}

impl EnergySaveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one indication summary observed at `now_us` into the state.
    pub fn apply(
        &mut self,
        now_us: u64,
        summary: &SchedulingSummary,
        policy: &Policy,
    ) -> Option<Transition> {
        self.first_seen_us.get_or_insert(now_us);
        self.last_seen_us = Some(now_us);

        if summary.pdsch_scheduled {
            self.idle_since_us = None;
            self.last_activity_us = Some(now_us);
        } else if self.idle_since_us.is_none() {
            self.idle_since_us = Some(now_us);
        }

        if summary.harq_failure {
            self.failure_count = self.failure_count.saturating_add(summary.failing_users);
        }

        let idle_us = self.idle_for_us(now_us);

        match self.power {
            PowerState::Active
                if idle_us >= policy.idle_timeout_us
                    && self.failure_count <= policy.max_harq_failures =>
            {
                self.power = PowerState::DeepSleep;
                self.cycle_count = self.cycle_count.saturating_add(1);
                self.sleep_started_us = Some(now_us);
                Some(Transition::EnterDeepSleep {
                    idle_us,
                    cycle: self.cycle_count,
                })
            }
            PowerState::DeepSleep if self.idle_since_us.is_none() => {
                let slept_us = self
                    .sleep_started_us
                    .take()
                    .map(|start| now_us.saturating_sub(start))
                    .unwrap_or(0);
                self.closed_sleep_us = self.closed_sleep_us.saturating_add(slept_us);
                let failures_cleared = self.failure_count;
                self.power = PowerState::Active;
                self.failure_count = 0;
                Some(Transition::ExitDeepSleep {
                    slept_us,
                    failures_cleared,
                })
            }
            _ => None,
        }
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn tx_active(&self) -> bool {
        self.power == PowerState::Active
    }

    pub fn deep_sleep_active(&self) -> bool {
        self.power == PowerState::DeepSleep
    }

    /// Last time PDSCH was scheduled, if ever.
    pub fn last_activity_us(&self) -> Option<u64> {
        self.last_activity_us
    }

    /// Start of the current idle period, absent while PDSCH is flowing.
    pub fn idle_since_us(&self) -> Option<u64> {
        self.idle_since_us
    }

    /// Idle duration at `now_us`; zero while PDSCH is flowing.
    pub fn idle_for_us(&self, now_us: u64) -> u64 {
        self.idle_since_us
            .map(|since| now_us.saturating_sub(since))
            .unwrap_or(0)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Total time spent in deep sleep up to `now_us`, including the
    /// currently open period.
    pub fn total_sleep_us(&self, now_us: u64) -> u64 {
        let open = self
            .sleep_started_us
            .map(|start| now_us.saturating_sub(start))
            .unwrap_or(0);
        self.closed_sleep_us.saturating_add(open)
    }

    /// Time since the first indication was observed.
    pub fn observed_us(&self, now_us: u64) -> u64 {
        self.first_seen_us
            .map(|first| now_us.saturating_sub(first))
            .unwrap_or(0)
    }

    pub fn last_seen_us(&self) -> Option<u64> {
        self.last_seen_us
    }
}
