//! Property-based tests for the deep-sleep state machine.
//!
//! Random indication streams are folded through `EnergySaveState::apply`
//! and checked against the idle-tracking, gating and counting rules.

use deepsleep_engine::extract::SchedulingSummary;
use deepsleep_engine::state::{EnergySaveState, Policy, PowerState, Transition};
use proptest::prelude::*;

// ─── Strategies ──────────────────────────────────────────────────────────────

fn summary() -> impl Strategy<Value = SchedulingSummary> {
    (any::<bool>(), 0u32..4).prop_map(|(pdsch, failing_users)| SchedulingSummary {
        pdsch_scheduled: pdsch,
        harq_failure: failing_users > 0,
        failing_users,
    })
}

/// Indications as (gap since previous in µs, summary).
fn stream() -> impl Strategy<Value = Vec<(u64, SchedulingSummary)>> {
    prop::collection::vec((0u64..200_000, summary()), 1..200)
}

proptest! {
    #[test]
    fn idle_since_fixed_while_idle(start in 0u64..1_000_000, gaps in prop::collection::vec(1u64..100_000, 1..50)) {
        let mut state = EnergySaveState::new();
        let policy = Policy::default();
        let mut t = start;
        state.apply(t, &SchedulingSummary::IDLE, &policy);
        prop_assert_eq!(state.idle_since_us(), Some(start));
        for gap in gaps {
            t += gap;
            state.apply(t, &SchedulingSummary::IDLE, &policy);
            prop_assert_eq!(state.idle_since_us(), Some(start));
        }
    }

    #[test]
    fn invariants_hold_over_random_streams(events in stream()) {
        let mut state = EnergySaveState::new();
        let policy = Policy::default();
        let mut t = 0u64;
        let mut entries = 0u32;

        for (gap, s) in events {
            t += gap;
            let before = state.clone();
            let transition = state.apply(t, &s, &policy);

            // Power flags are complementary.
            prop_assert_ne!(state.tx_active(), state.deep_sleep_active());

            // Idle tracking.
            if s.pdsch_scheduled {
                prop_assert_eq!(state.idle_since_us(), None);
                prop_assert_eq!(state.last_activity_us(), Some(t));
            } else {
                let expected = before.idle_since_us().unwrap_or(t);
                prop_assert_eq!(state.idle_since_us(), Some(expected));
            }

            match transition {
                Some(Transition::EnterDeepSleep { idle_us, cycle }) => {
                    entries += 1;
                    prop_assert_eq!(before.power(), PowerState::Active);
                    prop_assert!(idle_us >= policy.idle_timeout_us());
                    prop_assert_eq!(state.failure_count(), 0);
                    prop_assert_eq!(cycle, before.cycle_count() + 1);
                }
                Some(Transition::ExitDeepSleep { .. }) => {
                    prop_assert_eq!(before.power(), PowerState::DeepSleep);
                    prop_assert!(s.pdsch_scheduled);
                    prop_assert_eq!(state.failure_count(), 0);
                    prop_assert_eq!(state.cycle_count(), before.cycle_count());
                }
                None => {
                    prop_assert_eq!(state.power(), before.power());
                    prop_assert_eq!(state.cycle_count(), before.cycle_count());
                    prop_assert_eq!(
                        state.failure_count(),
                        before.failure_count().saturating_add(s.failing_users)
                    );
                }
            }
        }
        prop_assert_eq!(state.cycle_count(), entries);
    }

    #[test]
    fn repeated_steady_indications_are_silent(busy in any::<bool>(), n in 1usize..100) {
        let mut state = EnergySaveState::new();
        let policy = Policy::default();
        // Reach a steady state first: busy keeps ACTIVE, idle settles in
        // DEEP_SLEEP after the timeout.
        let s = SchedulingSummary {
            pdsch_scheduled: busy,
            harq_failure: false,
            failing_users: 0,
        };
        state.apply(0, &s, &policy);
        state.apply(policy.idle_timeout_us(), &s, &policy);
        let settled = state.power();
        let cycles = state.cycle_count();

        let mut t = policy.idle_timeout_us();
        for _ in 0..n {
            t += 1_000;
            prop_assert!(state.apply(t, &s, &policy).is_none());
        }
        prop_assert_eq!(state.power(), settled);
        prop_assert_eq!(state.cycle_count(), cycles);
    }

    #[test]
    fn any_failure_before_timeout_blocks_entry(fail_at in 0u64..500_000, users in 1u32..5) {
        let mut state = EnergySaveState::new();
        let policy = Policy::default();
        state.apply(0, &SchedulingSummary::IDLE, &policy);
        let failing = SchedulingSummary {
            pdsch_scheduled: false,
            harq_failure: true,
            failing_users: users,
        };
        state.apply(fail_at, &failing, &policy);
        let mut t = fail_at;
        while t < 3_000_000 {
            t += 50_000;
            prop_assert!(state.apply(t, &SchedulingSummary::IDLE, &policy).is_none());
        }
        prop_assert_eq!(state.failure_count(), users);
    }
}
