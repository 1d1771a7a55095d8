//! In-process [`Clock`] implementation.
//!
//! A 30-step cycle overlaid with a 4-phase hold pattern:
//!
//! | Phase | Steps (first cycle) | holdA | holdB |
//! |-------|---------------------|-------|-------|
//! | 1 | 1, 5, 9, ... | no | no |
//! | 2 | 2, 6, 10, ... | yes | no |
//! | 3 | 3, 7, 11, ... | no | yes |
//! | 4 | 4, 8, 12, ... | no | no |
//!
//! Both the step and the phase are derived from one tick counter, so a
//! reading never pairs a step with another tick's phase. The pattern does not
//! restart when the step wraps from 30 back to 1.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{CancellationToken, Clock, ClockReading, ClockStep, GatingState};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Steps in one full cycle.
pub const CYCLE_LENGTH: u32 = 30;

/// Steps in one hold pattern.
pub const HOLD_PATTERN_LENGTH: u64 = 4;

/// A manually or periodically advanced step clock.
#[derive(Debug)]
pub struct StepClock {
    ticks: AtomicU64,
}

impl StepClock {
    /// Creates a clock at step 1, hold phase 1.
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advances one step and returns the new reading.
    pub fn advance(&self) -> ClockReading {
        let ticks = self.ticks.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let reading = reading_for_tick(ticks);
        trace!(step = %reading.step, hold_a = reading.gating.hold_a, hold_b = reading.gating.hold_b, "clock advanced");
        reading
    }

    /// Spawns a task that advances the clock every `period` until `cancel`
    /// fires.
    pub fn spawn_ticker(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.advance();
                    }
                }
            }
            debug!("step clock ticker stopped");
        })
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StepClock {
    fn current_state(&self) -> ClockReading {
        reading_for_tick(self.ticks.load(Ordering::SeqCst))
    }

    fn current_step(&self) -> ClockStep {
        step_for_tick(self.ticks.load(Ordering::SeqCst))
    }
}

fn reading_for_tick(ticks: u64) -> ClockReading {
    ClockReading {
        step: step_for_tick(ticks),
        gating: gating_for_tick(ticks),
    }
}

fn step_for_tick(ticks: u64) -> ClockStep {
    // The remainder is below CYCLE_LENGTH, so it fits in u32.
    ClockStep::new((ticks % u64::from(CYCLE_LENGTH)) as u32 + 1)
}

fn gating_for_tick(ticks: u64) -> GatingState {
    match ticks % HOLD_PATTERN_LENGTH {
        1 => GatingState::new(true, false),
        2 => GatingState::new(false, true),
        _ => GatingState::default(),
    }
}

#[cfg(test)]
mod tests {
    use pipeline::CancellationSource;

    use super::*;

    #[test]
    fn starts_at_step_one_without_holds() {
        let clock = StepClock::new();
        let reading = clock.current_state();
        assert_eq!(reading.step, ClockStep::new(1));
        assert_eq!(reading.gating, GatingState::default());
    }

    #[test]
    fn hold_pattern_repeats_every_four_steps() {
        let clock = StepClock::new();
        let pattern: Vec<_> = (0..8).map(|_| clock.advance().gating).collect();
        let none = GatingState::default();
        let a = GatingState::new(true, false);
        let b = GatingState::new(false, true);
        assert_eq!(pattern, vec![a, b, none, none, a, b, none, none]);
    }

    #[test]
    fn step_wraps_after_thirty() {
        let clock = StepClock::new();
        for _ in 0..29 {
            clock.advance();
        }
        assert_eq!(clock.current_step(), ClockStep::new(30));
        assert_eq!(clock.advance().step, ClockStep::new(1));
    }

    #[test]
    fn advance_reading_matches_the_published_state() {
        let clock = StepClock::new();
        for _ in 0..(2 * CYCLE_LENGTH) {
            let reading = clock.advance();
            assert_eq!(clock.current_state(), reading);
            assert_eq!(clock.current_step(), reading.step);
        }
    }

    #[test]
    fn concurrent_advances_never_tear_step_from_phase() {
        let clock = Arc::new(StepClock::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        clock.advance();
                    }
                })
            })
            .collect();

        // The step cycle (30) and hold pattern (4) share every even tick, so a
        // consistent reading has holdA only on even steps and holdB only on odd.
        for _ in 0..10_000 {
            let reading = clock.current_state();
            let odd = reading.step.as_u32() % 2 == 1;
            assert!(!reading.gating.hold_a || !odd, "holdA on step {}", reading.step);
            assert!(!reading.gating.hold_b || odd, "holdB on step {}", reading.step);
        }
        for writer in writers {
            writer.join().unwrap();
        }

        let settled = clock.current_state();
        assert_eq!(settled.step, ClockStep::new(4_000 % CYCLE_LENGTH + 1));
        assert_eq!(settled.gating, GatingState::default());
    }

    #[tokio::test]
    async fn ticker_advances_until_cancelled() {
        let clock = Arc::new(StepClock::new());
        let source = CancellationSource::new();
        let handle = Arc::clone(&clock).spawn_ticker(Duration::from_millis(5), source.token());

        tokio::time::sleep(Duration::from_millis(60)).await;
        source.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ticker should stop after cancel")
            .unwrap();

        let stopped_at = clock.current_step();
        assert!(stopped_at.as_u32() > 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(clock.current_step(), stopped_at);
    }
}
