//! pacing.rs
//! Periodic release for the sampling, transmission and receive loops.
//! - absolute deadlines (`next += period`) so jitter does not accumulate into drift
//! - SpinSleeper for the final approach to each deadline
//! - long periods are slept in slices so a cleared `running` flag is seen promptly

use core_affinity::{get_core_ids, set_for_current};
use log::{error, info};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

/// Longest single sleep before `running` is checked again.
pub(crate) const SHUTDOWN_SLICE: Duration = Duration::from_millis(50);

/// Outcome of waiting for the next release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    OnTime,
    /// Woke after the deadline had already passed.
    Late,
    Stopped,
}

pub struct Pacer {
    period: Duration,
    next_deadline: Instant,
    sleeper: SpinSleeper,
    fire_now: bool,
}

impl Pacer {
    /// First release one period from now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now() + period)
    }

    /// First release right away.
    pub fn immediate(period: Duration) -> Self {
        let mut p = Self::starting_at(period, Instant::now() + period);
        p.fire_now = true;
        p
    }

    pub fn starting_at(period: Duration, first: Instant) -> Self {
        Self {
            period,
            next_deadline: first,
            sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
            fire_now: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Blocks until the next release (or until `running` goes false), then
    /// schedules the one after it.
    pub fn wait(&mut self, running: &AtomicBool) -> Release {
        if self.fire_now {
            self.fire_now = false;
            return if running.load(Ordering::Acquire) {
                Release::OnTime
            } else {
                Release::Stopped
            };
        }

        let mut now = Instant::now();
        if now > self.next_deadline {
            self.next_deadline += self.period;
            // a release that is more than one period behind is skipped, not replayed
            if self.next_deadline < now {
                self.next_deadline = now + self.period;
            }
            return if running.load(Ordering::Acquire) {
                Release::Late
            } else {
                Release::Stopped
            };
        }

        while now < self.next_deadline {
            if !running.load(Ordering::Acquire) {
                return Release::Stopped;
            }
            let remaining = self.next_deadline - now;
            self.sleeper.sleep(remaining.min(SHUTDOWN_SLICE));
            now = Instant::now();
        }

        self.next_deadline += self.period;
        if running.load(Ordering::Acquire) {
            Release::OnTime
        } else {
            Release::Stopped
        }
    }
}

/// Pins the calling thread to `core`, logging the outcome. Periodic tasks
/// call this first when a core is configured.
pub fn pin_current_thread(task: &str, core: usize) -> bool {
    let core_ids = get_core_ids().unwrap_or_default();
    match core_ids.get(core) {
        Some(core_id) => {
            if set_for_current(*core_id) {
                info!("[{}] pinned to core {}", task, core);
                true
            } else {
                error!("[{}] failed to pin to core {}", task, core);
                false
            }
        }
        None => {
            error!("[{}] core {} not found among available cores", task, core);
            false
        }
    }
}
