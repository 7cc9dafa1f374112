//! Periodic background work for one chip.
//!
//! Every chip owns a [`Scheduler`]: an ordered list of [`Job`]s that a
//! single worker runs once per tick (about every millisecond). Jobs are
//! registered by port configuration: a receive drain for each buffered port,
//! and an IRQ-line poll when the chip has an IRQ pin.
//!
//! There is no real interrupt handler. On hosts without threads, call
//! [`Sc16is7xx::tick()`](crate::Sc16is7xx::tick) from a periodic task; with
//! the `std` feature, [`Sc16is7xx::spawn_worker()`](crate::Sc16is7xx::spawn_worker)
//! starts a thread that does it.

use alloc::vec::Vec;
#[cfg(any(test, feature = "std"))]
use core::sync::atomic::{AtomicBool, Ordering};

use crate::registers::Channel;

/// Worker tick period in milliseconds.
pub const TICK_PERIOD_MS: u32 = 1;

/// One unit of periodic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Read the IRQ pin and, if asserted, service IIR on every port.
    PollIrq,
    /// Move bytes from the chip's RX FIFO into the port's ring buffer.
    DrainReceive(Channel),
}

/// Registered jobs, run in registration order.
#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
    #[cfg(any(test, feature = "std"))]
    started: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `job` unless it is already registered. Returns whether it was
    /// added.
    pub fn register(&mut self, job: Job) -> bool {
        if self.jobs.contains(&job) {
            return false;
        }
        log::debug!("scheduler: registered {:?}", job);
        self.jobs.push(job);
        true
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Claim the right to start the background thread. Succeeds once, and
    /// only after a job exists.
    #[cfg(any(test, feature = "std"))]
    pub(crate) fn claim_start(&self) -> bool {
        !self.jobs.is_empty() && !self.started.swap(true, Ordering::AcqRel)
    }
}

/// Cooperative pause inside busy-wait loops.
pub(crate) fn relax() {
    #[cfg(any(test, feature = "std"))]
    std::thread::yield_now();
    #[cfg(not(any(test, feature = "std")))]
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_keeps_order_and_skips_duplicates() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.is_empty());
        assert!(scheduler.register(Job::PollIrq));
        assert!(scheduler.register(Job::DrainReceive(Channel::A)));
        assert!(scheduler.register(Job::DrainReceive(Channel::B)));
        assert!(!scheduler.register(Job::DrainReceive(Channel::A)));
        assert!(!scheduler.register(Job::PollIrq));

        assert_eq!(
            scheduler.jobs(),
            &[
                Job::PollIrq,
                Job::DrainReceive(Channel::A),
                Job::DrainReceive(Channel::B)
            ]
        );
    }

    #[test]
    fn start_is_claimed_once_and_only_with_jobs() {
        let mut scheduler = Scheduler::new();
        assert!(!scheduler.claim_start());
        scheduler.register(Job::PollIrq);
        assert!(scheduler.claim_start());
        assert!(!scheduler.claim_start());
    }
}
