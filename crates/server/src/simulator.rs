//! Incremental, timed reading of a well selection.
//!
//! The simulator itself is clock-free: the owning session drives [`ReadSimulator::tick`]
//! once per read interval and stops rescheduling when the outcome is not `Continue`.

use std::collections::VecDeque;

use shared::domain::WellId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A well was read and more remain; schedule another tick.
    Continue,
    /// The last queued well was read; the simulator stopped itself.
    Finished,
    /// Nothing happened (stopped, or the queue was already empty).
    Idle,
}

#[derive(Debug, Default)]
pub struct ReadSimulator {
    queue: VecDeque<WellId>,
    read: Vec<WellId>,
    continue_read: bool,
}

impl ReadSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the read set and queues `wells` in order. Any running tick chain
    /// observes the cleared continuation flag and ends.
    pub fn init_run(&mut self, wells: Vec<WellId>) {
        self.continue_read = false;
        self.read.clear();
        self.queue = wells.into();
    }

    pub fn start(&mut self) {
        self.continue_read = true;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.continue_read {
            return TickOutcome::Idle;
        }
        let Some(well) = self.queue.pop_front() else {
            return TickOutcome::Idle;
        };
        self.read.push(well);

        if self.queue.is_empty() {
            self.stop();
            TickOutcome::Finished
        } else {
            TickOutcome::Continue
        }
    }

    pub fn stop(&mut self) {
        self.continue_read = false;
    }

    pub fn is_reading(&self) -> bool {
        self.continue_read && !self.queue.is_empty()
    }

    pub fn continue_read(&self) -> bool {
        self.continue_read
    }

    pub fn read_wells(&self) -> &[WellId] {
        &self.read
    }

    pub fn queued_wells(&self) -> impl Iterator<Item = &WellId> {
        self.queue.iter()
    }

    /// Next well the instrument will read, if a read is in progress.
    pub fn current_well(&self) -> Option<WellId> {
        self.queue.front().copied().filter(|_| self.continue_read)
    }
}

#[cfg(test)]
#[path = "tests/simulator_tests.rs"]
mod tests;
