use std::time::Duration;

/// Timer events the spin widget schedules for itself. `spin` is the sequence
/// number of the spin that scheduled the event, so late events from an
/// earlier spin can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinTimer {
    SymbolTick { spin: u64 },
    SpinComplete { spin: u64 },
    ResultExpired { spin: u64 },
}

/// Deferred delivery of a [`SpinTimer`]. Implementations hand the event back
/// to the owner of the state machine once `delay` has elapsed.
pub trait Scheduler {
    fn schedule_after(&mut self, delay: Duration, timer: SpinTimer);
}

/// Fake clock for tests and simulations. Time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_order: u64,
    pending: Vec<(Duration, u64, SpinTimer)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Removes the earliest timer due at or before `until` and moves the
    /// clock to its due time. Ties fire in scheduling order.
    pub fn pop_due(&mut self, until: Duration) -> Option<SpinTimer> {
        let (position, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (due, _, _))| *due <= until)
            .min_by_key(|(_, (due, order, _))| (*due, *order))?;
        let (due, _, timer) = self.pending.remove(position);
        self.now = self.now.max(due);
        Some(timer)
    }

    /// Moves the clock to `until` without firing anything.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&mut self, delay: Duration, timer: SpinTimer) {
        let order = self.next_order;
        self.next_order += 1;
        self.pending.push((self.now + delay, order, timer));
    }
}
