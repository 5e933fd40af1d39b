//! Timers on simulated time.
//!
//! Entries are keyed by their due time in simulated milliseconds. Clearing
//! the queue cancels everything at once and bumps an epoch, so handles
//! minted before the clear never compare equal to later ones.

use std::collections::BTreeMap;

/// Identity of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    epoch: u64,
}

/// What to do when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Close the relay auction of the agent at this roster index.
    CloseBidWindow { agent: usize },
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    // Map of due time (ms) -> timers due at that instant, in scheduling order
    queue: BTreeMap<u64, Vec<(TimerHandle, TimerEvent)>>,
    next_id: u64,
    epoch: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, event: TimerEvent) -> TimerHandle {
        let handle = TimerHandle { id: self.next_id, epoch: self.epoch };
        self.next_id += 1;
        self.queue.entry(due_ms).or_default().push((handle, event));
        handle
    }

    /// Drain every timer due at or before `now_ms`, earliest first.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<(TimerHandle, TimerEvent)> {
        let later = self.queue.split_off(&now_ms.saturating_add(1));
        let due = std::mem::replace(&mut self.queue, later);
        due.into_values().flatten().collect()
    }

    /// Drop every pending timer and invalidate all outstanding handles.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.epoch += 1;
    }

    pub fn len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
