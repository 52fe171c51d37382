#![forbid(unsafe_code)]

//! Single-shot timers driven by host time.
//!
//! The engine never sleeps. The host reports the current time on every
//! event and through [`Engine::advance_to`](crate::Engine::advance_to);
//! [`TimerQueue::advance_to`] hands back every timer whose deadline has
//! passed, in deadline order.
//!
//! # Invariants
//!
//! - A timer fires at most once.
//! - [`TimerQueue::cancel`] is idempotent: cancelling an unknown, fired or
//!   already cancelled handle returns `false` and changes nothing.
//! - Time never moves backwards; an earlier `now` is ignored.

use std::collections::BTreeMap;

use web_time::Duration;

/// Identity of one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Raw identifier, for log fields.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Pending single-shot timers carrying a payload `T`.
#[derive(Debug)]
pub struct TimerQueue<T> {
    /// Keyed by `(deadline, handle)` so equal deadlines fire in schedule order.
    pending: BTreeMap<(Duration, TimerHandle), T>,
    deadlines: BTreeMap<TimerHandle, Duration>,
    next: u64,
    now: Duration,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            deadlines: BTreeMap::new(),
            next: 0,
            now: Duration::ZERO,
        }
    }

    /// Latest time observed.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Number of timers that have neither fired nor been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    /// Whether `handle` is still pending.
    #[must_use]
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    /// Schedule `payload` to fire once `now` reaches `deadline`.
    pub fn schedule_at(&mut self, deadline: Duration, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next);
        self.next += 1;
        self.pending.insert((deadline, handle), payload);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Cancel a pending timer. Returns `false` if it was not pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(deadline) => self.pending.remove(&(deadline, handle)).is_some(),
            None => false,
        }
    }

    /// Move time forward and collect every timer due at or before `now`.
    pub fn advance_to(&mut self, now: Duration) -> Vec<(TimerHandle, T)> {
        if now > self.now {
            self.now = now;
        }
        let mut fired = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (deadline, handle) = *entry.key();
            if deadline > self.now {
                break;
            }
            let payload = entry.remove();
            self.deadlines.remove(&handle);
            fired.push((handle, payload));
        }
        fired
    }

    /// Cancel everything. Returns how many timers were pending.
    pub fn clear(&mut self) -> usize {
        let count = self.deadlines.len();
        self.pending.clear();
        self.deadlines.clear();
        count
    }
}
