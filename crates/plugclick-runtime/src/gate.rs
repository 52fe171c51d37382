#![forbid(unsafe_code)]

//! Ownership of the in-flight native confirm sequence.
//!
//! At most one confirm sequence runs at a time. Whoever runs one holds the
//! [`ConfirmToken`]; while it is held, every event reaching the engine is
//! an echo of the sequence itself and is ignored. A confirmation requested
//! while the token is held is queued and runs, in request order, before
//! the token is released.
//!
//! The token clears the gate when dropped, so the gate is released on every
//! exit path, including unwinding out of the confirm call.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use plugclick_core::geometry::Point;

/// Serializes native confirm sequences.
#[derive(Debug, Default)]
pub struct ConfirmGate {
    current: Cell<Option<u64>>,
    serial: Cell<u64>,
    queue: RefCell<VecDeque<Point>>,
}

/// Proof that the caller owns the current confirm sequence.
#[derive(Debug)]
pub struct ConfirmToken<'a> {
    gate: &'a ConfirmGate,
    serial: u64,
}

impl ConfirmToken<'_> {
    /// Sequence number of this confirm operation.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }
}

impl Drop for ConfirmToken<'_> {
    fn drop(&mut self) {
        self.gate.current.set(None);
    }
}

/// What [`ConfirmGate::run`] did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<R> {
    /// The request ran, followed by every request queued meanwhile.
    Ran(Vec<R>),
    /// Another sequence was in flight; the request will run after it.
    Queued,
}

impl ConfirmGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a confirm sequence is in flight.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.current.get().is_some()
    }

    /// Sequence number of the in-flight operation.
    #[must_use]
    pub fn current(&self) -> Option<u64> {
        self.current.get()
    }

    /// Requests waiting behind the in-flight sequence.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Take the token, or `None` if it is already held.
    pub fn try_acquire(&self) -> Option<ConfirmToken<'_>> {
        if self.is_held() {
            return None;
        }
        let serial = self.serial.get() + 1;
        self.serial.set(serial);
        self.current.set(Some(serial));
        Some(ConfirmToken { gate: self, serial })
    }

    /// Run `op` for `at` under the token, then drain the queue.
    ///
    /// If the token is already held, `at` is queued instead and picked up
    /// by the holder before it releases.
    pub fn run<R>(&self, at: Point, mut op: impl FnMut(Point) -> R) -> GateOutcome<R> {
        let Some(token) = self.try_acquire() else {
            self.queue.borrow_mut().push_back(at);
            return GateOutcome::Queued;
        };
        let mut results = vec![op(at)];
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(point) = next else {
                break;
            };
            results.push(op(point));
        }
        drop(token);
        GateOutcome::Ran(results)
    }

    /// Drop queued requests. Returns how many were dropped.
    pub fn clear_queue(&self) -> usize {
        let mut queue = self.queue.borrow_mut();
        let count = queue.len();
        queue.clear();
        count
    }
}
