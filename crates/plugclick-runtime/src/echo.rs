#![forbid(unsafe_code)]

//! Recognition of synthesized clicks coming back as host events.
//!
//! The OS delivers a synthesized press and release asynchronously, usually
//! after the [`ConfirmGate`](crate::gate::ConfirmGate) has been released.
//! Every delivered click is remembered here until both of its halves have
//! come back or the expectation expires. A secondary-button press or
//! release near a remembered point is that echo and must not arm a new
//! session.

use std::collections::VecDeque;

use plugclick_core::config::EngineConfig;
use plugclick_core::event::{EventKind, InputEvent, MouseButton};
use plugclick_core::geometry::Point;
use web_time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Expected {
    at: Point,
    expires: Duration,
    press_seen: bool,
    release_seen: bool,
}

/// Outstanding echoes of delivered synthesized clicks.
#[derive(Debug)]
pub struct EchoFilter {
    expected: VecDeque<Expected>,
    window: Duration,
    threshold: u32,
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl EchoFilter {
    /// Echoes are expected for one gesture window, within the distance
    /// threshold of the synthesized point.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            expected: VecDeque::new(),
            window: config.gesture_window(),
            threshold: config.distance_threshold,
        }
    }

    /// Expect the echo of a click synthesized at `at` at time `now`.
    pub fn expect(&mut self, at: Point, now: Duration) {
        self.expected.push_back(Expected {
            at,
            expires: now.saturating_add(self.window),
            press_seen: false,
            release_seen: false,
        });
    }

    /// Number of clicks whose echo has not fully come back.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.expected.len()
    }

    /// Consume `event` if it is half of an expected echo.
    ///
    /// Expectations older than the event are dropped first.
    pub fn absorb(&mut self, event: &InputEvent) -> bool {
        self.expected.retain(|expected| expected.expires >= event.timestamp);
        if event.button != MouseButton::Secondary {
            return false;
        }
        let threshold = self.threshold;
        let slot = self.expected.iter().position(|expected| {
            expected.at.within(event.client, threshold)
                && match event.kind {
                    EventKind::PointerDown => !expected.press_seen,
                    EventKind::PointerUp => expected.press_seen && !expected.release_seen,
                    EventKind::PointerMove => false,
                }
        });
        let Some(slot) = slot else {
            return false;
        };
        let expected = &mut self.expected[slot];
        match event.kind {
            EventKind::PointerDown => expected.press_seen = true,
            EventKind::PointerUp => expected.release_seen = true,
            EventKind::PointerMove => {}
        }
        if expected.release_seen {
            self.expected.remove(slot);
        }
        true
    }

    /// Forget every expectation. Returns how many were outstanding.
    pub fn clear(&mut self) -> usize {
        let count = self.expected.len();
        self.expected.clear();
        count
    }
}
