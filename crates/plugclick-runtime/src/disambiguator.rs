#![forbid(unsafe_code)]

//! Right-click versus gesture disambiguation.
//!
//! A secondary-button press on plugin content arms a [`GestureSession`]:
//! a single-shot timer for the gesture window plus move and release
//! listeners. The session ends in exactly one of these ways:
//!
//! ```text
//!            press (secondary)
//!                   │
//!                   ▼
//!   ┌──────────── Armed ─────────────┐
//!   │ move > threshold    timer fires│
//!   ▼                                ▼
//! Moved                          TimedOut
//!   release (secondary, same target)
//!     within threshold ──► Confirmed
//!     beyond threshold ──► ReleasedAway
//!   new secondary press on same element ──► Superseded
//!   any other button pressed on same element ──► Chorded
//!   teardown ──► Cancelled
//! ```
//!
//! Any other release (other button, other target) is ignored and the
//! session keeps waiting. Every exit cancels the timer and removes both
//! listeners, whether or not the timer already fired.
//!
//! This module only decides. The engine performs the forwarding and the
//! native confirm sequence for a [`ConfirmedClick`].

use std::fmt;

use ahash::AHashMap;
use plugclick_core::config::EngineConfig;
use plugclick_core::document::{NodeId, PluginSurfaceRef};
use plugclick_core::event::{InputEvent, MouseButton};
use plugclick_core::geometry::Point;
use plugclick_native::ConfirmReport;
use web_time::Duration;

use crate::listener::{ListenerHandle, ListenerKind, ListenerOwner, ListenerRegistry};
use crate::timer::{TimerHandle, TimerQueue};

/// Timer payload identifying one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub node: NodeId,
    pub serial: u64,
}

/// One armed right-button press.
#[derive(Debug, Clone)]
pub struct GestureSession {
    serial: u64,
    surface: PluginSurfaceRef,
    press: InputEvent,
    timer: TimerHandle,
    move_listener: ListenerHandle,
    up_listener: ListenerHandle,
}

impl GestureSession {
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    #[must_use]
    pub const fn surface(&self) -> PluginSurfaceRef {
        self.surface
    }

    /// The plugin element the press landed on.
    #[must_use]
    pub const fn target(&self) -> NodeId {
        self.surface.node()
    }

    /// Client coordinates of the press.
    #[must_use]
    pub const fn press_point(&self) -> Point {
        self.press.client
    }

    #[must_use]
    pub const fn press(&self) -> &InputEvent {
        &self.press
    }

    #[must_use]
    pub const fn timer(&self) -> TimerHandle {
        self.timer
    }

    #[must_use]
    pub const fn listeners(&self) -> [ListenerHandle; 2] {
        [self.move_listener, self.up_listener]
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Matching release within the threshold. `native` is the confirm
    /// sequence outcome, `None` when it was queued behind another one.
    Confirmed {
        at: Point,
        native: Option<ConfirmReport>,
    },
    /// The pointer moved beyond the threshold before release.
    Moved { to: Point },
    /// Matching release, but beyond the threshold.
    ReleasedAway { at: Point },
    /// The gesture window elapsed.
    TimedOut,
    /// A new secondary press on the same element replaced the session.
    Superseded,
    /// Another button was pressed on the element while the secondary
    /// button was held (a rocker chord).
    Chorded { button: MouseButton },
    /// Engine teardown.
    Cancelled,
    /// The element (or its safe parent) disappeared before forwarding.
    TargetLost,
}

impl EndReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Moved { .. } => "moved",
            Self::ReleasedAway { .. } => "released_away",
            Self::TimedOut => "timed_out",
            Self::Superseded => "superseded",
            Self::Chorded { .. } => "chorded",
            Self::Cancelled => "cancelled",
            Self::TargetLost => "target_lost",
        }
    }

    /// Whether the press resulted in a click reaching the page.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one terminal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub node: NodeId,
    pub serial: u64,
    pub reason: EndReason,
}

/// A press and release classified as a genuine click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedClick {
    pub node: NodeId,
    pub serial: u64,
    pub surface: PluginSurfaceRef,
    pub press: InputEvent,
    pub release: InputEvent,
}

impl ConfirmedClick {
    /// The session end this click turns into once the native step ran.
    #[must_use]
    pub fn end(&self, native: Option<ConfirmReport>) -> SessionEnd {
        SessionEnd {
            node: self.node,
            serial: self.serial,
            reason: EndReason::Confirmed {
                at: self.release.client,
                native,
            },
        }
    }

    /// The session end when forwarding failed.
    #[must_use]
    pub fn lost(&self) -> SessionEnd {
        SessionEnd {
            node: self.node,
            serial: self.serial,
            reason: EndReason::TargetLost,
        }
    }
}

/// Result of feeding a release to the disambiguator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// No session matched; the release passes through.
    Ignored,
    Confirmed(ConfirmedClick),
    Aborted(SessionEnd),
}

/// Owner of every live [`GestureSession`], at most one per element.
#[derive(Debug)]
pub struct Disambiguator {
    sessions: AHashMap<NodeId, GestureSession>,
    next_serial: u64,
    window: Duration,
    threshold: u32,
}

impl Default for Disambiguator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Disambiguator {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sessions: AHashMap::new(),
            next_serial: 0,
            window: config.gesture_window(),
            threshold: config.distance_threshold,
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn session(&self, node: NodeId) -> Option<&GestureSession> {
        self.sessions.get(&node)
    }

    /// Arm a session for a secondary-button `press` on `surface`.
    ///
    /// A session already armed on the same element is torn down first and
    /// returned as superseded.
    pub fn arm(
        &mut self,
        surface: PluginSurfaceRef,
        press: InputEvent,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Option<SessionEnd> {
        let node = surface.node();
        let superseded = self.end(node, EndReason::Superseded, timers, listeners);

        self.next_serial += 1;
        let serial = self.next_serial;
        let deadline = press.timestamp.saturating_add(self.window);
        let timer = timers.schedule_at(deadline, SessionKey { node, serial });
        let owner = ListenerOwner::Session(node);
        let move_listener = listeners.subscribe(ListenerKind::PointerMove, owner);
        let up_listener = listeners.subscribe(ListenerKind::PointerUp, owner);

        self.sessions.insert(
            node,
            GestureSession {
                serial,
                surface,
                press,
                timer,
                move_listener,
                up_listener,
            },
        );
        superseded
    }

    /// Abort the session on the press target when `press` is not a
    /// secondary-button press.
    ///
    /// A chord never becomes a session's press.
    pub fn on_chord(
        &mut self,
        press: &InputEvent,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Option<SessionEnd> {
        if press.button == MouseButton::Secondary {
            return None;
        }
        self.end(
            press.target,
            EndReason::Chorded {
                button: press.button,
            },
            timers,
            listeners,
        )
    }

    /// Abort every session the pointer has moved too far from.
    pub fn on_move(
        &mut self,
        event: &InputEvent,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Vec<SessionEnd> {
        let moved: Vec<NodeId> = self
            .sessions
            .iter()
            .filter(|(_, session)| !session.press_point().within(event.client, self.threshold))
            .map(|(node, _)| *node)
            .collect();
        moved
            .into_iter()
            .filter_map(|node| {
                self.end(node, EndReason::Moved { to: event.client }, timers, listeners)
            })
            .collect()
    }

    /// Classify a release.
    pub fn on_up(
        &mut self,
        event: &InputEvent,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Release {
        if event.button != MouseButton::Secondary {
            return Release::Ignored;
        }
        let Some(session) = self.sessions.remove(&event.target) else {
            return Release::Ignored;
        };
        teardown(&session, timers, listeners);

        if session.press_point().within(event.client, self.threshold) {
            Release::Confirmed(ConfirmedClick {
                node: event.target,
                serial: session.serial,
                surface: session.surface,
                press: session.press,
                release: event.clone(),
            })
        } else {
            Release::Aborted(SessionEnd {
                node: event.target,
                serial: session.serial,
                reason: EndReason::ReleasedAway { at: event.client },
            })
        }
    }

    /// Handle a fired gesture-window timer.
    ///
    /// A key whose session has already ended (or been replaced) is stale
    /// and ignored.
    pub fn on_timer(
        &mut self,
        key: SessionKey,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Option<SessionEnd> {
        let current = self.sessions.get(&key.node)?;
        if current.serial != key.serial {
            return None;
        }
        self.end(key.node, EndReason::TimedOut, timers, listeners)
    }

    /// End the session on `node`, if any, for `reason`.
    pub fn end(
        &mut self,
        node: NodeId,
        reason: EndReason,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Option<SessionEnd> {
        let session = self.sessions.remove(&node)?;
        teardown(&session, timers, listeners);
        Some(SessionEnd {
            node,
            serial: session.serial,
            reason,
        })
    }

    /// Cancel every live session.
    pub fn cancel_all(
        &mut self,
        timers: &mut TimerQueue<SessionKey>,
        listeners: &mut ListenerRegistry,
    ) -> Vec<SessionEnd> {
        let mut nodes: Vec<NodeId> = self.sessions.keys().copied().collect();
        nodes.sort_unstable();
        nodes
            .into_iter()
            .filter_map(|node| self.end(node, EndReason::Cancelled, timers, listeners))
            .collect()
    }
}

fn teardown(
    session: &GestureSession,
    timers: &mut TimerQueue<SessionKey>,
    listeners: &mut ListenerRegistry,
) {
    // The timer may already have fired; cancel is a no-op then.
    timers.cancel(session.timer);
    listeners.unsubscribe(session.move_listener);
    listeners.unsubscribe(session.up_listener);
}
