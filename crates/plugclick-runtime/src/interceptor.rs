#![forbid(unsafe_code)]

//! Press interception on plugin content.
//!
//! Plugin rendering surfaces swallow pointer events, so the page around
//! them never sees a press. The interceptor watches every press; for one
//! that lands on plugin content with simulation enabled it either forwards
//! a copy to the safe parent right away (any button but the secondary,
//! chorded or not) or suppresses the original and hands it to the
//! [`Disambiguator`](crate::disambiguator::Disambiguator), deferring the
//! forward until the gesture is classified.
//!
//! The simulation-enabled verdict is asked once per plugin element and
//! cached for the element's lifetime; the cache key carries the element's
//! generation, so a replaced element is asked again.

use ahash::AHashMap;
use plugclick_core::document::{NodeId, PluginSurfaceRef};
use plugclick_core::event::{EventId, EventKind, InputEvent, MouseButton};

use crate::disambiguator::SessionEnd;
use crate::listener::{ListenerHandle, ListenerKind, ListenerOwner, ListenerRegistry};

/// Verdict cache size above which stale entries are pruned.
pub const VERDICT_PRUNE_THRESHOLD: usize = 64;

/// One forwarded event, as dispatched to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub target: NodeId,
    pub event: EventId,
    pub kind: EventKind,
}

/// What the engine did with one host event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interception {
    /// The host must prevent default handling and stop propagation of the
    /// original event.
    pub suppress_original: bool,
    /// Forwarded copies, in dispatch order.
    pub dispatched: Vec<Dispatched>,
    /// A gesture session was armed for this press.
    pub armed: bool,
    /// Gesture sessions that ended while handling the event.
    pub ended: Vec<SessionEnd>,
}

impl Interception {
    /// Nothing happened: the event passes through untouched.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        !self.suppress_original && self.dispatched.is_empty() && !self.armed && self.ended.is_empty()
    }
}

/// How a press on enabled plugin content is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressPlan {
    /// Forward a copy to the safe parent now.
    Forward,
    /// Suppress the original and arm a gesture session.
    Defer,
}

impl PressPlan {
    /// Plan for `press`: defer secondary-button presses only.
    ///
    /// A press of another button is forwarded even while the secondary
    /// button is held; the engine aborts any session it chords with.
    #[must_use]
    pub fn for_press(press: &InputEvent) -> Self {
        if press.button == MouseButton::Secondary {
            Self::Defer
        } else {
            Self::Forward
        }
    }
}

/// Interceptor state: its listener and the per-element verdict cache.
#[derive(Debug, Default)]
pub struct Interceptor {
    listener: Option<ListenerHandle>,
    verdicts: AHashMap<PluginSurfaceRef, bool>,
}

impl Interceptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the document-wide press listener.
    pub fn attach(&mut self, listeners: &mut ListenerRegistry) {
        if self.listener.is_none() {
            self.listener =
                Some(listeners.subscribe(ListenerKind::PointerDown, ListenerOwner::Interceptor));
        }
    }

    /// Remove the press listener and forget every verdict.
    ///
    /// Returns the number of listeners removed.
    pub fn detach(&mut self, listeners: &mut ListenerRegistry) -> usize {
        self.verdicts.clear();
        self.listener
            .take()
            .map_or(0, |handle| usize::from(listeners.unsubscribe(handle)))
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Cached verdict for `surface`, if it was asked before.
    #[must_use]
    pub fn cached_verdict(&self, surface: &PluginSurfaceRef) -> Option<bool> {
        self.verdicts.get(surface).copied()
    }

    /// Store the verdict for `surface`. The first stored verdict wins.
    pub fn remember(&mut self, surface: PluginSurfaceRef, enabled: bool) -> bool {
        *self.verdicts.entry(surface).or_insert(enabled)
    }

    /// Number of cached verdicts.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.verdicts.len()
    }

    /// Every cached surface, for pruning.
    #[must_use]
    pub fn cached_surfaces(&self) -> Vec<PluginSurfaceRef> {
        self.verdicts.keys().copied().collect()
    }

    /// Drop the verdicts of `stale` surfaces.
    pub fn forget(&mut self, stale: &[PluginSurfaceRef]) {
        for surface in stale {
            self.verdicts.remove(surface);
        }
    }
}
