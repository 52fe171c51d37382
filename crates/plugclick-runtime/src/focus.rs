#![forbid(unsafe_code)]

//! Keeps plugin content from holding DOM focus.
//!
//! A plugin element that takes DOM focus also grabs native keyboard focus,
//! which breaks the host's shortcuts. When plugin content with simulation
//! enabled is focused, the engine records the native focused window, blurs
//! the element and restores native focus.

use crate::listener::{ListenerHandle, ListenerKind, ListenerOwner, ListenerRegistry};

/// Focus shield state: its listener and how often it acted.
#[derive(Debug, Default)]
pub struct FocusShield {
    listener: Option<ListenerHandle>,
    shielded: u64,
}

impl FocusShield {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, listeners: &mut ListenerRegistry) {
        if self.listener.is_none() {
            self.listener =
                Some(listeners.subscribe(ListenerKind::Focus, ListenerOwner::FocusShield));
        }
    }

    /// Returns the number of listeners removed.
    pub fn detach(&mut self, listeners: &mut ListenerRegistry) -> usize {
        self.listener
            .take()
            .map_or(0, |handle| usize::from(listeners.unsubscribe(handle)))
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Count one completed blur.
    pub fn record_shielded(&mut self) {
        self.shielded += 1;
    }

    /// Number of focus events the shield acted on.
    #[must_use]
    pub const fn shielded(&self) -> u64 {
        self.shielded
    }
}
