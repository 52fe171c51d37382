#![forbid(unsafe_code)]

//! Canonical pointer event types.
//!
//! An [`InputEvent`] is captured once from the host and never mutated
//! afterwards. Forwarding produces a *new* event via
//! [`InputEvent::forwarded_to`] that carries the same coordinates, modifiers
//! and button state under a fresh identity.
//!
//! # Design Notes
//!
//! - Button numbering follows the DOM `MouseEvent.button` convention
//!   (0 primary, 1 auxiliary, 2 secondary, 3 back, 4 forward).
//! - [`Buttons`] mirrors `MouseEvent.buttons`, whose bit order differs from
//!   the button numbering (secondary is bit 1, auxiliary is bit 2).
//! - Timestamps are offsets on the host's monotonic clock.

use bitflags::bitflags;
use web_time::Duration;

use crate::document::NodeId;
use crate::geometry::Point;

/// Identity of one event instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// Pointer event phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    PointerUp,
    PointerMove,
}

impl EventKind {
    /// DOM event type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointerDown => "mousedown",
            Self::PointerUp => "mouseup",
            Self::PointerMove => "mousemove",
        }
    }
}

/// The button whose state changed for this event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    /// Left button on a right-handed mouse.
    #[default]
    Primary,
    /// Wheel click.
    Auxiliary,
    /// Right button on a right-handed mouse; opens context menus.
    Secondary,
    Back,
    Forward,
}

impl MouseButton {
    /// Parse a DOM `MouseEvent.button` value.
    #[must_use]
    pub const fn from_dom(button: i16) -> Option<Self> {
        match button {
            0 => Some(Self::Primary),
            1 => Some(Self::Auxiliary),
            2 => Some(Self::Secondary),
            3 => Some(Self::Back),
            4 => Some(Self::Forward),
            _ => None,
        }
    }

    /// DOM `MouseEvent.button` value.
    #[must_use]
    pub const fn dom_index(self) -> i16 {
        match self {
            Self::Primary => 0,
            Self::Auxiliary => 1,
            Self::Secondary => 2,
            Self::Back => 3,
            Self::Forward => 4,
        }
    }

    /// The [`Buttons`] bit corresponding to this button.
    #[must_use]
    pub const fn as_buttons(self) -> Buttons {
        match self {
            Self::Primary => Buttons::PRIMARY,
            Self::Auxiliary => Buttons::AUXILIARY,
            Self::Secondary => Buttons::SECONDARY,
            Self::Back => Buttons::BACK,
            Self::Forward => Buttons::FORWARD,
        }
    }
}

bitflags! {
    /// Buttons held while the event was generated (`MouseEvent.buttons`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u8 {
        const PRIMARY   = 0b0_0001;
        const SECONDARY = 0b0_0010;
        const AUXILIARY = 0b0_0100;
        const BACK      = 0b0_1000;
        const FORWARD   = 0b1_0000;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Modifier keys held during a pointer event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        /// Meta/Command/Windows key.
        const META  = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// One pointer event as observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub button: MouseButton,
    pub buttons: Buttons,
    /// Position relative to the viewport.
    pub client: Point,
    /// Position relative to the screen.
    pub screen: Point,
    pub modifiers: Modifiers,
    /// Click count for down/up events.
    pub detail: u32,
    /// Node the host delivered the event to.
    pub target: NodeId,
    /// Host monotonic time at capture.
    pub timestamp: Duration,
    pub bubbles: bool,
    pub cancelable: bool,
    /// True for events constructed by forwarding rather than by user input.
    pub synthetic: bool,
}

impl InputEvent {
    /// Create an event with host-typical defaults.
    ///
    /// `buttons` is derived from `kind`: a press holds its own button, a
    /// release or move holds nothing. Screen coordinates default to the
    /// client coordinates.
    #[must_use]
    pub const fn new(
        id: EventId,
        kind: EventKind,
        button: MouseButton,
        client: Point,
        target: NodeId,
    ) -> Self {
        let buttons = match kind {
            EventKind::PointerDown => button.as_buttons(),
            EventKind::PointerUp | EventKind::PointerMove => Buttons::empty(),
        };
        let detail = match kind {
            EventKind::PointerDown | EventKind::PointerUp => 1,
            EventKind::PointerMove => 0,
        };
        Self {
            id,
            kind,
            button,
            buttons,
            client,
            screen: client,
            modifiers: Modifiers::NONE,
            detail,
            target,
            timestamp: Duration::ZERO,
            bubbles: true,
            cancelable: true,
            synthetic: false,
        }
    }

    /// Set the held-buttons mask.
    #[must_use]
    pub const fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    /// Set screen coordinates.
    #[must_use]
    pub const fn with_screen(mut self, screen: Point) -> Self {
        self.screen = screen;
        self
    }

    /// Set modifier keys.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the click count.
    #[must_use]
    pub const fn with_detail(mut self, detail: u32) -> Self {
        self.detail = detail;
        self
    }

    /// Set the capture timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether the secondary button is among the held buttons.
    #[must_use]
    pub const fn holds_secondary(&self) -> bool {
        self.buttons.contains(Buttons::SECONDARY)
    }

    /// Build the forwarded copy of this event for dispatch at `target`.
    ///
    /// Everything observable by page handlers is preserved; only the
    /// identity, the target, and the `synthetic` marker change.
    #[must_use]
    pub fn forwarded_to(&self, id: EventId, target: NodeId) -> Self {
        Self {
            id,
            target,
            synthetic: true,
            ..self.clone()
        }
    }
}
