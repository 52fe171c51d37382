#![forbid(unsafe_code)]

//! DOM-shaped mouse event records for script hosts.
//!
//! A host that lives in a browser or a script engine sees `MouseEvent`
//! objects, not [`InputEvent`] values. [`DomMouseEvent`] mirrors the fields
//! of a DOM `MouseEvent` / `MouseEventInit` one to one, so such a host can
//! hand its events over without interpreting them, and can turn a forwarded
//! copy back into an init dictionary for `dispatchEvent`.

use std::fmt;

use web_time::Duration;

use crate::document::NodeId;
use crate::event::{Buttons, EventId, EventKind, InputEvent, Modifiers, MouseButton};
use crate::geometry::Point;

/// A DOM mouse event as a script host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "camelCase"))]
pub struct DomMouseEvent {
    /// `mousedown`, `mouseup` or `mousemove`.
    #[cfg_attr(feature = "config", serde(rename = "type"))]
    pub event_type: String,
    pub button: i16,
    pub buttons: u16,
    pub client_x: i32,
    pub client_y: i32,
    pub screen_x: i32,
    pub screen_y: i32,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    pub detail: u32,
    /// `Event.timeStamp`, in milliseconds.
    pub time_stamp: u64,
    pub bubbles: bool,
    pub cancelable: bool,
}

/// Why a [`DomMouseEvent`] could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEventError {
    UnknownType(String),
    UnknownButton(i16),
}

impl fmt::Display for DomEventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(kind) => write!(f, "unsupported mouse event type {kind:?}"),
            Self::UnknownButton(button) => write!(f, "unknown mouse button {button}"),
        }
    }
}

impl std::error::Error for DomEventError {}

impl EventKind {
    /// Parse a DOM event type name.
    #[must_use]
    pub fn from_dom(name: &str) -> Option<Self> {
        match name {
            "mousedown" => Some(Self::PointerDown),
            "mouseup" => Some(Self::PointerUp),
            "mousemove" => Some(Self::PointerMove),
            _ => None,
        }
    }
}

impl DomMouseEvent {
    /// Capture this record as an [`InputEvent`] delivered to `target`.
    pub fn to_input(&self, id: EventId, target: NodeId) -> Result<InputEvent, DomEventError> {
        let kind = EventKind::from_dom(&self.event_type)
            .ok_or_else(|| DomEventError::UnknownType(self.event_type.clone()))?;
        let button =
            MouseButton::from_dom(self.button).ok_or(DomEventError::UnknownButton(self.button))?;

        let mut modifiers = Modifiers::NONE;
        modifiers.set(Modifiers::CTRL, self.ctrl_key);
        modifiers.set(Modifiers::SHIFT, self.shift_key);
        modifiers.set(Modifiers::ALT, self.alt_key);
        modifiers.set(Modifiers::META, self.meta_key);

        let mut event = InputEvent::new(id, kind, button, Point::new(self.client_x, self.client_y), target)
            .with_buttons(Buttons::from_bits_truncate(self.buttons as u8))
            .with_screen(Point::new(self.screen_x, self.screen_y))
            .with_modifiers(modifiers)
            .with_detail(self.detail)
            .at(Duration::from_millis(self.time_stamp));
        event.bubbles = self.bubbles;
        event.cancelable = self.cancelable;
        Ok(event)
    }

    /// The init dictionary that re-creates `event` in the DOM.
    #[must_use]
    pub fn from_input(event: &InputEvent) -> Self {
        Self {
            event_type: event.kind.as_str().to_owned(),
            button: event.button.dom_index(),
            buttons: u16::from(event.buttons.bits()),
            client_x: event.client.x,
            client_y: event.client.y,
            screen_x: event.screen.x,
            screen_y: event.screen.y,
            ctrl_key: event.modifiers.contains(Modifiers::CTRL),
            shift_key: event.modifiers.contains(Modifiers::SHIFT),
            alt_key: event.modifiers.contains(Modifiers::ALT),
            meta_key: event.modifiers.contains(Modifiers::META),
            detail: event.detail,
            time_stamp: u64::try_from(event.timestamp.as_millis()).unwrap_or(u64::MAX),
            bubbles: event.bubbles,
            cancelable: event.cancelable,
        }
    }
}
