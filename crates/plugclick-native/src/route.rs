#![forbid(unsafe_code)]

//! Routing of plugin-window input to the host window.
//!
//! Windowed plugins own a native child window, so the host never sees the
//! mouse and keyboard messages delivered to it. [`MessageRouter`] decides,
//! one message at a time, which of them the host needs and whether the
//! plugin may still have them. It is pure logic over the raw Win32 message
//! triple; the hook procedure in `win32` performs the posts it asks for.
//!
//! # What is routed
//!
//! - **Mouse gestures**: three recognizers watch for gestures that start
//!   over the plugin. While one may be starting, its messages are held
//!   back; once it triggers they go to the host (which runs its gesture
//!   handling), and if every recognizer gives up they are replayed to the
//!   plugin in order.
//!   - *trace*: right button held and dragged more than 10 px on an axis.
//!   - *rocker*: one of left/right held, then the other pressed.
//!   - *wheel*: right button held, then the wheel turned.
//! - **Browser shortcuts**: Ctrl and Alt combinations and function keys the
//!   host owns, see [`forwards_key`]. A lone Alt press is held back until
//!   its release, so AltGr (reported as Ctrl+Alt) keeps typing text.
//! - **Zoom**: Ctrl+wheel.
//! - **Plain moves**: moves with no button held, so auto-hiding toolbars in
//!   full-screen mode still react.
//!
//! Only routing happens here: swipe directions and rocker sides are the
//! host's business.
//!
//! # Invariants
//!
//! 1. At most one recognizer is triggered at a time; while it is, every
//!    mouse message goes to the host and none to the plugin.
//! 2. A message replayed to the plugin passes through the router untouched
//!    exactly once.
//! 3. Held-back messages either reach the host (trigger) or the plugin
//!    (replay), never both, except a left press that starts a rocker, which
//!    the plugin always receives.

use std::collections::VecDeque;

use plugclick_core::event::Modifiers;
use plugclick_core::geometry::Point;

// ---------------------------------------------------------------------------
// Message vocabulary
// ---------------------------------------------------------------------------

/// Window message numbers the router understands.
pub mod wm {
    pub const KEYFIRST: u32 = 0x0100;
    pub const KEYDOWN: u32 = 0x0100;
    pub const KEYUP: u32 = 0x0101;
    pub const SYSKEYDOWN: u32 = 0x0104;
    pub const SYSKEYUP: u32 = 0x0105;
    pub const KEYLAST: u32 = 0x0109;
    pub const MOUSEFIRST: u32 = 0x0200;
    pub const MOUSEMOVE: u32 = 0x0200;
    pub const LBUTTONDOWN: u32 = 0x0201;
    pub const LBUTTONUP: u32 = 0x0202;
    pub const LBUTTONDBLCLK: u32 = 0x0203;
    pub const RBUTTONDOWN: u32 = 0x0204;
    pub const RBUTTONUP: u32 = 0x0205;
    pub const RBUTTONDBLCLK: u32 = 0x0206;
    pub const MOUSEWHEEL: u32 = 0x020A;
    pub const MOUSELAST: u32 = 0x020E;
}

/// Virtual-key codes the shortcut filter looks at.
pub mod vk {
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const SPACE: u16 = 0x20;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const F1: u16 = 0x70;
    pub const F2: u16 = 0x71;
    pub const F3: u16 = 0x72;
    pub const F4: u16 = 0x73;
    pub const F5: u16 = 0x74;
    pub const F6: u16 = 0x75;
    pub const F7: u16 = 0x76;
    pub const F10: u16 = 0x79;
    pub const F11: u16 = 0x7A;
    pub const F12: u16 = 0x7B;
    pub const F24: u16 = 0x87;
    pub const PROCESSKEY: u16 = 0xE5;
}

const MK_LBUTTON: usize = 0x0001;
const MK_RBUTTON: usize = 0x0002;

/// Movement, in pixels on either axis, that turns a held button into a drag.
pub const DRAG_THRESHOLD: u32 = 10;

/// Replays not seen again after this many are assumed lost.
const REPLAY_LIMIT: usize = 32;

/// One window message, as the hook sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookMessage {
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl HookMessage {
    #[must_use]
    pub const fn new(message: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            message,
            wparam,
            lparam,
        }
    }

    /// A mouse message at client point `at` with `keys` (`MK_*`) held.
    #[must_use]
    pub const fn mouse(message: u32, keys: usize, at: Point) -> Self {
        let packed = ((at.y as u16 as u32) << 16) | (at.x as u16 as u32);
        Self::new(message, keys, packed as isize)
    }

    /// A key message for virtual key `key`.
    #[must_use]
    pub const fn key(message: u32, key: u16) -> Self {
        Self::new(message, key as usize, 0)
    }

    /// The signed point packed into `lparam`.
    #[must_use]
    pub const fn point(self) -> Point {
        let raw = self.lparam as u32;
        Point::new((raw & 0xFFFF) as u16 as i16 as i32, (raw >> 16) as u16 as i16 as i32)
    }

    #[must_use]
    pub const fn is_key(self) -> bool {
        self.message >= wm::KEYFIRST && self.message <= wm::KEYLAST
    }

    #[must_use]
    pub const fn is_mouse(self) -> bool {
        self.message >= wm::MOUSEFIRST && self.message <= wm::MOUSELAST
    }

    /// Whether `lparam` holds a client-area point. Wheel messages carry
    /// screen coordinates.
    #[must_use]
    pub const fn has_client_point(self) -> bool {
        self.is_mouse() && self.message != wm::MOUSEWHEEL
    }

    const fn holds(self, keys: usize) -> bool {
        self.wparam & keys != 0
    }

    const fn virtual_key(self) -> u16 {
        self.wparam as u16
    }
}

/// Where a routed message is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The top-level host window, with mouse points mapped into it.
    Host,
    /// Back to the plugin window the current message was addressed to.
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Post {
    pub to: Destination,
    pub message: HookMessage,
}

/// What to do with one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    /// Turn the original into `WM_NULL` so the plugin never sees it.
    pub swallow: bool,
    /// Give the host window keyboard focus before posting.
    pub focus_host: bool,
    /// Messages to post, in order.
    pub posts: Vec<Post>,
}

impl Routing {
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        !self.swallow && !self.focus_host && self.posts.is_empty()
    }

    fn to_host(&mut self, message: HookMessage) {
        self.posts.push(Post {
            to: Destination::Host,
            message,
        });
    }
}

// ---------------------------------------------------------------------------
// Gesture recognizers
// ---------------------------------------------------------------------------

/// Which gesture a [`GestureHandler`] recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Trace,
    Rocker,
    Wheel,
}

impl GestureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Rocker => "rocker",
            Self::Wheel => "wheel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// A button is down; the gesture may still start.
    Initiated,
    /// The gesture started; the host owns the mouse until it ends.
    Triggered,
}

/// Result of feeding one message to a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Ignored,
    Initiated,
    /// Part of a possible or running gesture.
    Held,
    /// A repeated press while initiated.
    Discarded,
    Triggered,
    Canceled,
    Ended,
}

/// One gesture recognizer and the messages it has held back.
#[derive(Debug, Clone)]
pub struct GestureHandler {
    kind: GestureKind,
    state: GestureState,
    start: Point,
    /// Rocker only: the left button went down first.
    left_first: bool,
    held: Vec<HookMessage>,
}

impl GestureHandler {
    #[must_use]
    pub const fn new(kind: GestureKind) -> Self {
        Self {
            kind,
            state: GestureState::Idle,
            start: Point::new(-1, -1),
            left_first: false,
            held: Vec::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> GestureKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> GestureState {
        self.state
    }

    /// Messages held back since the gesture was initiated.
    #[must_use]
    pub fn held(&self) -> &[HookMessage] {
        &self.held
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.held.clear();
    }

    /// Feed one mouse message.
    pub fn handle(&mut self, msg: HookMessage) -> Handled {
        let handled = match self.kind {
            GestureKind::Trace => self.trace(msg),
            GestureKind::Rocker => self.rocker(msg),
            GestureKind::Wheel => self.wheel(msg),
        };
        match handled {
            Handled::Initiated => {
                self.held.clear();
                self.held.push(msg);
            }
            Handled::Held | Handled::Discarded | Handled::Triggered => self.held.push(msg),
            Handled::Ignored | Handled::Canceled | Handled::Ended => {}
        }
        handled
    }

    /// Whether the plugin must not see a message handled as `handled`.
    #[must_use]
    pub fn swallows(&self, handled: Handled) -> bool {
        // A left-first rocker leaves the plugin its left-button input.
        if self.kind == GestureKind::Rocker && self.left_first && handled != Handled::Triggered {
            return false;
        }
        matches!(
            handled,
            Handled::Initiated | Handled::Held | Handled::Discarded | Handled::Triggered
        )
    }

    /// Held-back messages to hand back to the plugin after a cancel.
    fn take_replay(&mut self) -> Vec<HookMessage> {
        let held = std::mem::take(&mut self.held);
        if self.kind == GestureKind::Rocker && self.left_first {
            return Vec::new();
        }
        held
    }

    fn take_held(&mut self) -> Vec<HookMessage> {
        std::mem::take(&mut self.held)
    }

    fn moved_past_threshold(&self, msg: HookMessage) -> bool {
        !self.start.within(msg.point(), DRAG_THRESHOLD)
    }

    fn initiate(&mut self, msg: HookMessage) -> Handled {
        self.start = msg.point();
        self.state = GestureState::Initiated;
        tracing::trace!(target: "plugclick.native", gesture = self.kind.as_str(), "gesture initiated");
        Handled::Initiated
    }

    fn cancel(&mut self, msg: HookMessage) -> Handled {
        self.state = GestureState::Idle;
        tracing::trace!(
            target: "plugclick.native",
            gesture = self.kind.as_str(),
            message = msg.message,
            "gesture canceled"
        );
        Handled::Canceled
    }

    fn trigger(&mut self) -> Handled {
        self.state = GestureState::Triggered;
        tracing::debug!(target: "plugclick.native", gesture = self.kind.as_str(), "gesture forwarded to host");
        Handled::Triggered
    }

    fn finish(&mut self) -> Handled {
        self.state = GestureState::Idle;
        Handled::Ended
    }

    fn trace(&mut self, msg: HookMessage) -> Handled {
        match self.state {
            GestureState::Idle if msg.message == wm::RBUTTONDOWN => self.initiate(msg),
            GestureState::Idle => Handled::Ignored,
            GestureState::Initiated => match msg.message {
                wm::MOUSEMOVE if msg.holds(MK_RBUTTON) => {
                    if self.moved_past_threshold(msg) {
                        self.trigger()
                    } else {
                        Handled::Held
                    }
                }
                wm::RBUTTONDOWN | wm::RBUTTONDBLCLK => Handled::Discarded,
                _ => self.cancel(msg),
            },
            GestureState::Triggered => {
                if msg.message == wm::MOUSEMOVE && msg.holds(MK_RBUTTON) {
                    Handled::Held
                } else {
                    self.finish()
                }
            }
        }
    }

    fn rocker(&mut self, msg: HookMessage) -> Handled {
        let (held_key, other_down, other_up) = if self.left_first {
            (MK_LBUTTON, wm::RBUTTONDOWN, wm::RBUTTONUP)
        } else {
            (MK_RBUTTON, wm::LBUTTONDOWN, wm::LBUTTONUP)
        };
        match self.state {
            GestureState::Idle => match msg.message {
                wm::LBUTTONDOWN | wm::RBUTTONDOWN => {
                    self.left_first = msg.message == wm::LBUTTONDOWN;
                    self.initiate(msg)
                }
                _ => Handled::Ignored,
            },
            GestureState::Initiated => match msg.message {
                wm::MOUSEMOVE if msg.holds(held_key) => {
                    if self.moved_past_threshold(msg) {
                        self.cancel(msg)
                    } else {
                        Handled::Held
                    }
                }
                message if message == other_down && msg.holds(held_key) => self.trigger(),
                wm::LBUTTONDOWN | wm::RBUTTONDOWN | wm::LBUTTONDBLCLK | wm::RBUTTONDBLCLK => {
                    Handled::Discarded
                }
                _ => self.cancel(msg),
            },
            GestureState::Triggered => {
                let rocking = msg.message == other_down
                    || msg.message == other_up
                    || msg.message == wm::MOUSEMOVE;
                if msg.holds(held_key) && rocking {
                    Handled::Held
                } else {
                    self.finish()
                }
            }
        }
    }

    fn wheel(&mut self, msg: HookMessage) -> Handled {
        match self.state {
            GestureState::Idle if msg.message == wm::RBUTTONDOWN => self.initiate(msg),
            GestureState::Idle => Handled::Ignored,
            GestureState::Initiated => match msg.message {
                wm::MOUSEMOVE if msg.holds(MK_RBUTTON) => {
                    if self.moved_past_threshold(msg) {
                        self.cancel(msg)
                    } else {
                        Handled::Held
                    }
                }
                wm::MOUSEWHEEL if msg.holds(MK_RBUTTON) => self.trigger(),
                wm::RBUTTONDOWN | wm::RBUTTONDBLCLK => Handled::Discarded,
                _ => self.cancel(msg),
            },
            GestureState::Triggered => {
                let scrolling = matches!(msg.message, wm::MOUSEMOVE | wm::MOUSEWHEEL);
                if scrolling && msg.holds(MK_RBUTTON) {
                    Handled::Held
                } else {
                    self.finish()
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shortcut filter
// ---------------------------------------------------------------------------

/// Whether key `key`, pressed with `modifiers`, is a host shortcut.
///
/// Editing and caret shortcuts (copy, paste, undo, word jumps and so on)
/// stay with the plugin, as do Ctrl+Alt combinations, which are AltGr text
/// input on many layouts. Any other Alt combination belongs to the host.
#[must_use]
pub fn forwards_key(key: u16, modifiers: Modifiers) -> bool {
    let ctrl = modifiers.contains(Modifiers::CTRL);
    let alt = modifiers.contains(Modifiers::ALT);
    let shift = modifiers.contains(Modifiers::SHIFT);

    if ctrl && alt {
        // Ctrl+Alt+R restarts the browser.
        return key == u16::from(b'R');
    }
    if ctrl {
        return !matches!(
            key,
            vk::CONTROL
                | vk::MENU
                | vk::SHIFT
                | vk::SPACE
                | vk::PROCESSKEY
                | vk::HOME
                | vk::END
                | vk::LEFT
                | vk::RIGHT
                | vk::UP
                | vk::DOWN
                | vk::RETURN
        ) && !b"PCVXAZY".iter().any(|&letter| key == u16::from(letter));
    }
    if alt {
        return true;
    }
    match key {
        vk::F3 => true,
        vk::F2 | vk::F4 | vk::F7 => shift,
        vk::F6 | vk::F10 | vk::F11 | vk::F12 => !shift,
        _ => false,
    }
}

const fn is_function_key(key: u16) -> bool {
    key >= vk::F1 && key <= vk::F24
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Per-thread routing state for the message hook.
#[derive(Debug)]
pub struct MessageRouter {
    handlers: [GestureHandler; 3],
    replaying: VecDeque<HookMessage>,
    pending_alt: Option<HookMessage>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: [
                GestureHandler::new(GestureKind::Trace),
                GestureHandler::new(GestureKind::Rocker),
                GestureHandler::new(GestureKind::Wheel),
            ],
            replaying: VecDeque::new(),
            pending_alt: None,
        }
    }

    /// The recognizer currently owning the mouse, if any.
    #[must_use]
    pub fn triggered(&self) -> Option<GestureKind> {
        self.handlers
            .iter()
            .find(|handler| handler.state() == GestureState::Triggered)
            .map(GestureHandler::kind)
    }

    /// Replayed messages not yet seen again.
    #[must_use]
    pub fn replaying(&self) -> usize {
        self.replaying.len()
    }

    /// Route one message addressed to a plugin window. `modifiers` is the
    /// keyboard state when the message was queued.
    pub fn route(&mut self, msg: HookMessage, modifiers: Modifiers) -> Routing {
        let mut routing = Routing::default();
        if let Some(slot) = self.replaying.iter().position(|replayed| *replayed == msg) {
            self.replaying.remove(slot);
            return routing;
        }

        if matches!(msg.message, wm::KEYDOWN | wm::SYSKEYDOWN | wm::SYSKEYUP) {
            self.route_key(msg, modifiers, &mut routing);
        }
        if msg.is_mouse() && !routing.swallow {
            self.route_mouse(msg, &mut routing);
        }
        if !routing.swallow && msg.message == wm::MOUSEWHEEL && modifiers.contains(Modifiers::CTRL) {
            routing.to_host(msg);
            routing.swallow = true;
        }
        routing
    }

    fn route_key(&mut self, msg: HookMessage, modifiers: Modifiers, routing: &mut Routing) {
        let ctrl = modifiers.contains(Modifiers::CTRL);
        let mut modifiers = modifiers;
        let key = msg.virtual_key();

        if modifiers.contains(Modifiers::ALT) && !ctrl && key == vk::MENU {
            // Alt alone: wait for its release in case Ctrl joins (AltGr).
            self.pending_alt = Some(msg);
            return;
        }
        if ctrl {
            self.pending_alt = None;
        }

        if msg.message == wm::SYSKEYUP && key == vk::MENU {
            if let Some(pending) = self.pending_alt.take() {
                routing.focus_host = true;
                routing.to_host(pending);
                modifiers |= Modifiers::ALT;
            }
        } else if msg.message == wm::SYSKEYUP && key == vk::CONTROL {
            // End of an AltGr sequence.
            return;
        }

        let chord = modifiers.intersects(Modifiers::CTRL | Modifiers::ALT);
        if (chord || is_function_key(key)) && forwards_key(key, modifiers) {
            routing.focus_host = true;
            routing.to_host(msg);
            routing.swallow = true;
        }
    }

    fn route_mouse(&mut self, msg: HookMessage, routing: &mut Routing) {
        if let Some(active) = self
            .handlers
            .iter_mut()
            .find(|handler| handler.state() == GestureState::Triggered)
        {
            if active.handle(msg) == Handled::Ended {
                self.handlers.iter_mut().for_each(GestureHandler::reset);
            }
            routing.to_host(msg);
            routing.swallow = true;
            return;
        }

        let mut plain_move = msg.message == wm::MOUSEMOVE && msg.wparam == 0;
        let mut swallow = false;
        for index in 0..self.handlers.len() {
            let handled = self.handlers[index].handle(msg);
            swallow |= self.handlers[index].swallows(handled);
            match handled {
                Handled::Triggered => {
                    for held in self.handlers[index].take_held() {
                        routing.to_host(held);
                    }
                    plain_move = false;
                    break;
                }
                Handled::Canceled if self.all_idle() => {
                    let replay = self.handlers[index].take_replay();
                    self.handlers.iter_mut().for_each(GestureHandler::reset);
                    if !replay.is_empty() {
                        // The canceling message follows what was held back.
                        self.replay(replay.into_iter().chain([msg]), routing);
                        swallow = true;
                    }
                    break;
                }
                _ => {}
            }
        }
        if plain_move {
            routing.to_host(msg);
        }
        routing.swallow |= swallow;
    }

    fn all_idle(&self) -> bool {
        self.handlers
            .iter()
            .all(|handler| handler.state() == GestureState::Idle)
    }

    fn replay(&mut self, messages: impl Iterator<Item = HookMessage>, routing: &mut Routing) {
        if self.replaying.len() > REPLAY_LIMIT {
            tracing::warn!(
                target: "plugclick.native",
                lost = self.replaying.len(),
                "replayed messages never came back"
            );
            self.replaying.clear();
        }
        for message in messages {
            self.replaying.push_back(message);
            routing.posts.push(Post {
                to: Destination::Origin,
                message,
            });
        }
    }
}
