//! Native input-hook surface and the confirm sequence.
//!
//! # Role in plugclick
//! Plugin rendering surfaces ignore DOM-level synthetic events, so a
//! confirmed right-click must also be replayed at the OS level. This crate
//! owns that step: [`NativeBridge::confirm_click`] saves and restores native
//! focus around an OS-level secondary-button click.
//!
//! # How it fits in the system
//! The OS boundary is the [`InputHookSurface`] trait. `plugclick-runtime`
//! only ever talks to a [`NativeBridge`], so tests substitute a
//! [`RecordingSurface`] (feature `test-helpers`) for the real
//! [`Win32Surface`]. On other platforms [`UnsupportedSurface`] keeps the
//! engine running with the native steps reported as degraded.
//!
//! Input delivered to windowed plugins never reaches the host window at
//! all. [`MessageRouter`] decides which of those messages (mouse gestures,
//! browser shortcuts, zoom) the Win32 message hook hands to the host.

pub mod bridge;
pub mod error;
pub mod hook;
#[cfg(any(test, feature = "test-helpers"))]
pub mod recording;
pub mod route;
pub mod surface;
pub mod unsupported;
#[cfg(windows)]
pub mod win32;

pub use bridge::{ConfirmReport, HookGuard, NativeBridge};
pub use error::NativeError;
pub use hook::HookRegistry;
#[cfg(any(test, feature = "test-helpers"))]
pub use recording::{NativeCall, RecordingSurface};
pub use route::{
    Destination, GestureKind, HookMessage, MessageRouter, Post, Routing, forwards_key,
};
pub use surface::{InputHookSurface, NativeOp};
pub use unsupported::UnsupportedSurface;
#[cfg(windows)]
pub use win32::Win32Surface;

/// The native surface for the current platform.
#[cfg(windows)]
pub type PlatformSurface = Win32Surface;

/// The native surface for the current platform.
#[cfg(not(windows))]
pub type PlatformSurface = UnsupportedSurface;

/// Create the native surface for the current platform.
///
/// On Windows this must run on the host's UI thread.
#[must_use]
pub fn platform_surface() -> PlatformSurface {
    PlatformSurface::default()
}
