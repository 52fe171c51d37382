//! The foreign input-hook surface.

use std::fmt;
use std::rc::Rc;

use plugclick_core::geometry::Point;

use crate::error::Result;

/// One operation on an [`InputHookSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    InstallHook,
    UninstallHook,
    RecordFocus,
    ClearFocus,
    RestoreFocus,
    SynthesizeClick,
}

impl NativeOp {
    /// Stable name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstallHook => "install_hook",
            Self::UninstallHook => "uninstall_hook",
            Self::RecordFocus => "record_focus",
            Self::ClearFocus => "clear_focus",
            Self::RestoreFocus => "restore_focus",
            Self::SynthesizeClick => "synthesize_secondary_click",
        }
    }
}

impl fmt::Display for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blocking calls into the OS window-message layer.
///
/// Every call may block briefly while the OS processes it. Implementations
/// report failure through [`NativeError`](crate::NativeError) and must never
/// panic; the caller treats any error as a degraded interaction.
pub trait InputHookSurface {
    /// Install the raw input hook that routes synthesized input past the
    /// plugin's window.
    fn install_hook(&self) -> Result<()>;

    /// Remove the hook installed by [`install_hook`](Self::install_hook).
    fn uninstall_hook(&self) -> Result<()>;

    /// Remember which native window currently holds input focus.
    fn record_focus(&self) -> Result<()>;

    /// Take input focus away from the plugin's rendering surface.
    fn clear_focus(&self) -> Result<()>;

    /// Give focus back to the window remembered by [`record_focus`](Self::record_focus).
    fn restore_focus(&self) -> Result<()>;

    /// Emit an OS-level secondary-button press and release at `at`, in
    /// client coordinates of the host window.
    fn synthesize_secondary_click(&self, at: Point) -> Result<()>;
}

impl<S: InputHookSurface + ?Sized> InputHookSurface for Rc<S> {
    fn install_hook(&self) -> Result<()> {
        (**self).install_hook()
    }

    fn uninstall_hook(&self) -> Result<()> {
        (**self).uninstall_hook()
    }

    fn record_focus(&self) -> Result<()> {
        (**self).record_focus()
    }

    fn clear_focus(&self) -> Result<()> {
        (**self).clear_focus()
    }

    fn restore_focus(&self) -> Result<()> {
        (**self).restore_focus()
    }

    fn synthesize_secondary_click(&self, at: Point) -> Result<()> {
        (**self).synthesize_secondary_click(at)
    }
}
