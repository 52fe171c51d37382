//! The confirm sequence.
//!
//! [`NativeBridge::confirm_click`] runs four surface calls back to back:
//!
//! 1. record the natively focused window,
//! 2. clear focus from the plugin surface,
//! 3. restore focus to the recorded window,
//! 4. synthesize a secondary-button press and release.
//!
//! Steps never propagate failure. A failed record skips the focus steps
//! (there is nothing to restore to), a failed clear still restores, and the
//! click is always attempted. The first failure is returned in the
//! [`ConfirmReport`] and logged at warn level.

use std::rc::Rc;

use plugclick_core::geometry::Point;

use crate::error::{NativeError, Result};
use crate::hook::HookRegistry;
use crate::surface::{InputHookSurface, NativeOp};

/// Outcome of one confirm sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmReport {
    /// Every step succeeded.
    Delivered,
    /// At least one step failed; `op` is the first one. `clicked` tells
    /// whether the click itself was still synthesized.
    Degraded {
        op: NativeOp,
        error: NativeError,
        clicked: bool,
    },
}

impl ConfirmReport {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether a click was handed to the OS, so its echo will come back.
    #[must_use]
    pub const fn clicked(&self) -> bool {
        match self {
            Self::Delivered => true,
            Self::Degraded { clicked, .. } => *clicked,
        }
    }
}

struct Shared<S> {
    surface: S,
    hooks: HookRegistry,
}

/// Owner of an [`InputHookSurface`].
///
/// Cloning shares the surface and the hook reference count.
pub struct NativeBridge<S: InputHookSurface> {
    shared: Rc<Shared<S>>,
}

impl<S: InputHookSurface> Clone for NativeBridge<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<S: InputHookSurface> std::fmt::Debug for NativeBridge<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBridge")
            .field("hook_installs", &self.shared.hooks.installs())
            .finish_non_exhaustive()
    }
}

impl<S: InputHookSurface> NativeBridge<S> {
    pub fn new(surface: S) -> Self {
        Self {
            shared: Rc::new(Shared {
                surface,
                hooks: HookRegistry::new(),
            }),
        }
    }

    /// The wrapped surface.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.shared.surface
    }

    /// Whether at least one [`HookGuard`] is alive.
    #[must_use]
    pub fn hook_installed(&self) -> bool {
        self.shared.hooks.is_installed()
    }

    /// Take a reference on the input hook, installing it if this is the
    /// first live guard.
    pub fn acquire_hook(&self) -> Result<HookGuard<S>> {
        let surface = &self.shared.surface;
        self.shared.hooks.acquire(|| surface.install_hook())?;
        tracing::debug!(
            target: "plugclick.native",
            installs = self.shared.hooks.installs(),
            "input hook acquired"
        );
        Ok(HookGuard {
            shared: Rc::clone(&self.shared),
        })
    }

    /// Run the confirm sequence for a click at `at` (host client coordinates).
    pub fn confirm_click(&self, at: Point) -> ConfirmReport {
        let surface = &self.shared.surface;
        let mut first_failure: Option<(NativeOp, NativeError)> = None;
        let mut note = |op: NativeOp, result: Result<()>| -> bool {
            match result {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(
                        target: "plugclick.native",
                        op = op.as_str(),
                        %error,
                        "confirm step failed"
                    );
                    first_failure.get_or_insert((op, error));
                    false
                }
            }
        };

        if note(NativeOp::RecordFocus, surface.record_focus()) {
            note(NativeOp::ClearFocus, surface.clear_focus());
            note(NativeOp::RestoreFocus, surface.restore_focus());
        }
        let clicked = note(
            NativeOp::SynthesizeClick,
            surface.synthesize_secondary_click(at),
        );

        match first_failure {
            None => {
                tracing::debug!(
                    target: "plugclick.native",
                    x = at.x,
                    y = at.y,
                    "confirm sequence delivered"
                );
                ConfirmReport::Delivered
            }
            Some((op, error)) => ConfirmReport::Degraded { op, error, clicked },
        }
    }

    /// Run `f` between a focus record and a focus restore.
    ///
    /// If the record fails, `f` is not run and the error is returned.
    /// A restore failure is logged and returned after `f` has run.
    pub fn with_saved_focus<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        let surface = &self.shared.surface;
        surface.record_focus()?;
        let value = f();
        if let Err(error) = surface.restore_focus() {
            tracing::warn!(
                target: "plugclick.native",
                op = NativeOp::RestoreFocus.as_str(),
                %error,
                "focus restore failed"
            );
            return Err(error);
        }
        Ok(value)
    }
}

/// A live reference on the process-wide input hook.
///
/// Dropping the last guard uninstalls the hook; an uninstall failure is
/// logged.
pub struct HookGuard<S: InputHookSurface> {
    shared: Rc<Shared<S>>,
}

impl<S: InputHookSurface> std::fmt::Debug for HookGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookGuard")
            .field("installs", &self.shared.hooks.installs())
            .finish()
    }
}

impl<S: InputHookSurface> Drop for HookGuard<S> {
    fn drop(&mut self) {
        let surface = &self.shared.surface;
        match self.shared.hooks.release(|| surface.uninstall_hook()) {
            Ok(()) => tracing::debug!(
                target: "plugclick.native",
                installs = self.shared.hooks.installs(),
                "input hook released"
            ),
            Err(error) => tracing::warn!(
                target: "plugclick.native",
                %error,
                "input hook uninstall failed"
            ),
        }
    }
}
