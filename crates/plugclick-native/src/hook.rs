//! Reference-counted hook installation.

use std::cell::Cell;

use crate::error::Result;

/// Counts consumers of the process-wide input hook.
///
/// The first [`acquire`](Self::acquire) runs the install operation; the
/// matching last [`release`](Self::release) runs the uninstall operation.
/// A failed install leaves the count untouched so a later acquire retries.
#[derive(Debug, Default)]
pub struct HookRegistry {
    installs: Cell<usize>,
}

impl HookRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            installs: Cell::new(0),
        }
    }

    /// Number of live consumers.
    #[must_use]
    pub fn installs(&self) -> usize {
        self.installs.get()
    }

    /// Whether the hook is currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installs.get() > 0
    }

    /// Register one consumer, installing on the first.
    pub fn acquire(&self, install: impl FnOnce() -> Result<()>) -> Result<()> {
        let count = self.installs.get();
        if count == 0 {
            install()?;
        }
        self.installs.set(count + 1);
        Ok(())
    }

    /// Drop one consumer, uninstalling after the last.
    ///
    /// Releasing with no live consumers is a no-op.
    pub fn release(&self, uninstall: impl FnOnce() -> Result<()>) -> Result<()> {
        match self.installs.get() {
            0 => Ok(()),
            1 => {
                self.installs.set(0);
                uninstall()
            }
            count => {
                self.installs.set(count - 1);
                Ok(())
            }
        }
    }
}
