//! Surface for platforms without a native hook implementation.

use plugclick_core::geometry::Point;

use crate::error::{NativeError, Result};
use crate::surface::InputHookSurface;

/// Every operation fails with [`NativeError::Unsupported`].
///
/// The engine still runs on top of it: confirmed clicks are forwarded to the
/// page and the native steps are logged as degraded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSurface;

impl InputHookSurface for UnsupportedSurface {
    fn install_hook(&self) -> Result<()> {
        Err(NativeError::Unsupported)
    }

    fn uninstall_hook(&self) -> Result<()> {
        Err(NativeError::Unsupported)
    }

    fn record_focus(&self) -> Result<()> {
        Err(NativeError::Unsupported)
    }

    fn clear_focus(&self) -> Result<()> {
        Err(NativeError::Unsupported)
    }

    fn restore_focus(&self) -> Result<()> {
        Err(NativeError::Unsupported)
    }

    fn synthesize_secondary_click(&self, _at: Point) -> Result<()> {
        Err(NativeError::Unsupported)
    }
}
