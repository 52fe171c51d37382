//! Native error type.

use thiserror::Error;

/// Failure of one call into the OS input-hook surface.
///
/// None of these ever escape the engine: the bridge logs them and reports
/// the interaction as degraded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// An OS call failed with the given error code.
    #[error("{op} failed with OS error {code:#010x}")]
    Os { op: &'static str, code: i32 },
    /// An operation that needs the input hook ran while it was not installed.
    #[error("input hook is not installed")]
    NotInstalled,
    /// `restore_focus` ran without a preceding successful `record_focus`.
    #[error("no focused window was recorded")]
    NoRecordedFocus,
    /// The current platform has no native input-hook surface.
    #[error("native input hooks are not supported on this platform")]
    Unsupported,
    /// The hook manager thread could not be started or has gone away.
    #[error("hook manager unavailable: {0}")]
    ManagerUnavailable(String),
}

pub type Result<T> = std::result::Result<T, NativeError>;
