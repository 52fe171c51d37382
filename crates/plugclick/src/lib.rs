#![forbid(unsafe_code)]

//! plugclick public facade crate.
//!
//! Embedded plugin content (`<object>` / `<embed>`) swallows pointer events,
//! so a right-click on it never reaches the page and the host's context menu
//! never opens. plugclick intercepts those presses, tells a quick
//! right-click apart from a right-button mouse gesture, forwards genuine
//! clicks to the nearest non-plugin ancestor, and replays them at the OS
//! level with native focus preserved.
//!
//! This crate re-exports the stable surface of the internal crates and adds
//! [`attach`] plus logging setup in [`logging`].
//!
//! ```ignore
//! use plugclick::prelude::*;
//!
//! plugclick::logging::init()?;
//! let engine = plugclick::attach(host, EngineConfig::default())?;
//! let out = engine.on_pointer_down(&event);
//! if out.suppress_original {
//!     // prevent default and stop propagation of `event`
//! }
//! ```

use std::fmt;

pub mod logging;

// --- Core re-exports -------------------------------------------------------

pub use plugclick_core::config::{ConfigError, DISTANCE_THRESHOLD, EngineConfig, GESTURE_WINDOW};
pub use plugclick_core::document::{
    ContentHost, ContentTree, DispatchError, Document, NodeId, NodeKind, PluginSurfaceRef,
};
pub use plugclick_core::dom::{DomEventError, DomMouseEvent};
pub use plugclick_core::event::{Buttons, EventId, EventKind, InputEvent, Modifiers, MouseButton};
pub use plugclick_core::geometry::Point;
pub use plugclick_core::policy::{SimulationPolicy, SitePolicy};

// --- Native re-exports -----------------------------------------------------

pub use plugclick_native::{
    ConfirmReport, InputHookSurface, NativeBridge, NativeError, NativeOp, PlatformSurface,
    UnsupportedSurface, platform_surface,
};

// --- Runtime re-exports ----------------------------------------------------

pub use plugclick_runtime::{
    EndReason, Engine, EngineError, Interception, SessionEnd, Teardown,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for plugclick embedders.
#[derive(Debug)]
pub enum Error {
    /// Configuration could not be loaded or failed validation.
    Config(ConfigError),
    /// The engine could not be built.
    Engine(EngineError),
    /// A native operation failed.
    Native(NativeError),
    /// The global log subscriber could not be installed.
    Logging(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Native(err) => write!(f, "{err}"),
            Self::Logging(msg) => write!(f, "logging setup failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::Native(err) => Some(err),
            Self::Logging(_) => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        Self::Native(err)
    }
}

/// Standard result type for plugclick APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Entry points ---------------------------------------------------------

/// Engine type returned by [`attach`].
pub type PlatformEngine<H> = Engine<H, PlatformSurface, SitePolicy>;

/// Attach an engine to `host` using this platform's native surface.
///
/// On Windows this must run on the host's UI thread.
pub fn attach<H: ContentHost>(host: H, config: EngineConfig) -> Result<PlatformEngine<H>> {
    Ok(Engine::from_config(host, platform_surface(), config)?)
}

/// Load a TOML or JSON config file (by extension) and attach an engine.
#[cfg(feature = "config")]
pub fn attach_with_config_file<H: ContentHost>(
    host: H,
    path: impl AsRef<std::path::Path>,
) -> Result<PlatformEngine<H>> {
    let path = path.as_ref();
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => EngineConfig::from_json_file(path)?,
        _ => EngineConfig::from_toml_file(path)?,
    };
    tracing::debug!(target: "plugclick.engine", path = %path.display(), "loaded config");
    attach(host, config)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ContentHost, ContentTree, EndReason, Engine, EngineConfig, Error, EventId, EventKind,
        InputEvent, Interception, MouseButton, NodeId, Point, Result, SimulationPolicy,
        SitePolicy,
    };

    pub use crate::{core, native, runtime};
}

pub use plugclick_core as core;
pub use plugclick_native as native;
pub use plugclick_runtime as runtime;
