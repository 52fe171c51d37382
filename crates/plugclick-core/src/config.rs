#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`EngineConfig`] gathers every tunable of the interception engine so it
//! can be loaded from TOML or JSON at startup (feature `config`).
//!
//! ```toml
//! enabled = true
//! gesture_window_ms = 300
//! distance_threshold = 10
//! disabled_sites = ["example.org"]
//! ```
//!
//! # Defaults
//!
//! `EngineConfig::default()` reproduces the stock gesture window: a
//! right-button release counts as a click only if it arrives within
//! [`GESTURE_WINDOW`] of the press and within [`DISTANCE_THRESHOLD`] pixels
//! of it on each axis.

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::policy::SitePolicy;

/// Time a right-button press may stay down and still count as a click.
pub const GESTURE_WINDOW: Duration = Duration::from_millis(300);

/// Per-axis pointer displacement (pixels) tolerated before a press becomes a drag.
pub const DISTANCE_THRESHOLD: u32 = 10;

/// Tunables for the interception engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Global simulation switch.
    pub enabled: bool,
    /// Gesture window in milliseconds.
    pub gesture_window_ms: u64,
    /// Per-axis displacement threshold in pixels.
    pub distance_threshold: u32,
    /// Sites (and their subdomains) where simulation stays off.
    pub disabled_sites: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gesture_window_ms: GESTURE_WINDOW.as_millis() as u64,
            distance_threshold: DISTANCE_THRESHOLD,
            disabled_sites: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.gesture_window_ms == 0 {
            errors.push("gesture_window_ms must be > 0".into());
        }
        // Anything beyond a few seconds is a long-press, not a click.
        if self.gesture_window_ms > 10_000 {
            errors.push(format!(
                "gesture_window_ms must be <= 10000, got {}",
                self.gesture_window_ms
            ));
        }
        if self.distance_threshold > 1_000 {
            errors.push(format!(
                "distance_threshold must be <= 1000, got {}",
                self.distance_threshold
            ));
        }
        for site in &self.disabled_sites {
            if site.contains("://") || site.contains('/') {
                errors.push(format!("disabled_sites entry must be a bare host, got {site:?}"));
            }
        }

        errors
    }

    /// Consume `self`, failing with [`ConfigError::Validation`] if invalid.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Gesture window as a duration.
    #[must_use]
    pub const fn gesture_window(&self) -> Duration {
        Duration::from_millis(self.gesture_window_ms)
    }

    /// Build the [`SitePolicy`] described by this config.
    #[must_use]
    pub fn site_policy(&self) -> SitePolicy {
        SitePolicy::new(self.enabled, &self.disabled_sites)
    }
}

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
