//! Log subscriber setup for embedders without their own.
//!
//! The engine logs through `tracing` under these targets:
//!
//! | Target               | Content                                   |
//! |----------------------|-------------------------------------------|
//! | `plugclick.intercept`| press forwarding, focus shielding         |
//! | `plugclick.gesture`  | session arm and end transitions           |
//! | `plugclick.native`   | native focus, click and hook failures     |
//! | `plugclick.engine`   | construction, config, teardown            |
//!
//! Embedders that already install a subscriber need nothing from here.

use tracing_subscriber::EnvFilter;

use crate::Error;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "PLUGCLICK_LOG";

/// Directives used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "warn";

/// Filter built from [`LOG_ENV`], falling back to [`DEFAULT_DIRECTIVES`].
#[must_use]
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install a global formatted subscriber filtered by [`filter`].
///
/// With the `tracing-json` feature, events are written as JSON lines.
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<(), Error> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter());
    #[cfg(feature = "tracing-json")]
    let builder = builder.json();
    builder
        .try_init()
        .map_err(|err| Error::Logging(err.to_string()))
}

/// Install a subscriber writing through the test harness's capture.
///
/// Safe to call from every test; only the first call installs.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter())
        .try_init();
}
