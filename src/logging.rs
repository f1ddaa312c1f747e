//! Subscriber installation.
//!
//! The library only emits `tracing` events. Binaries embedding it call
//! [`try_init`] once at startup; tests call [`init_for_tests`].

use tracing::Level;
use tracing_subscriber::fmt;

/// Installs a global `fmt` subscriber at the given level.
///
/// Returns `false` if a global subscriber was already installed.
pub fn try_init(level: Level) -> bool {
  fmt().with_max_level(level).with_target(true).try_init().is_ok()
}

/// Installs a trace-level subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
  let _ = fmt()
    .with_max_level(Level::TRACE)
    .with_test_writer()
    .try_init();
}
