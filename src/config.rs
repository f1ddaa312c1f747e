//! Configuration for port-table locking.
//!
//! Port tables are shared with the execution scheduler, which may hold a lock
//! momentarily while it publishes or consumes. Traversal never blocks on those
//! locks: it retries a non-blocking try-lock, yielding first and then backing
//! off exponentially, until the lock frees up or the optional timeout expires.

use crate::error::{GraphToolsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a port-table lock is acquired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockPolicy {
  /// Number of failed attempts answered with `thread::yield_now()` before sleeping.
  pub spin_attempts: u32,
  /// First sleep once spinning is exhausted.
  pub initial_backoff: Duration,
  /// Upper bound for a single sleep.
  pub max_backoff: Duration,
  /// Give up with `LockTimeout` after this long. None = wait until the lock frees up.
  pub timeout: Option<Duration>,
}

impl Default for LockPolicy {
  fn default() -> Self {
    Self {
      spin_attempts: 64,
      initial_backoff: Duration::from_micros(10),
      max_backoff: Duration::from_millis(1),
      timeout: None,
    }
  }
}

impl LockPolicy {
  /// Creates a policy with default spinning and backoff and the given timeout.
  pub fn new(timeout: Option<Duration>) -> Self {
    Self {
      timeout,
      ..Default::default()
    }
  }

  /// Sets the number of yield-only attempts.
  pub fn with_spin_attempts(mut self, n: u32) -> Self {
    self.spin_attempts = n;
    self
  }

  /// Sets the initial and maximum sleep.
  pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
    self.initial_backoff = initial;
    self.max_backoff = max;
    self
  }

  /// Sets the timeout (None = unbounded).
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Validates the policy: a non-zero initial backoff no larger than the maximum,
  /// and a non-zero timeout when one is set.
  pub fn validate(&self) -> Result<(), String> {
    if self.initial_backoff.is_zero() {
      return Err("initial_backoff must be > 0".to_string());
    }
    if self.max_backoff < self.initial_backoff {
      return Err(format!(
        "max_backoff ({:?}) must be >= initial_backoff ({:?})",
        self.max_backoff, self.initial_backoff
      ));
    }
    if self.timeout.is_some_and(|t| t.is_zero()) {
      return Err("timeout must be > 0 when set".to_string());
    }
    Ok(())
  }

  /// Returns the sleep to apply after failed attempt number `attempt` (0-based),
  /// or `None` while the attempt should only yield.
  pub fn backoff_for(&self, attempt: u32) -> Option<Duration> {
    if attempt < self.spin_attempts {
      return None;
    }
    let exponent = (attempt - self.spin_attempts).min(20);
    Some(
      self
        .initial_backoff
        .saturating_mul(1u32 << exponent)
        .min(self.max_backoff),
    )
  }
}

/// Top-level configuration for [`GraphTools`](crate::graph::traversal::GraphTools).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphToolsConfig {
  /// Port-table lock acquisition.
  pub lock: LockPolicy,
}

impl GraphToolsConfig {
  /// Creates a config with the given lock policy.
  pub fn new(lock: LockPolicy) -> Self {
    Self { lock }
  }

  /// Parses a JSON document; missing fields take their defaults. The result is validated.
  pub fn from_json_str(json: &str) -> Result<Self> {
    let config: Self =
      serde_json::from_str(json).map_err(|e| GraphToolsError::Config(e.to_string()))?;
    config.validate().map_err(GraphToolsError::Config)?;
    Ok(config)
  }

  /// Validates every section.
  pub fn validate(&self) -> Result<(), String> {
    self.lock.validate()
  }
}
