//! # System Signals
//!
//! Out-of-band control messages between the scheduler and a vertex, carried
//! separately from the data edges. The scheduler sends with
//! [`SystemSignalChannel::send_system_signal`]; the vertex reads with
//! [`SystemSignalChannel::get_system_signal`], which pops the oldest signal or
//! returns [`Signal::None`] when nothing is pending.
//!
//! The graph tools never read or write these queues. Cloning a vertex gives
//! the clone its own empty queue and leaves the original's pending signals
//! untouched.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::trace;

/// A scheduler-level control signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
  /// No signal pending.
  #[default]
  None,
  /// Upstream has finished producing.
  Eof,
  /// Terminate after draining in-flight data.
  Term,
  /// Stop immediately.
  Quit,
}

/// Capability to exchange system signals with a vertex.
pub trait SystemSignalChannel {
  /// Queues a signal for the vertex.
  fn send_system_signal(&self, signal: Signal);

  /// Pops the oldest pending signal, or returns [`Signal::None`].
  fn get_system_signal(&self) -> Signal;
}

/// FIFO implementation of [`SystemSignalChannel`].
#[derive(Debug, Default)]
pub struct SignalQueue {
  queue: Mutex<VecDeque<Signal>>,
}

impl SignalQueue {
  /// Creates an empty queue.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of pending signals.
  pub fn len(&self) -> usize {
    self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  /// Returns true if no signal is pending.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl SystemSignalChannel for SignalQueue {
  fn send_system_signal(&self, signal: Signal) {
    // `None` is the empty marker, never a queued value.
    if signal == Signal::None {
      trace!("SignalQueue::send_system_signal(None) ignored");
      return;
    }
    self
      .queue
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push_back(signal);
  }

  fn get_system_signal(&self) -> Signal {
    self
      .queue
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .pop_front()
      .unwrap_or(Signal::None)
  }
}
