//! # Ports and Port Tables
//!
//! Each vertex owns two [`PortTable`]s, one for inputs and one for outputs,
//! mapping port names to [`PortInfo`]. A connected port records its peer
//! vertex (weakly, so the graph owner controls lifetimes) and the name of the
//! matching port on that peer: an output's `other_name` is the input it feeds,
//! and that input's `other_name` points back.
//!
//! ## Locking
//!
//! A table is guarded by one mutex for the whole map, shared with the
//! execution scheduler. [`PortTable::lock`] never blocks: it retries
//! `try_lock` under a [`LockPolicy`], so a traversal backs off instead of
//! queueing behind a scheduler thread. When two tables are held at once the
//! output table is always taken first, then the input table.

use crate::config::LockPolicy;
use crate::error::{GraphToolsError, Result};
use crate::graph::traversal::CancelFlag;
use crate::graph::vertex::{Vertex, VertexId, VertexRef};
use crate::graph::wiring::DeliveryOrder;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::thread;
use std::time::Instant;
use tracing::{trace, warn};

/// Which side of a vertex a port belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
  /// Ports data arrives on.
  Input,
  /// Ports data leaves from.
  Output,
}

impl PortDirection {
  /// Returns the direction of the peer port on the other end of an edge.
  pub fn opposite(self) -> Self {
    match self {
      Self::Input => Self::Output,
      Self::Output => Self::Input,
    }
  }
}

impl fmt::Display for PortDirection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Input => f.write_str("input"),
      Self::Output => f.write_str("output"),
    }
  }
}

/// Weak reference to the vertex on the other end of an edge, with its identity.
///
/// The identity stays readable after the vertex is dropped, which lets the
/// replication engine report exactly which peer went missing.
#[derive(Clone, Debug)]
pub struct PeerRef {
  id: VertexId,
  vertex: Weak<Vertex>,
}

impl PeerRef {
  /// Creates a reference to `vertex`.
  pub fn new(vertex: &VertexRef) -> Self {
    Self {
      id: vertex.id(),
      vertex: Arc::downgrade(vertex),
    }
  }

  /// Identity of the peer.
  #[inline]
  pub fn id(&self) -> VertexId {
    self.id
  }

  /// Returns the peer if it is still alive.
  pub fn upgrade(&self) -> Option<VertexRef> {
    self.vertex.upgrade()
  }
}

/// One named endpoint in a port table.
#[derive(Clone, Debug)]
pub struct PortInfo {
  /// Name of this port.
  pub my_name: String,
  /// Data type carried by this port.
  pub type_name: &'static str,
  /// Vertex on the other end, if connected.
  pub other_kernel: Option<PeerRef>,
  /// Name of the port on `other_kernel` this port is connected to.
  pub other_name: String,
  /// Whether the edge delivers out of order.
  pub out_of_order: bool,
}

impl PortInfo {
  /// Creates an unconnected port.
  pub fn new(my_name: impl Into<String>, type_name: &'static str) -> Self {
    Self {
      my_name: my_name.into(),
      type_name,
      other_kernel: None,
      other_name: String::new(),
      out_of_order: false,
    }
  }

  /// Returns true if the port has a peer recorded (alive or not).
  pub fn is_connected(&self) -> bool {
    self.other_kernel.is_some()
  }

  /// Returns the live peer vertex, if any.
  pub fn peer(&self) -> Option<VertexRef> {
    self.other_kernel.as_ref().and_then(PeerRef::upgrade)
  }

  /// Returns the delivery order of the edge through this port.
  pub fn order(&self) -> DeliveryOrder {
    DeliveryOrder::from_out_of_order(self.out_of_order)
  }
}

/// Port name to port mapping held inside a [`PortTable`].
pub type PortMap = HashMap<String, PortInfo>;

/// The locked port map of one side of a vertex.
pub struct PortTable {
  direction: PortDirection,
  owner: String,
  ports: Mutex<PortMap>,
}

impl PortTable {
  pub(crate) fn new(direction: PortDirection, owner: String, ports: PortMap) -> Self {
    Self {
      direction,
      owner,
      ports: Mutex::new(ports),
    }
  }

  /// Which side of the vertex this table covers.
  pub fn direction(&self) -> PortDirection {
    self.direction
  }

  /// Display name of the owning vertex.
  pub fn owner(&self) -> &str {
    &self.owner
  }

  /// Attempts to take the lock without waiting.
  ///
  /// A poisoned lock is recovered: the map holds plain connection records
  /// that stay consistent even if a holder panicked.
  pub fn try_lock(&self) -> Option<MutexGuard<'_, PortMap>> {
    match self.ports.try_lock() {
      Ok(guard) => Some(guard),
      Err(TryLockError::WouldBlock) => None,
      Err(TryLockError::Poisoned(poisoned)) => {
        warn!(
          "PortTable::try_lock(owner={}, table={}): recovering poisoned lock",
          self.owner, self.direction
        );
        Some(poisoned.into_inner())
      }
    }
  }

  /// Takes the lock under `policy`, observing `cancel` while waiting.
  pub fn lock(
    &self,
    policy: &LockPolicy,
    cancel: Option<&CancelFlag>,
  ) -> Result<MutexGuard<'_, PortMap>> {
    self.acquire(policy, cancel).map(|(guard, _)| guard)
  }

  /// Like [`lock`](Self::lock), also returning how many attempts failed first.
  pub(crate) fn acquire(
    &self,
    policy: &LockPolicy,
    cancel: Option<&CancelFlag>,
  ) -> Result<(MutexGuard<'_, PortMap>, u32)> {
    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
      if let Some(guard) = self.try_lock() {
        if attempt > 0 {
          trace!(
            "PortTable::acquire(owner={}, table={}) after {} retries",
            self.owner, self.direction, attempt
          );
        }
        return Ok((guard, attempt));
      }
      if cancel.is_some_and(CancelFlag::is_cancelled) {
        return Err(GraphToolsError::Cancelled);
      }
      if let Some(timeout) = policy.timeout {
        let waited = started.elapsed();
        if waited >= timeout {
          return Err(GraphToolsError::LockTimeout {
            vertex: self.owner.clone(),
            table: self.direction,
            waited,
          });
        }
      }
      match policy.backoff_for(attempt) {
        None => thread::yield_now(),
        Some(delay) => thread::sleep(delay),
      }
      attempt = attempt.saturating_add(1);
    }
  }

  /// Returns a snapshot of the port called `name`.
  pub fn find_by_name(
    &self,
    name: &str,
    policy: &LockPolicy,
    cancel: Option<&CancelFlag>,
  ) -> Result<PortInfo> {
    let ports = self.lock(policy, cancel)?;
    ports
      .get(name)
      .cloned()
      .ok_or_else(|| GraphToolsError::PortNotFound {
        vertex: self.owner.clone(),
        port: name.to_string(),
      })
  }

  /// Returns the port names, sorted.
  pub fn names(&self, policy: &LockPolicy) -> Result<Vec<String>> {
    let ports = self.lock(policy, None)?;
    let mut names: Vec<String> = ports.keys().cloned().collect();
    names.sort();
    Ok(names)
  }
}

impl fmt::Debug for PortTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PortTable")
      .field("direction", &self.direction)
      .field("owner", &self.owner)
      .finish_non_exhaustive()
  }
}

/// Connects `from[from_port]` (an output) to `to[to_port]` (an input).
///
/// Both records are updated so the edge is named from either end. Fails if
/// either port is missing, the data types differ, or either end already has a
/// peer.
pub fn connect(
  from: &VertexRef,
  from_port: &str,
  to: &VertexRef,
  to_port: &str,
  order: DeliveryOrder,
  policy: &LockPolicy,
) -> Result<()> {
  trace!(
    "connect(from={}, from_port={}, to={}, to_port={}, order={:?})",
    from.id(),
    from_port,
    to.id(),
    to_port,
    order
  );
  let mut outputs = from.output().lock(policy, None)?;
  let mut inputs = to.input().lock(policy, None)?;

  let output = outputs
    .get_mut(from_port)
    .ok_or_else(|| GraphToolsError::PortNotFound {
      vertex: from.display_name(),
      port: from_port.to_string(),
    })?;
  let input = inputs
    .get_mut(to_port)
    .ok_or_else(|| GraphToolsError::PortNotFound {
      vertex: to.display_name(),
      port: to_port.to_string(),
    })?;

  if output.type_name != input.type_name {
    return Err(GraphToolsError::PortTypeMismatch {
      from_vertex: from.display_name(),
      from_port: from_port.to_string(),
      from_type: output.type_name.to_string(),
      to_vertex: to.display_name(),
      to_port: to_port.to_string(),
      to_type: input.type_name.to_string(),
    });
  }
  if output.is_connected() {
    return Err(GraphToolsError::PortAlreadyConnected {
      vertex: from.display_name(),
      port: from_port.to_string(),
    });
  }
  if input.is_connected() {
    return Err(GraphToolsError::PortAlreadyConnected {
      vertex: to.display_name(),
      port: to_port.to_string(),
    });
  }

  let out_of_order = order.is_out_of_order();
  output.other_kernel = Some(PeerRef::new(to));
  output.other_name = to_port.to_string();
  output.out_of_order = out_of_order;
  input.other_kernel = Some(PeerRef::new(from));
  input.other_name = from_port.to_string();
  input.out_of_order = out_of_order;
  Ok(())
}
