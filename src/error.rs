//! # Error Handling
//!
//! Every traversal and replication operation reports failure through
//! [`GraphToolsError`]. None of these errors are retried internally: a
//! structural error means the graph needs repair before the operation is
//! attempted again, so the caller decides whether to abort or fix and retry.
//!
//! ## Error Kinds
//!
//! - **Structural**: `UnconnectedPort`, `PortNotFound`, `PortTypeMismatch`,
//!   `PortAlreadyConnected`
//! - **Replication**: `CloneNotSupported`, `UnresolvedBackEdge`
//! - **Scheduling**: `LockTimeout`, `Cancelled`
//! - **Defects**: `Internal` (identity map corruption and similar)
//! - **Configuration**: `Config`
//!
//! Port-table locks are released before any of these reach the caller.

use crate::graph::port::PortDirection;
use crate::graph::vertex::VertexId;
use std::time::Duration;
use thiserror::Error;

/// Error type for graph traversal, wiring and replication.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum GraphToolsError {
  /// An output port with no connected destination was found while
  /// unconnected ports were treated as fatal.
  #[error("unconnected port detected at {vertex}[\"{port}\"], please fix and reconnect")]
  UnconnectedPort {
    /// Display name of the vertex owning the port.
    vertex: String,
    /// Name of the unconnected port.
    port: String,
  },
  /// A port looked up by name does not exist on the vertex.
  #[error("port \"{port}\" not found on {vertex}")]
  PortNotFound {
    /// Display name of the vertex searched.
    vertex: String,
    /// Name that failed to resolve.
    port: String,
  },
  /// The two ends of an edge carry different data types.
  #[error(
    "cannot connect {from_vertex}[\"{from_port}\"] ({from_type}) to {to_vertex}[\"{to_port}\"] ({to_type})"
  )]
  PortTypeMismatch {
    /// Display name of the upstream vertex.
    from_vertex: String,
    /// Upstream output port.
    from_port: String,
    /// Data type of the upstream output port.
    from_type: String,
    /// Display name of the downstream vertex.
    to_vertex: String,
    /// Downstream input port.
    to_port: String,
    /// Data type of the downstream input port.
    to_type: String,
  },
  /// The port already has a peer.
  #[error("port {vertex}[\"{port}\"] is already connected")]
  PortAlreadyConnected {
    /// Display name of the vertex owning the port.
    vertex: String,
    /// Name of the port.
    port: String,
  },
  /// The vertex's kernel refuses duplication.
  #[error("attempted to clone {vertex}, which does not support cloning")]
  CloneNotSupported {
    /// Display name of the vertex.
    vertex: String,
  },
  /// An edge recorded during replication never found a cloned peer.
  #[error("edge {vertex}[\"{port}\"] -> {target} has no cloned peer after replication")]
  UnresolvedBackEdge {
    /// Display name of the original vertex owning the edge.
    vertex: String,
    /// Port on that vertex.
    port: String,
    /// Identity of the peer that was never cloned.
    target: VertexId,
  },
  /// A port-table lock was not acquired within the configured timeout.
  #[error("timed out after {waited:?} waiting for the {table} port table of {vertex}")]
  LockTimeout {
    /// Display name of the vertex owning the table.
    vertex: String,
    /// Which table was being locked.
    table: PortDirection,
    /// Time spent waiting.
    waited: Duration,
  },
  /// The operation observed its cancellation flag.
  #[error("graph operation cancelled")]
  Cancelled,
  /// An internal invariant was broken.
  #[error("internal consistency violation: {0}")]
  Internal(String),
  /// Configuration failed to parse or validate.
  #[error("invalid configuration: {0}")]
  Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = GraphToolsError> = std::result::Result<T, E>;
