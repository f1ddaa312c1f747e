//! # Visitors
//!
//! The traversal engine calls back into one of two visitor shapes:
//!
//! - [`EdgeVisitor`]: once per connected edge, with the output port and the
//!   input port it feeds, both already resolved
//! - [`VertexVisitor`]: once per distinct vertex, when it is taken off the
//!   frontier and before its edges are followed
//!
//! The context is a caller-owned value of any type, threaded through every
//! call unchanged. Closures with matching signatures implement both traits.
//!
//! Visitors run while the engine holds the current vertex's port-table lock.
//! A vertex visitor reads that table through the map it is handed and must
//! not lock it again; no lock is re-entrant. Returning an error stops the
//! traversal and the lock is released before the error reaches the caller.

use crate::error::Result;
use crate::graph::port::{PortInfo, PortMap};
use crate::graph::vertex::VertexRef;

/// Callback invoked once per connected, resolved edge.
pub trait EdgeVisitor<C: ?Sized> {
  /// Visits the edge from `source` (an output port) to `target` (the input port it feeds).
  fn visit_edge(&mut self, source: &PortInfo, target: &PortInfo, context: &mut C) -> Result<()>;
}

impl<C, F> EdgeVisitor<C> for F
where
  C: ?Sized,
  F: FnMut(&PortInfo, &PortInfo, &mut C) -> Result<()>,
{
  fn visit_edge(&mut self, source: &PortInfo, target: &PortInfo, context: &mut C) -> Result<()> {
    self(source, target, context)
  }
}

/// Callback invoked once per distinct vertex.
pub trait VertexVisitor<C: ?Sized> {
  /// Visits `vertex`. `ports` is the table being traversed (the output table
  /// for downstream walks), read under the engine's lock.
  fn visit_vertex(&mut self, vertex: &VertexRef, ports: &PortMap, context: &mut C) -> Result<()>;
}

impl<C, F> VertexVisitor<C> for F
where
  C: ?Sized,
  F: FnMut(&VertexRef, &PortMap, &mut C) -> Result<()>,
{
  fn visit_vertex(&mut self, vertex: &VertexRef, ports: &PortMap, context: &mut C) -> Result<()> {
    self(vertex, ports, context)
  }
}
