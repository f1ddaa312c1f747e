//! # Subgraph Replication
//!
//! Duplicates everything reachable from a vertex into an isolated copy. The
//! traversal engine drives a vertex visitor that clones each vertex on first
//! visit and works out, from the original's locked port table, which edges
//! the clone needs:
//!
//! - If the peer on the other end has already been cloned, the edge between
//!   the two clones goes straight into the [`WiringMap`]
//! - Otherwise (the peer comes later in traversal order, or the edge closes a
//!   cycle) the edge is parked as unmatched
//!
//! Once the walk is done every parked edge is resolved against the complete
//! identity map. An edge whose peer was never cloned fails the whole
//! replication with `UnresolvedBackEdge`, as does any vertex whose kernel
//! refuses duplication (`CloneNotSupported`); no partial result is returned.
//!
//! The resulting wiring covers exactly the edges among the reached vertices,
//! with clones at both ends and never an original. Nothing is connected until
//! the caller commits it.
//!
//! ## Directions
//!
//! [`GraphTools::replicate_from_source_vertex`] follows output ports
//! downstream; [`GraphTools::replicate_from_sink_vertex`] follows input ports
//! upstream from a sink and copies everything feeding it.

use crate::config::LockPolicy;
use crate::error::{GraphToolsError, Result};
use crate::graph::port::{PortDirection, PortInfo, PortMap};
use crate::graph::traversal::{GraphTools, SearchOrder, Visit};
use crate::graph::vertex::{VertexId, VertexRef};
use crate::graph::wiring::WiringMap;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Original vertex identity to its clone.
pub type IdentityMap = HashMap<VertexId, VertexRef>;

/// An isolated copy of a subgraph: the clones plus the edges among them.
///
/// Port tables only hold weak references, so the replica is what keeps the
/// clones alive; keep it (or its parts) for as long as the copy is in use.
#[derive(Clone, Debug)]
pub struct Replica {
  root: VertexRef,
  identity: IdentityMap,
  wiring: WiringMap,
}

impl Replica {
  /// The clone of the vertex replication started from.
  pub fn root(&self) -> &VertexRef {
    &self.root
  }

  /// The clone of the original vertex `original`, if it was reached.
  pub fn clone_of(&self, original: VertexId) -> Option<&VertexRef> {
    self.identity.get(&original)
  }

  /// Original identity to clone, for every reached vertex.
  pub fn identity(&self) -> &IdentityMap {
    &self.identity
  }

  /// Iterates the clones.
  pub fn clones(&self) -> impl Iterator<Item = &VertexRef> {
    self.identity.values()
  }

  /// Number of cloned vertices.
  pub fn clone_count(&self) -> usize {
    self.identity.len()
  }

  /// Edges among the clones, not yet committed.
  pub fn wiring(&self) -> &WiringMap {
    &self.wiring
  }

  /// Connects every pending edge among the clones.
  pub fn commit(&self, policy: &LockPolicy) -> Result<()> {
    self.wiring.commit(policy)
  }

  /// Splits the replica into root clone, identity map and wiring.
  pub fn into_parts(self) -> (VertexRef, IdentityMap, WiringMap) {
    (self.root, self.identity, self.wiring)
  }
}

/// An edge whose peer had not been cloned when its owner was visited.
struct UnmatchedEdge {
  clone: VertexRef,
  vertex: String,
  target: VertexId,
  port: PortInfo,
}

struct ReplicationState {
  direction: PortDirection,
  identity: IdentityMap,
  unmatched: Vec<UnmatchedEdge>,
  wiring: WiringMap,
}

impl ReplicationState {
  fn new(direction: PortDirection) -> Self {
    Self {
      direction,
      identity: IdentityMap::new(),
      unmatched: Vec::new(),
      wiring: WiringMap::new(),
    }
  }

  /// Records the edge through `port` of `clone` to `peer_clone`, oriented
  /// from output to input whichever table `port` came from.
  fn wire(&mut self, clone: &VertexRef, port: &PortInfo, peer_clone: &VertexRef) {
    let order = port.order();
    match self.direction {
      PortDirection::Output => {
        self
          .wiring
          .link(clone, &port.my_name, peer_clone, &port.other_name, order)
      }
      PortDirection::Input => {
        self
          .wiring
          .link(peer_clone, &port.other_name, clone, &port.my_name, order)
      }
    }
  }

  fn resolve_unmatched(&mut self) -> Result<()> {
    let unmatched = std::mem::take(&mut self.unmatched);
    trace!("ReplicationState::resolve_unmatched(edges={})", unmatched.len());
    for edge in unmatched {
      let Some(peer_clone) = self.identity.get(&edge.target).cloned() else {
        return Err(GraphToolsError::UnresolvedBackEdge {
          vertex: edge.vertex,
          port: edge.port.my_name,
          target: edge.target,
        });
      };
      self.wire(&edge.clone, &edge.port, &peer_clone);
    }
    Ok(())
  }
}

fn clone_on_visit(
  current: &VertexRef,
  ports: &PortMap,
  state: &mut ReplicationState,
) -> Result<()> {
  let clone = current
    .clone_vertex()
    .ok_or_else(|| GraphToolsError::CloneNotSupported {
      vertex: current.display_name(),
    })?;

  let previous = state
    .identity
    .insert(current.id(), VertexRef::clone(&clone));
  debug_assert!(previous.is_none(), "vertex {} cloned twice", current.id());
  if previous.is_some() {
    return Err(GraphToolsError::Internal(format!(
      "vertex {} cloned twice during replication",
      current.id()
    )));
  }

  for port in ports.values() {
    // Unconnected ports stay unconnected on the clone.
    let Some(peer) = &port.other_kernel else {
      continue;
    };
    match state.identity.get(&peer.id()).cloned() {
      Some(peer_clone) => state.wire(&clone, port, &peer_clone),
      None => state.unmatched.push(UnmatchedEdge {
        clone: VertexRef::clone(&clone),
        vertex: current.display_name(),
        target: peer.id(),
        port: port.clone(),
      }),
    }
  }
  Ok(())
}

impl GraphTools {
  /// Clones every vertex reachable downstream of `start` and derives the
  /// edges among the clones.
  pub fn replicate_from_source_vertex(&self, start: &VertexRef) -> Result<Replica> {
    self.replicate(start, PortDirection::Output)
  }

  /// Clones every vertex upstream of `start` (everything feeding it) and
  /// derives the edges among the clones.
  pub fn replicate_from_sink_vertex(&self, start: &VertexRef) -> Result<Replica> {
    self.replicate(start, PortDirection::Input)
  }

  fn replicate(&self, start: &VertexRef, direction: PortDirection) -> Result<Replica> {
    debug!(
      "GraphTools::replicate(start={}, direction={})",
      start.display_name(),
      direction
    );
    let mut state = ReplicationState::new(direction);
    let mut visitor = clone_on_visit;
    self.walk(
      [start],
      SearchOrder::BreadthFirst,
      Visit::Vertices {
        visitor: &mut visitor,
        direction,
      },
      &mut state,
    )?;
    state.resolve_unmatched()?;

    let root = state.identity.get(&start.id()).cloned().ok_or_else(|| {
      GraphToolsError::Internal(format!("start vertex {} was never cloned", start.id()))
    })?;
    debug!(
      "GraphTools::replicate done: clones={}, links={}",
      state.identity.len(),
      state.wiring.len()
    );
    Ok(Replica {
      root,
      identity: state.identity,
      wiring: state.wiring,
    })
  }
}
