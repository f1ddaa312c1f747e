//! # Traversal Engine
//!
//! [`GraphTools`] walks the live vertex/port graph from one or more sources,
//! breadth-first (level order, FIFO) or depth-first (pre-order, LIFO), driving
//! either an [`EdgeVisitor`] or a [`VertexVisitor`].
//!
//! ## Per-Step Protocol
//!
//! 1. Check the cancellation flag, then take the next vertex off the frontier
//! 2. Lock its port table under the configured [`LockPolicy`](crate::config::LockPolicy)
//! 3. Vertex mode: call the visitor with the locked ports
//! 4. For each port: edge mode resolves the peer's matching input and calls
//!    the visitor; an unconnected port is skipped, or is fatal when
//!    `connected_error` is set
//! 5. Every connected peer not seen before is added to the frontier
//! 6. Release the lock
//!
//! Breadth-first walks mark a vertex when it is discovered, and all sources
//! are marked before the first step, so a source reachable from another
//! source is still visited exactly once. Depth-first walks mark a vertex when
//! it is popped and skip stale stack entries, so a vertex first pushed by a
//! shallow parent is still entered from the deepest path that reaches it.
//! Within one vertex, ports are enumerated in table order, which is
//! unspecified.
//!
//! ## Consistency
//!
//! Each vertex's table is read as a consistent snapshot under its own lock,
//! but nothing is held across vertices: if the scheduler rewires edges during
//! a walk, the visited topology need not match any single instant. Data
//! flowing through established edges is harmless.

use crate::config::GraphToolsConfig;
use crate::error::{GraphToolsError, Result};
use crate::graph::port::PortDirection;
use crate::graph::vertex::{VertexId, VertexRef};
use crate::graph::visitor::{EdgeVisitor, VertexVisitor};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// Cooperative cancellation shared between a caller and running traversals.
///
/// Checked before every frontier pop and while waiting for a lock. Once set,
/// every operation of the owning [`GraphTools`] fails with `Cancelled` until
/// [`reset`](Self::reset) is called.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  /// Creates an unset flag.
  pub fn new() -> Self {
    Self::default()
  }

  /// Requests cancellation.
  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  /// Returns true once cancellation was requested.
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }

  /// Clears a previous request.
  pub fn reset(&self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Frontier discipline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOrder {
  /// FIFO queue, level order.
  BreadthFirst,
  /// LIFO stack, pre-order.
  DepthFirst,
}

/// Counters collected by one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
  /// Vertices taken off the frontier.
  pub vertices: usize,
  /// Edges handed to an edge visitor.
  pub edges: usize,
  /// Failed try-lock attempts across all port tables.
  pub lock_retries: u64,
}

enum Frontier {
  Queue(VecDeque<VertexRef>),
  Stack(Vec<VertexRef>),
}

impl Frontier {
  fn new(order: SearchOrder) -> Self {
    match order {
      SearchOrder::BreadthFirst => Self::Queue(VecDeque::new()),
      SearchOrder::DepthFirst => Self::Stack(Vec::new()),
    }
  }

  fn pop(&mut self) -> Option<VertexRef> {
    match self {
      Self::Queue(queue) => queue.pop_front(),
      Self::Stack(stack) => stack.pop(),
    }
  }

  /// Adds vertices so that the first one given is the first one popped
  /// among them.
  fn extend(&mut self, vertices: Vec<VertexRef>) {
    match self {
      Self::Queue(queue) => queue.extend(vertices),
      Self::Stack(stack) => stack.extend(vertices.into_iter().rev()),
    }
  }
}

/// Which callback a walk drives.
pub(crate) enum Visit<'v, C: ?Sized> {
  Edges {
    visitor: &'v mut dyn EdgeVisitor<C>,
    connected_error: bool,
  },
  Vertices {
    visitor: &'v mut dyn VertexVisitor<C>,
    direction: PortDirection,
  },
}

impl<C: ?Sized> Visit<'_, C> {
  /// Table followed from each vertex. Edge walks always run downstream.
  fn direction(&self) -> PortDirection {
    match self {
      Self::Edges { .. } => PortDirection::Output,
      Self::Vertices { direction, .. } => *direction,
    }
  }
}

/// Traversal and replication over live dataflow graphs.
///
/// # Example
///
/// ```rust,no_run
/// use streamweave_graphtools::{GraphTools, PortInfo, Result, VertexRef};
///
/// # fn run(source: VertexRef) -> Result<()> {
/// let tools = GraphTools::default();
/// let mut edges = Vec::new();
/// tools.bfs_edges(
///   [&source],
///   &mut |from: &PortInfo, to: &PortInfo, edges: &mut Vec<(String, String)>| -> Result<()> {
///     edges.push((from.my_name.clone(), to.my_name.clone()));
///     Ok(())
///   },
///   &mut edges,
///   true,
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct GraphTools {
  config: GraphToolsConfig,
  cancel: CancelFlag,
}

impl GraphTools {
  /// Creates graph tools with the given configuration and a fresh cancel flag.
  pub fn new(config: GraphToolsConfig) -> Self {
    Self {
      config,
      cancel: CancelFlag::new(),
    }
  }

  /// Uses `cancel` as this instance's cancellation flag.
  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }

  /// Returns the configuration.
  pub fn config(&self) -> &GraphToolsConfig {
    &self.config
  }

  /// Returns the cancellation flag.
  pub fn cancel_flag(&self) -> &CancelFlag {
    &self.cancel
  }

  /// Breadth-first walk calling `visitor` once per connected edge.
  ///
  /// With `connected_error` set, an output port without a live peer fails the
  /// walk with `UnconnectedPort`; otherwise such ports are skipped.
  pub fn bfs_edges<'s, C, V>(
    &self,
    sources: impl IntoIterator<Item = &'s VertexRef>,
    visitor: &mut V,
    context: &mut C,
    connected_error: bool,
  ) -> Result<TraversalStats>
  where
    C: ?Sized,
    V: EdgeVisitor<C>,
  {
    self.walk(
      sources,
      SearchOrder::BreadthFirst,
      Visit::Edges {
        visitor,
        connected_error,
      },
      context,
    )
  }

  /// Breadth-first walk calling `visitor` once per reachable vertex, in level order.
  pub fn bfs_vertices<'s, C, V>(
    &self,
    sources: impl IntoIterator<Item = &'s VertexRef>,
    visitor: &mut V,
    context: &mut C,
  ) -> Result<TraversalStats>
  where
    C: ?Sized,
    V: VertexVisitor<C>,
  {
    self.walk(
      sources,
      SearchOrder::BreadthFirst,
      Visit::Vertices {
        visitor,
        direction: PortDirection::Output,
      },
      context,
    )
  }

  /// Depth-first counterpart of [`bfs_edges`](Self::bfs_edges).
  pub fn dfs_edges<'s, C, V>(
    &self,
    sources: impl IntoIterator<Item = &'s VertexRef>,
    visitor: &mut V,
    context: &mut C,
    connected_error: bool,
  ) -> Result<TraversalStats>
  where
    C: ?Sized,
    V: EdgeVisitor<C>,
  {
    self.walk(
      sources,
      SearchOrder::DepthFirst,
      Visit::Edges {
        visitor,
        connected_error,
      },
      context,
    )
  }

  /// Depth-first counterpart of [`bfs_vertices`](Self::bfs_vertices), in pre-order.
  pub fn dfs_vertices<'s, C, V>(
    &self,
    sources: impl IntoIterator<Item = &'s VertexRef>,
    visitor: &mut V,
    context: &mut C,
  ) -> Result<TraversalStats>
  where
    C: ?Sized,
    V: VertexVisitor<C>,
  {
    self.walk(
      sources,
      SearchOrder::DepthFirst,
      Visit::Vertices {
        visitor,
        direction: PortDirection::Output,
      },
      context,
    )
  }

  pub(crate) fn walk<'s, C: ?Sized>(
    &self,
    sources: impl IntoIterator<Item = &'s VertexRef>,
    order: SearchOrder,
    mut visit: Visit<'_, C>,
    context: &mut C,
  ) -> Result<TraversalStats> {
    let direction = visit.direction();
    let lock = &self.config.lock;
    let mark_on_pop = order == SearchOrder::DepthFirst;
    let mut visited: HashSet<VertexId> = HashSet::new();
    let mut frontier = Frontier::new(order);

    let mut seeded: HashSet<VertexId> = HashSet::new();
    let seeds: Vec<VertexRef> = sources
      .into_iter()
      .filter(|source| seeded.insert(source.id()))
      .cloned()
      .collect();
    if !mark_on_pop {
      visited = seeded;
    }
    debug!(
      "GraphTools::walk(order={:?}, direction={}, sources={})",
      order,
      direction,
      seeds.len()
    );
    frontier.extend(seeds);

    let mut stats = TraversalStats::default();
    loop {
      if self.cancel.is_cancelled() {
        debug!("GraphTools::walk cancelled after {} vertices", stats.vertices);
        return Err(GraphToolsError::Cancelled);
      }
      let Some(vertex) = frontier.pop() else {
        break;
      };
      if mark_on_pop && !visited.insert(vertex.id()) {
        continue;
      }

      let (ports, retries) = vertex.ports(direction).acquire(lock, Some(&self.cancel))?;
      stats.lock_retries += u64::from(retries);
      stats.vertices += 1;
      trace!("GraphTools::walk visiting {}", vertex.display_name());

      if let Visit::Vertices { visitor, .. } = &mut visit {
        visitor.visit_vertex(&vertex, &ports, context)?;
      }

      let mut discovered = Vec::new();
      for port in ports.values() {
        let Some(peer) = port.peer() else {
          if let Some(gone) = &port.other_kernel {
            warn!(
              "GraphTools::walk: {}[\"{}\"] points at dropped vertex {}",
              vertex.display_name(),
              port.my_name,
              gone.id()
            );
          }
          if let Visit::Edges {
            connected_error: true,
            ..
          } = &visit
          {
            return Err(GraphToolsError::UnconnectedPort {
              vertex: vertex.display_name(),
              port: port.my_name.clone(),
            });
          }
          continue;
        };

        if let Visit::Edges { visitor, .. } = &mut visit {
          let target = peer
            .input()
            .find_by_name(&port.other_name, lock, Some(&self.cancel))?;
          visitor.visit_edge(port, &target, context)?;
          stats.edges += 1;
        }

        let unseen = if mark_on_pop {
          !visited.contains(&peer.id())
        } else {
          visited.insert(peer.id())
        };
        if unseen {
          discovered.push(peer);
        }
      }
      drop(ports);
      frontier.extend(discovered);
    }

    debug!(
      "GraphTools::walk done: vertices={}, edges={}, lock_retries={}",
      stats.vertices, stats.edges, stats.lock_retries
    );
    Ok(stats)
  }
}
