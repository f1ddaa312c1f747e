//! # StreamWeave Graph Tools
//!
//! Graph analysis for live dataflow graphs: vertices connected by named, typed
//! ports, queried and copied while the stages behind them may be running.
//!
//! ## Key Features
//!
//! - **Live Traversal**: Breadth-first and depth-first walks over the vertex/port
//!   graph, taking each vertex's port-table lock with a bounded try-lock/backoff
//! - **Two Visitor Shapes**: Edge visitors see both resolved endpoints of every
//!   connected edge, vertex visitors see each vertex once with its locked ports
//! - **Structural Checks**: Optional detection of unconnected output ports
//! - **Subgraph Replication**: Clone everything reachable from a vertex and
//!   re-derive the edges among the clones as a [`WiringMap`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamweave_graphtools::{GraphTools, PortMap, Result, VertexRef};
//!
//! # fn run(source: VertexRef) -> Result<()> {
//! let tools = GraphTools::default();
//! let mut names = Vec::new();
//! tools.bfs_vertices(
//!   [&source],
//!   &mut |vertex: &VertexRef, _ports: &PortMap, names: &mut Vec<String>| -> Result<()> {
//!     names.push(vertex.name().to_string());
//!     Ok(())
//!   },
//!   &mut names,
//! )?;
//!
//! let replica = tools.replicate_from_source_vertex(&source)?;
//! replica.commit(&tools.config().lock)?;
//! let copy = replica.root();
//! # let _ = copy;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Lock-acquisition policy and crate configuration.
pub mod config;
/// Error type shared by every graph operation.
pub mod error;
/// Vertices, ports, visitors, traversal and replication.
pub mod graph;
/// Subscriber setup for binaries and tests.
pub mod logging;

pub use config::*;
pub use error::*;
pub use graph::*;
