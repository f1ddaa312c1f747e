//! Graph analysis for StreamWeave dataflow graphs.
//!
//! Vertices own an input and an output port table; a connected output port
//! names its peer vertex and the matching input port on it. This module walks
//! that live structure (breadth-first or depth-first, with edge or vertex
//! visitors) and replicates reachable subgraphs into isolated copies.

pub mod port;
pub mod replication;
pub mod signal;
pub mod traversal;
pub mod vertex;
pub mod visitor;
pub mod wiring;

pub use port::*;
pub use replication::*;
pub use signal::*;
pub use traversal::*;
pub use vertex::*;
pub use visitor::*;
pub use wiring::*;

#[cfg(test)]
mod replication_test;
#[cfg(test)]
mod test_support;
