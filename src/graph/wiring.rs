//! # Wiring Maps
//!
//! A [`WiringMap`] collects edges that have been decided but not yet written
//! into any port table. Replication produces one describing every edge among
//! the cloned vertices; [`WiringMap::commit`] writes them into the clones'
//! real port tables.

use crate::config::LockPolicy;
use crate::error::Result;
use crate::graph::port::connect;
use crate::graph::vertex::{VertexId, VertexRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Delivery semantics of an edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryOrder {
  /// Items arrive in the order they were sent.
  #[default]
  InOrder,
  /// Items may be reordered in transit.
  OutOfOrder,
}

impl DeliveryOrder {
  /// Maps a port's `out_of_order` flag to a delivery order.
  pub fn from_out_of_order(out_of_order: bool) -> Self {
    if out_of_order {
      Self::OutOfOrder
    } else {
      Self::InOrder
    }
  }

  /// Returns true for [`DeliveryOrder::OutOfOrder`].
  pub fn is_out_of_order(self) -> bool {
    self == Self::OutOfOrder
  }
}

/// A pending edge from `source[source_port]` to `target[target_port]`.
#[derive(Clone, Debug)]
pub struct Link {
  /// Upstream vertex.
  pub source: VertexRef,
  /// Output port on `source`.
  pub source_port: String,
  /// Downstream vertex.
  pub target: VertexRef,
  /// Input port on `target`.
  pub target_port: String,
  /// Delivery order of the edge.
  pub order: DeliveryOrder,
}

/// Edges waiting to be committed into port tables.
#[derive(Clone, Debug, Default)]
pub struct WiringMap {
  links: Vec<Link>,
}

impl WiringMap {
  /// Creates an empty map.
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a link request.
  pub fn link(
    &mut self,
    source: &VertexRef,
    source_port: impl Into<String>,
    target: &VertexRef,
    target_port: impl Into<String>,
    order: DeliveryOrder,
  ) {
    self.links.push(Link {
      source: VertexRef::clone(source),
      source_port: source_port.into(),
      target: VertexRef::clone(target),
      target_port: target_port.into(),
      order,
    });
  }

  /// Returns the recorded links in insertion order.
  pub fn links(&self) -> &[Link] {
    &self.links
  }

  /// Iterates the recorded links.
  pub fn iter(&self) -> std::slice::Iter<'_, Link> {
    self.links.iter()
  }

  /// Number of recorded links.
  pub fn len(&self) -> usize {
    self.links.len()
  }

  /// Returns true if no link is recorded.
  pub fn is_empty(&self) -> bool {
    self.links.is_empty()
  }

  /// Identities of every vertex appearing as an endpoint.
  pub fn vertex_ids(&self) -> BTreeSet<VertexId> {
    self
      .links
      .iter()
      .flat_map(|link| [link.source.id(), link.target.id()])
      .collect()
  }

  /// Returns true if `id` appears as an endpoint of any link.
  pub fn references(&self, id: VertexId) -> bool {
    self
      .links
      .iter()
      .any(|link| link.source.id() == id || link.target.id() == id)
  }

  /// Connects every link in order, stopping at the first failure.
  ///
  /// Links committed before a failure stay connected.
  pub fn commit(&self, policy: &LockPolicy) -> Result<()> {
    debug!("WiringMap::commit(links={})", self.links.len());
    for link in &self.links {
      connect(
        &link.source,
        &link.source_port,
        &link.target,
        &link.target_port,
        link.order,
        policy,
      )?;
    }
    Ok(())
  }
}

impl<'a> IntoIterator for &'a WiringMap {
  type Item = &'a Link;
  type IntoIter = std::slice::Iter<'a, Link>;

  fn into_iter(self) -> Self::IntoIter {
    self.links.iter()
  }
}
