//! # Replication Test Suite
//!
//! Cloning reachable subgraphs: clone counts, derived wiring, back edges,
//! delivery order, failure modes and committing the copy.

use crate::config::LockPolicy;
use crate::error::{GraphToolsError, Result};
use crate::graph::port::PortMap;
use crate::graph::signal::{Signal, SystemSignalChannel};
use crate::graph::test_support::{assert_all_unlocked, chain, pinned, stage, wire, wire_with};
use crate::graph::traversal::GraphTools;
use crate::graph::vertex::{VertexId, VertexRef};
use crate::graph::wiring::{DeliveryOrder, Link};
use crate::logging;
use std::collections::HashSet;

fn ids(vertices: &[VertexRef]) -> HashSet<VertexId> {
  vertices.iter().map(|v| v.id()).collect()
}

fn reachable_names(tools: &GraphTools, source: &VertexRef) -> Vec<String> {
  let mut names = Vec::new();
  tools
    .bfs_vertices(
      [source],
      &mut |v: &VertexRef, _: &PortMap, names: &mut Vec<String>| -> Result<()> {
        names.push(v.name().to_string());
        Ok(())
      },
      &mut names,
    )
    .unwrap();
  names.sort();
  names
}

/// `(source name, source port, target name, target port)` for every link, sorted.
fn describe(links: &[Link]) -> Vec<(String, String, String, String)> {
  let mut described: Vec<_> = links
    .iter()
    .map(|link| {
      (
        link.source.name().to_string(),
        link.source_port.clone(),
        link.target.name().to_string(),
        link.target_port.clone(),
      )
    })
    .collect();
  described.sort();
  described
}

fn edge(a: &str, ap: &str, b: &str, bp: &str) -> (String, String, String, String) {
  (a.to_string(), ap.to_string(), b.to_string(), bp.to_string())
}

/// a -> b -> c -> a
fn triangle() -> Vec<VertexRef> {
  let g = chain(&["a", "b", "c"]);
  wire(&g[2], "out", &g[0], "in");
  g
}

// ============================================================================
// Source replication
// ============================================================================

#[test]
fn test_replicate_cycle_wires_every_edge() {
  logging::init_for_tests();
  let g = triangle();
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&g[0])
    .unwrap();

  assert_eq!(replica.clone_count(), 3);
  assert_eq!(replica.wiring().len(), 3);
  assert_eq!(
    describe(replica.wiring().links()),
    vec![
      edge("a", "out", "b", "in"),
      edge("b", "out", "c", "in"),
      edge("c", "out", "a", "in"),
    ]
  );

  let originals = ids(&g);
  for link in replica.wiring() {
    assert_ne!(link.source.id(), link.target.id());
    assert!(!originals.contains(&link.source.id()));
    assert!(!originals.contains(&link.target.id()));
  }
  for vertex in &g {
    let clone = replica.clone_of(vertex.id()).unwrap();
    assert_ne!(clone.id(), vertex.id());
    assert_eq!(clone.name(), vertex.name());
  }
  assert_eq!(replica.root().id(), replica.clone_of(g[0].id()).unwrap().id());
  assert_all_unlocked(&g);
}

#[test]
fn test_replicate_chain_from_middle() {
  let g = chain(&["a", "b", "c", "d"]);
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&g[1])
    .unwrap();
  assert_eq!(replica.clone_count(), 3);
  assert!(replica.clone_of(g[0].id()).is_none());
  assert_eq!(
    describe(replica.wiring().links()),
    vec![edge("b", "out", "c", "in"), edge("c", "out", "d", "in")]
  );
}

#[test]
fn test_replicate_diamond_and_back_edge() {
  let a = stage("a", &["back"], &["left", "right"]);
  let b = stage("b", &["in"], &["out"]);
  let c = stage("c", &["in"], &["out"]);
  let d = stage("d", &["from_b", "from_c"], &["loop"]);
  wire(&a, "left", &b, "in");
  wire(&a, "right", &c, "in");
  wire(&b, "out", &d, "from_b");
  wire(&c, "out", &d, "from_c");
  wire(&d, "loop", &a, "back");

  let replica = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap();
  assert_eq!(replica.clone_count(), 4);
  assert_eq!(
    describe(replica.wiring().links()),
    vec![
      edge("a", "left", "b", "in"),
      edge("a", "right", "c", "in"),
      edge("b", "out", "d", "from_b"),
      edge("c", "out", "d", "from_c"),
      edge("d", "loop", "a", "back"),
    ]
  );
}

#[test]
fn test_replicate_single_vertex() {
  let lonely = stage("lonely", &["in"], &["out"]);
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&lonely)
    .unwrap();
  assert_eq!(replica.clone_count(), 1);
  assert!(replica.wiring().is_empty());
  assert_eq!(replica.root().name(), "lonely");
  assert_ne!(replica.root().id(), lonely.id());
}

#[test]
fn test_replicate_self_loop() {
  let a = stage("a", &["in"], &["out"]);
  wire(&a, "out", &a, "in");
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap();
  assert_eq!(replica.clone_count(), 1);
  let links = replica.wiring().links();
  assert_eq!(links.len(), 1);
  assert_eq!(links[0].source.id(), replica.root().id());
  assert_eq!(links[0].target.id(), replica.root().id());
}

#[test]
fn test_replicate_tolerates_unconnected_ports() {
  let a = stage("a", &["unused_in"], &["out", "spare"]);
  let b = stage("b", &["in"], &["dangling"]);
  wire(&a, "out", &b, "in");

  let replica = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap();
  assert_eq!(replica.clone_count(), 2);
  assert_eq!(
    describe(replica.wiring().links()),
    vec![edge("a", "out", "b", "in")]
  );
}

#[test]
fn test_replicate_preserves_delivery_order() {
  let a = stage("a", &[], &["fast", "ordered"]);
  let b = stage("b", &["fast", "ordered"], &[]);
  wire_with(&a, "fast", &b, "fast", DeliveryOrder::OutOfOrder);
  wire_with(&a, "ordered", &b, "ordered", DeliveryOrder::InOrder);

  let replica = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap();
  for link in replica.wiring() {
    let expected = if link.source_port == "fast" {
      DeliveryOrder::OutOfOrder
    } else {
      DeliveryOrder::InOrder
    };
    assert_eq!(link.order, expected, "port {}", link.source_port);
  }

  replica.commit(&LockPolicy::default()).unwrap();
  let ports = replica.root().output().try_lock().unwrap();
  assert!(ports["fast"].out_of_order);
  assert!(!ports["ordered"].out_of_order);
}

#[test]
fn test_clone_has_fresh_signal_queue() {
  let g = chain(&["a", "b"]);
  g[0].send_system_signal(Signal::Eof);
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&g[0])
    .unwrap();
  assert_eq!(replica.root().get_system_signal(), Signal::None);
  assert_eq!(g[0].get_system_signal(), Signal::Eof);
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_uncloneable_vertex_fails_replication() {
  let a = stage("a", &[], &["out"]);
  let b = pinned("b", &["in"], &["out"]);
  let c = stage("c", &["in"], &[]);
  wire(&a, "out", &b, "in");
  wire(&b, "out", &c, "in");

  let err = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap_err();
  assert_eq!(
    err,
    GraphToolsError::CloneNotSupported {
      vertex: "Pinned(b)".to_string()
    }
  );
  assert_all_unlocked(&[a, b, c]);
}

#[test]
fn test_dropped_peer_is_an_unresolved_back_edge() {
  let a = stage("a", &[], &["out"]);
  let gone = {
    let b = stage("b", &["in"], &[]);
    wire(&a, "out", &b, "in");
    b.id()
  };

  let err = GraphTools::default()
    .replicate_from_source_vertex(&a)
    .unwrap_err();
  assert_eq!(
    err,
    GraphToolsError::UnresolvedBackEdge {
      vertex: "Stage(a)".to_string(),
      port: "out".to_string(),
      target: gone,
    }
  );
}

#[test]
fn test_cancelled_replication_returns_nothing() {
  let g = chain(&["a", "b"]);
  let tools = GraphTools::default();
  tools.cancel_flag().cancel();
  assert_eq!(
    tools.replicate_from_source_vertex(&g[0]).unwrap_err(),
    GraphToolsError::Cancelled
  );
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn test_committed_copy_is_isolated() {
  let g = triangle();
  let tools = GraphTools::default();
  let replica = tools.replicate_from_source_vertex(&g[0]).unwrap();
  replica.commit(&tools.config().lock).unwrap();

  assert_eq!(reachable_names(&tools, replica.root()), vec!["a", "b", "c"]);

  let originals = ids(&g);
  let mut peers = Vec::new();
  tools
    .bfs_vertices(
      [replica.root()],
      &mut |_: &VertexRef, ports: &PortMap, peers: &mut Vec<VertexId>| -> Result<()> {
        peers.extend(ports.values().filter_map(|p| p.other_kernel.as_ref().map(|r| r.id())));
        Ok(())
      },
      &mut peers,
    )
    .unwrap();
  assert_eq!(peers.len(), 3);
  assert!(peers.iter().all(|id| !originals.contains(id)));

  // the originals still point at each other
  for (vertex, next) in g.iter().zip(g.iter().cycle().skip(1)) {
    let ports = vertex.output().try_lock().unwrap();
    assert_eq!(ports["out"].peer().unwrap().id(), next.id());
  }
}

#[test]
fn test_commit_twice_reports_connected_ports() {
  let g = chain(&["a", "b"]);
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&g[0])
    .unwrap();
  let policy = LockPolicy::default();
  replica.commit(&policy).unwrap();
  assert!(matches!(
    replica.commit(&policy).unwrap_err(),
    GraphToolsError::PortAlreadyConnected { .. }
  ));
}

// ============================================================================
// Sink replication
// ============================================================================

#[test]
fn test_replicate_from_sink_copies_upstream() {
  let a = stage("a", &[], &["out"]);
  let b = stage("b", &[], &["out"]);
  let c = stage("c", &["left", "right"], &["out"]);
  let d = stage("d", &["in"], &[]);
  wire(&a, "out", &c, "left");
  wire(&b, "out", &c, "right");
  wire(&c, "out", &d, "in");

  let tools = GraphTools::default();
  let replica = tools.replicate_from_sink_vertex(&c).unwrap();
  assert_eq!(replica.clone_count(), 3);
  assert!(replica.clone_of(d.id()).is_none());
  assert_eq!(
    describe(replica.wiring().links()),
    vec![edge("a", "out", "c", "left"), edge("b", "out", "c", "right")]
  );

  replica.commit(&tools.config().lock).unwrap();
  let root_inputs = replica.root().input().try_lock().unwrap();
  assert!(root_inputs.values().all(|p| p.is_connected()));
  drop(root_inputs);
  assert!(!replica.root().output().try_lock().unwrap()["out"].is_connected());
}

#[test]
fn test_replicate_from_sink_handles_cycles() {
  let g = triangle();
  let replica = GraphTools::default()
    .replicate_from_sink_vertex(&g[1])
    .unwrap();
  assert_eq!(replica.clone_count(), 3);
  assert_eq!(
    describe(replica.wiring().links()),
    vec![
      edge("a", "out", "b", "in"),
      edge("b", "out", "c", "in"),
      edge("c", "out", "a", "in"),
    ]
  );
}

#[test]
fn test_replicate_from_sink_rejects_uncloneable_upstream() {
  let a = pinned("a", &[], &["out"]);
  let b = stage("b", &[], &["out"]);
  let c = stage("c", &["left", "right"], &[]);
  wire(&a, "out", &c, "left");
  wire(&b, "out", &c, "right");

  let err = GraphTools::default()
    .replicate_from_sink_vertex(&c)
    .unwrap_err();
  assert_eq!(
    err,
    GraphToolsError::CloneNotSupported {
      vertex: "Pinned(a)".to_string()
    }
  );
  assert_all_unlocked(&[a, b, c]);
}

#[test]
fn test_replicate_from_sink_reports_dropped_upstream() {
  let c = stage("c", &["in"], &[]);
  let gone = {
    let b = stage("b", &[], &["out"]);
    wire(&b, "out", &c, "in");
    b.id()
  };

  let err = GraphTools::default()
    .replicate_from_sink_vertex(&c)
    .unwrap_err();
  assert_eq!(
    err,
    GraphToolsError::UnresolvedBackEdge {
      vertex: "Stage(c)".to_string(),
      port: "in".to_string(),
      target: gone,
    }
  );
  assert_all_unlocked(&[c]);
}

// ============================================================================
// Replica accessors
// ============================================================================

#[test]
fn test_replica_exposes_identity_and_parts() {
  let g = chain(&["a", "b", "c"]);
  let replica = GraphTools::default()
    .replicate_from_source_vertex(&g[0])
    .unwrap();

  let identity = replica.identity();
  assert_eq!(identity.len(), 3);
  assert_eq!(identity.keys().copied().collect::<HashSet<_>>(), ids(&g));

  let mut clone_names: Vec<&str> = replica.clones().map(|v| v.name()).collect();
  clone_names.sort();
  assert_eq!(clone_names, vec!["a", "b", "c"]);
  let originals = ids(&g);
  assert!(replica.clones().all(|v| !originals.contains(&v.id())));

  let root_id = replica.root().id();
  let (root, identity, wiring) = replica.into_parts();
  assert_eq!(root.id(), root_id);
  assert_eq!(identity[&g[0].id()].id(), root_id);
  assert_eq!(wiring.len(), 2);

  wiring.commit(&LockPolicy::default()).unwrap();
  assert_eq!(
    reachable_names(&GraphTools::default(), &root),
    vec!["a", "b", "c"]
  );
}
