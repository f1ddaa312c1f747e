//! Fixtures shared by the graph test suites.

use crate::config::LockPolicy;
use crate::graph::port::connect;
use crate::graph::vertex::{Kernel, Vertex, VertexRef};
use crate::graph::wiring::DeliveryOrder;

/// Kernel that can be duplicated.
pub(crate) struct Stage;

impl Kernel for Stage {
  fn kind(&self) -> &str {
    "Stage"
  }

  fn duplicate(&self) -> Option<Box<dyn Kernel>> {
    Some(Box::new(Stage))
  }
}

/// Kernel that refuses duplication.
pub(crate) struct Pinned;

impl Kernel for Pinned {
  fn kind(&self) -> &str {
    "Pinned"
  }
}

fn build(
  name: &str,
  kernel: impl Kernel + 'static,
  inputs: &[&str],
  outputs: &[&str],
) -> VertexRef {
  let builder = inputs
    .iter()
    .fold(Vertex::builder(name, kernel), |b, port| b.input::<i32>(*port));
  outputs
    .iter()
    .fold(builder, |b, port| b.output::<i32>(*port))
    .build()
}

/// A clonable vertex carrying `i32` on every port.
pub(crate) fn stage(name: &str, inputs: &[&str], outputs: &[&str]) -> VertexRef {
  build(name, Stage, inputs, outputs)
}

/// A vertex whose kernel cannot be cloned.
pub(crate) fn pinned(name: &str, inputs: &[&str], outputs: &[&str]) -> VertexRef {
  build(name, Pinned, inputs, outputs)
}

/// Connects an in-order edge, panicking on failure.
pub(crate) fn wire(from: &VertexRef, from_port: &str, to: &VertexRef, to_port: &str) {
  wire_with(from, from_port, to, to_port, DeliveryOrder::InOrder);
}

/// Connects an edge with the given order, panicking on failure.
pub(crate) fn wire_with(
  from: &VertexRef,
  from_port: &str,
  to: &VertexRef,
  to_port: &str,
  order: DeliveryOrder,
) {
  connect(from, from_port, to, to_port, order, &LockPolicy::default()).expect("connect");
}

/// Builds `names[0] -> names[1] -> ...` through ports `out` and `in`.
pub(crate) fn chain(names: &[&str]) -> Vec<VertexRef> {
  let vertices: Vec<VertexRef> = names
    .iter()
    .map(|name| stage(name, &["in"], &["out"]))
    .collect();
  for pair in vertices.windows(2) {
    wire(&pair[0], "out", &pair[1], "in");
  }
  vertices
}

/// Asserts that no port table of `vertices` is left locked.
pub(crate) fn assert_all_unlocked(vertices: &[VertexRef]) {
  for vertex in vertices {
    assert!(
      vertex.output().try_lock().is_some(),
      "output table of {} still locked",
      vertex.display_name()
    );
    assert!(
      vertex.input().try_lock().is_some(),
      "input table of {} still locked",
      vertex.display_name()
    );
  }
}
