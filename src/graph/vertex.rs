//! # Vertices
//!
//! A [`Vertex`] is one processing stage of the dataflow graph. Its behavior
//! lives in a [`Kernel`]; the vertex adds identity, declared ports and the two
//! port tables the scheduler and the graph tools share.
//!
//! ## Identity
//!
//! Every vertex gets a [`VertexId`] from a process-wide counter when it is
//! built. Identity is never derived from content or from memory addresses:
//! two vertices with the same name and kernel are still distinct, and a clone
//! always receives a fresh id.
//!
//! ## Example
//!
//! ```rust
//! use streamweave_graphtools::{Kernel, Vertex};
//!
//! struct Doubler;
//!
//! impl Kernel for Doubler {
//!   fn kind(&self) -> &str {
//!     "Doubler"
//!   }
//!
//!   fn duplicate(&self) -> Option<Box<dyn Kernel>> {
//!     Some(Box::new(Doubler))
//!   }
//! }
//!
//! let vertex = Vertex::builder("double", Doubler)
//!   .input::<i64>("in")
//!   .output::<i64>("out")
//!   .build();
//! assert_eq!(vertex.display_name(), "Doubler(double)");
//! ```

use crate::graph::port::{PortDirection, PortInfo, PortMap, PortTable};
use crate::graph::signal::{Signal, SignalQueue, SystemSignalChannel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static NEXT_VERTEX_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a vertex.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VertexId(u64);

impl VertexId {
  fn next() -> Self {
    Self(NEXT_VERTEX_ID.fetch_add(1, Ordering::Relaxed))
  }

  /// Returns the raw value.
  #[inline]
  pub const fn as_u64(self) -> u64 {
    self.0
  }
}

impl fmt::Display for VertexId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "v{}", self.0)
  }
}

/// The logic behind a vertex.
///
/// The graph tools only need to know what a kernel is called and whether it
/// can be duplicated; running it is the scheduler's business.
pub trait Kernel: Send + Sync {
  /// Logical type name, used in display names and error messages.
  fn kind(&self) -> &str;

  /// Produces an independent kernel of the same logical type.
  ///
  /// Returns `None` when this kernel must not be duplicated, which makes any
  /// replication that reaches it fail with `CloneNotSupported`.
  fn duplicate(&self) -> Option<Box<dyn Kernel>> {
    None
  }
}

/// Shared handle to a vertex. Port tables hold weak references to peers, so
/// the graph owner keeps vertices alive through these handles.
pub type VertexRef = Arc<Vertex>;

/// A declared port: name plus the data type flowing through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
  /// Port name, unique within its table.
  pub name: String,
  /// Data type carried by the port.
  pub type_name: &'static str,
}

/// A processing stage in the dataflow graph.
pub struct Vertex {
  id: VertexId,
  name: String,
  kernel: Box<dyn Kernel>,
  input_specs: Vec<PortSpec>,
  output_specs: Vec<PortSpec>,
  input: PortTable,
  output: PortTable,
  signals: SignalQueue,
}

impl Vertex {
  /// Starts building a vertex with the given instance name and kernel.
  pub fn builder(name: impl Into<String>, kernel: impl Kernel + 'static) -> VertexBuilder {
    VertexBuilder {
      name: name.into(),
      kernel: Box::new(kernel),
      inputs: Vec::new(),
      outputs: Vec::new(),
    }
  }

  fn from_parts(
    name: String,
    kernel: Box<dyn Kernel>,
    input_specs: Vec<PortSpec>,
    output_specs: Vec<PortSpec>,
  ) -> VertexRef {
    let id = VertexId::next();
    let display = format!("{}({})", kernel.kind(), name);
    let input = PortTable::new(PortDirection::Input, display.clone(), fresh_ports(&input_specs));
    let output = PortTable::new(PortDirection::Output, display, fresh_ports(&output_specs));
    Arc::new(Self {
      id,
      name,
      kernel,
      input_specs,
      output_specs,
      input,
      output,
      signals: SignalQueue::new(),
    })
  }

  /// Returns this vertex's identity.
  #[inline]
  pub fn id(&self) -> VertexId {
    self.id
  }

  /// Returns the instance name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the kernel's logical type name.
  pub fn kind(&self) -> &str {
    self.kernel.kind()
  }

  /// Returns `Kind(name)`, the form used in logs and errors.
  pub fn display_name(&self) -> String {
    format!("{}({})", self.kernel.kind(), self.name)
  }

  /// Returns the kernel.
  pub fn kernel(&self) -> &dyn Kernel {
    self.kernel.as_ref()
  }

  /// Returns the input port table.
  pub fn input(&self) -> &PortTable {
    &self.input
  }

  /// Returns the output port table.
  pub fn output(&self) -> &PortTable {
    &self.output
  }

  /// Returns the port table for the given direction.
  pub fn ports(&self, direction: PortDirection) -> &PortTable {
    match direction {
      PortDirection::Input => &self.input,
      PortDirection::Output => &self.output,
    }
  }

  /// Returns the declared ports for the given direction.
  pub fn port_specs(&self, direction: PortDirection) -> &[PortSpec] {
    match direction {
      PortDirection::Input => &self.input_specs,
      PortDirection::Output => &self.output_specs,
    }
  }

  /// Creates a new vertex of the same logical type with unconnected ports and
  /// an empty signal queue.
  ///
  /// Works from the immutable port declarations, so it takes no port-table
  /// lock and may be called while the caller holds one. Returns `None` when
  /// the kernel refuses duplication.
  pub fn clone_vertex(&self) -> Option<VertexRef> {
    let kernel = self.kernel.duplicate()?;
    let clone = Self::from_parts(
      self.name.clone(),
      kernel,
      self.input_specs.clone(),
      self.output_specs.clone(),
    );
    trace!("Vertex::clone_vertex(id={}) -> {}", self.id, clone.id);
    Some(clone)
  }
}

impl SystemSignalChannel for Vertex {
  fn send_system_signal(&self, signal: Signal) {
    self.signals.send_system_signal(signal);
  }

  fn get_system_signal(&self) -> Signal {
    self.signals.get_system_signal()
  }
}

impl PartialEq for Vertex {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Vertex {}

impl Hash for Vertex {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for Vertex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Vertex")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("kind", &self.kernel.kind())
      .finish()
  }
}

fn fresh_ports(specs: &[PortSpec]) -> PortMap {
  specs
    .iter()
    .map(|spec| (spec.name.clone(), PortInfo::new(spec.name.clone(), spec.type_name)))
    .collect()
}

/// Declares the ports of a new [`Vertex`].
pub struct VertexBuilder {
  name: String,
  kernel: Box<dyn Kernel>,
  inputs: Vec<PortSpec>,
  outputs: Vec<PortSpec>,
}

impl VertexBuilder {
  /// Declares an input port carrying `T`. Redeclaring a name replaces it.
  pub fn input<T: ?Sized + 'static>(mut self, name: impl Into<String>) -> Self {
    declare(&mut self.inputs, name.into(), std::any::type_name::<T>());
    self
  }

  /// Declares an output port carrying `T`. Redeclaring a name replaces it.
  pub fn output<T: ?Sized + 'static>(mut self, name: impl Into<String>) -> Self {
    declare(&mut self.outputs, name.into(), std::any::type_name::<T>());
    self
  }

  /// Builds the vertex with a fresh identity.
  pub fn build(self) -> VertexRef {
    let vertex = Vertex::from_parts(self.name, self.kernel, self.inputs, self.outputs);
    trace!(
      "VertexBuilder::build(name={}, inputs={}, outputs={}) -> {}",
      vertex.name,
      vertex.input_specs.len(),
      vertex.output_specs.len(),
      vertex.id
    );
    vertex
  }
}

fn declare(specs: &mut Vec<PortSpec>, name: String, type_name: &'static str) {
  match specs.iter_mut().find(|spec| spec.name == name) {
    Some(existing) => existing.type_name = type_name,
    None => specs.push(PortSpec { name, type_name }),
  }
}
