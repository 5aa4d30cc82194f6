// src/dag/mod.rs

//! Built graph structures.
//!
//! - [`vertex`]: one node with its bindings and resolved edges.
//! - [`graph`]: the vertex arena, edge construction and context pool.
//! - [`cluster`]: named graphs plus shared config settings.
//! - [`dot`]: Graphviz export.

pub mod cluster;
pub mod dot;
pub mod graph;
pub mod vertex;

pub use cluster::{ConfigSetting, GraphCluster};
pub use graph::{BuildEnv, Graph};
pub use vertex::{DataBinding, Dependency, SelectArgs, Vertex, VertexId, VertexKind};
