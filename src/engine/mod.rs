// src/engine/mod.rs

//! Execution engine.
//!
//! A run acquires a pooled [`GraphContext`] from its graph, evaluates the
//! cluster's config settings, then drives vertices to completion through
//! the caller's executor:
//! - readiness is tracked with per-vertex atomic counters
//! - a finished vertex reports its outcome to each successor once
//! - the graph's join counter reaching zero fires the `done` callback
//!
//! [`run`] holds the scheduling logic; [`manager`] is the public entry
//! point.

pub mod cluster_context;
pub mod graph_context;
pub mod manager;
pub mod pool;
pub mod run;
pub mod vertex_context;

use std::sync::Arc;

use crate::dag::Graph;
use crate::data::DataContext;
use crate::types::{Outcome, VertexCode};

pub use cluster_context::ClusterContext;
pub use graph_context::GraphContext;
pub use manager::{ExecuteOptions, GraphManager};
pub use pool::ContextPool;
pub use vertex_context::VertexContext;

/// Called exactly once when a graph run finishes.
pub type DoneCallback = Box<dyn FnOnce(&RunReport<'_>) + Send>;

/// View of a finished run, valid while the `done` callback runs. The
/// context is reset and returned to its pool afterwards.
pub struct RunReport<'a> {
    graph: &'a Graph,
    ctx: &'a GraphContext,
}

impl<'a> RunReport<'a> {
    pub(crate) fn new(graph: &'a Graph, ctx: &'a GraphContext) -> Self {
        Self { graph, ctx }
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// First non-zero code of a processor or sub-graph, or `0`.
    pub fn code(&self) -> i32 {
        self.ctx.code()
    }

    /// The run's data context. Its parent is the caller's context.
    pub fn data(&self) -> &Arc<DataContext> {
        self.ctx.data()
    }

    pub fn outcome_of(&self, id: &str) -> Option<Outcome> {
        let vertex = self.graph.find(id)?;
        self.ctx.vertex(vertex.handle()).map(|v| v.outcome())
    }

    pub fn code_of(&self, id: &str) -> Option<VertexCode> {
        let vertex = self.graph.find(id)?;
        self.ctx.vertex(vertex.handle()).map(|v| v.code())
    }

    /// Owned copy of the results, including a snapshot of the data the
    /// run produced.
    pub fn summary(&self) -> RunSummary {
        let vertices = self
            .graph
            .vertices()
            .iter()
            .filter_map(|v| {
                let ctx = self.ctx.vertex(v.handle())?;
                Some(VertexReport {
                    id: v.id().to_string(),
                    outcome: ctx.outcome(),
                    code: ctx.code(),
                    exit_code: ctx.exit_code(),
                    active_args: ctx.active_args(),
                })
            })
            .collect();

        RunSummary {
            cluster: self.graph.cluster().to_string(),
            graph: self.graph.name().to_string(),
            code: self.code(),
            vertices,
            data: Arc::new(self.ctx.data().snapshot()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexReport {
    pub id: String,
    pub outcome: Outcome,
    pub code: VertexCode,
    pub exit_code: i32,
    /// `0` for the base parameters, `n` for `select_args[n - 1]`.
    pub active_args: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub cluster: String,
    pub graph: String,
    pub code: i32,
    pub vertices: Vec<VertexReport>,
    pub data: Arc<DataContext>,
}

impl RunSummary {
    pub fn vertex(&self, id: &str) -> Option<&VertexReport> {
        self.vertices.iter().find(|v| v.id == id)
    }

    pub fn outcome_of(&self, id: &str) -> Option<Outcome> {
        self.vertex(id).map(|v| v.outcome)
    }

    pub fn code_of(&self, id: &str) -> Option<VertexCode> {
        self.vertex(id).map(|v| v.code)
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
