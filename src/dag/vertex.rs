// src/dag/vertex.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::model::{DataBindingConfig, VertexConfig};
use crate::data::DataContext;
use crate::params::Params;
use crate::processor::FieldSchema;
use crate::types::OutcomeMask;

/// Index of a vertex inside its owning [`Graph`](super::Graph).
pub type VertexId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexKind {
    /// Runs a registered processor.
    Processor(String),
    /// Runs another graph; an empty `cluster` means the containing one.
    SubGraph { cluster: String, graph: String },
    /// No work of its own; only joins or orders other vertices.
    ///
    /// Finishes with outcome OK once its masks hold, so OK-only successors
    /// still run after the join.
    Control,
}

impl VertexKind {
    pub(crate) fn resolve(cfg: &VertexConfig, default_expr_processor: &str) -> Self {
        if !cfg.processor.is_empty() {
            VertexKind::Processor(cfg.processor.clone())
        } else if !cfg.graph.is_empty() {
            VertexKind::SubGraph {
                cluster: cfg.cluster.clone(),
                graph: cfg.graph.clone(),
            }
        } else if !cfg.cond.is_empty() {
            VertexKind::Processor(default_expr_processor.to_string())
        } else {
            VertexKind::Control
        }
    }

    pub fn processor(&self) -> Option<&str> {
        match self {
            VertexKind::Processor(name) => Some(name),
            _ => None,
        }
    }
}

/// An input or output of a vertex, bound to a processor field.
#[derive(Debug, Clone)]
pub struct DataBinding {
    pub id: String,
    pub field: String,
    pub required: bool,
    pub is_move: bool,
    pub merge: Vec<String>,
    pub is_extern: bool,
    pub cond: String,
    /// Condition vertex standing between the producers and this consumer.
    pub gate: Option<VertexId>,
}

impl DataBinding {
    pub(crate) fn from_config(cfg: &DataBindingConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            field: cfg.field_name().to_string(),
            required: cfg.required,
            is_move: cfg.is_move,
            merge: cfg.merge.clone(),
            is_extern: cfg.is_extern,
            cond: cfg.cond.clone(),
            gate: None,
        }
    }

    /// Data ids read through this binding: the `merge` list, or `id`.
    pub fn data_ids(&self) -> Vec<&str> {
        if self.merge.is_empty() {
            vec![self.id.as_str()]
        } else {
            self.merge.iter().map(String::as_str).collect()
        }
    }

    /// Outcome the producers must reach for the consumer to run.
    pub fn mask(&self) -> OutcomeMask {
        if self.required {
            OutcomeMask::OK
        } else {
            OutcomeMask::ALL
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectArgs {
    /// Config setting that must be true for `params` to be used.
    pub guard: String,
    pub params: Params,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub vertex: VertexId,
    pub mask: OutcomeMask,
}

/// One node of a built graph. Immutable once the graph is built.
pub struct Vertex {
    pub(crate) handle: VertexId,
    pub(crate) id: String,
    pub(crate) kind: VertexKind,
    pub(crate) cond: String,
    pub(crate) expect: String,
    pub(crate) expect_config: String,
    pub(crate) params: Params,
    pub(crate) select_args: Vec<SelectArgs>,
    pub(crate) inputs: Vec<DataBinding>,
    pub(crate) outputs: Vec<DataBinding>,
    pub(crate) schema: Option<Arc<FieldSchema>>,
    pub(crate) deps: Vec<Dependency>,
    pub(crate) dep_index: HashMap<VertexId, usize>,
    pub(crate) successors: Vec<VertexId>,
    pub(crate) generated: bool,
}

impl Vertex {
    pub(crate) fn from_config(
        handle: VertexId,
        id: String,
        cfg: &VertexConfig,
        default_expr_processor: &str,
    ) -> Self {
        let mut params = Params::from(cfg.args.clone());
        if !cfg.cond.is_empty() && params.get("expr").is_none() {
            params.insert("expr", cfg.cond.clone());
        }

        Self {
            handle,
            id,
            kind: VertexKind::resolve(cfg, default_expr_processor),
            cond: cfg.cond.clone(),
            expect: cfg.expect.clone(),
            expect_config: cfg.expect_config.clone(),
            params,
            select_args: cfg
                .select_args
                .iter()
                .map(|s| SelectArgs {
                    guard: s.guard.clone(),
                    params: Params::from(s.args.clone()),
                })
                .collect(),
            inputs: cfg.input.iter().map(DataBinding::from_config).collect(),
            outputs: cfg.output.iter().map(DataBinding::from_config).collect(),
            schema: None,
            deps: Vec::new(),
            dep_index: HashMap::new(),
            successors: Vec::new(),
            generated: false,
        }
    }

    /// Synthetic vertex evaluating `cond` for conditional input bindings.
    pub(crate) fn condition_gate(
        handle: VertexId,
        id: String,
        cond: &str,
        processor: &str,
    ) -> Self {
        let mut params = Params::new();
        params.insert("expr", cond.to_string());
        Self {
            handle,
            id,
            kind: VertexKind::Processor(processor.to_string()),
            cond: cond.to_string(),
            expect: String::new(),
            expect_config: String::new(),
            params,
            select_args: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            schema: None,
            deps: Vec::new(),
            dep_index: HashMap::new(),
            successors: Vec::new(),
            generated: true,
        }
    }

    pub fn handle(&self) -> VertexId {
        self.handle
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    pub fn cond(&self) -> &str {
        &self.cond
    }

    pub fn expect(&self) -> &str {
        &self.expect
    }

    pub fn expect_config(&self) -> &str {
        &self.expect_config
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn select_args(&self) -> &[SelectArgs] {
        &self.select_args
    }

    pub fn inputs(&self) -> &[DataBinding] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DataBinding] {
        &self.outputs
    }

    /// Field schema of the processor, when it is registered.
    pub fn schema(&self) -> Option<&FieldSchema> {
        self.schema.as_deref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    /// Position of `pred` in [`dependencies`](Self::dependencies).
    pub fn dependency_index(&self, pred: VertexId) -> Option<usize> {
        self.dep_index.get(&pred).copied()
    }

    pub fn successors(&self) -> &[VertexId] {
        &self.successors
    }

    /// Created by the graph builder for a conditional input binding.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_condition(&self) -> bool {
        !self.cond.is_empty()
    }

    /// Index into `select_args` plus one of the first alternative whose
    /// guard flag is set in `data`, or `0` for the base parameters. The
    /// chosen set replaces the vertex args rather than extending them.
    pub fn select_params(&self, data: &DataContext) -> (usize, &Params) {
        self.select_args
            .iter()
            .enumerate()
            .find(|(_, s)| data.flag(&s.guard).unwrap_or(false))
            .map(|(idx, s)| (idx + 1, &s.params))
            .unwrap_or((0, &self.params))
    }
}

impl std::fmt::Debug for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vertex")
            .field("handle", &self.handle)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("deps", &self.deps)
            .field("successors", &self.successors)
            .finish_non_exhaustive()
    }
}
