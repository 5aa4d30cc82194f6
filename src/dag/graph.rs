// src/dag/graph.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::config::model::GraphConfig;
use crate::data::DataKey;
use crate::engine::{ContextPool, GraphContext};
use crate::errors::{FlowdagError, Result};
use crate::processor::{FieldSchema, ProcessorRegistry};
use crate::types::OutcomeMask;

use super::vertex::{Dependency, Vertex, VertexId};

/// Cluster-level settings a graph is built against.
pub struct BuildEnv<'a> {
    pub registry: &'a ProcessorRegistry,
    pub cluster: &'a str,
    pub default_expr_processor: &'a str,
    pub strict: bool,
    pub pool_size: usize,
}

/// A built, acyclic graph of vertices.
///
/// Vertices live in an arena and refer to each other by [`VertexId`].
/// The graph also owns a pool of execution contexts reused across runs.
pub struct Graph {
    name: String,
    cluster: String,
    vertices: Vec<Vertex>,
    by_id: HashMap<String, VertexId>,
    producers: HashMap<String, VertexId>,
    roots: Vec<VertexId>,
    slots: Vec<DataKey>,
    pool: ContextPool,
}

impl Graph {
    /// Build a graph from its definition.
    ///
    /// Fails on an empty graph, duplicate ids or outputs, dangling
    /// references, missing producers, conflicting edge masks, isolated
    /// vertices and cycles.
    pub fn build(cfg: &GraphConfig, env: &BuildEnv<'_>) -> Result<Self> {
        if cfg.vertex.is_empty() {
            return Err(FlowdagError::ConfigError(format!(
                "graph '{}' has no vertices",
                cfg.name
            )));
        }
        let mut builder = GraphBuilder::new(cfg, env)?;
        builder.index_producers()?;
        builder.resolve_processors()?;
        builder.create_condition_gates()?;
        builder.link_data_edges()?;
        builder.link_explicit_edges(cfg)?;
        builder.check_isolated()?;
        builder.check_acyclic()?;

        let mut graph = builder.finish();
        for _ in 0..env.pool_size {
            let ctx = GraphContext::new(&graph, env.registry)?;
            graph.pool.release(Arc::new(ctx));
        }

        debug!(
            cluster = %graph.cluster,
            graph = %graph.name,
            vertices = graph.vertices.len(),
            roots = graph.roots.len(),
            pool = env.pool_size,
            "built graph"
        );
        Ok(graph)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the cluster the graph was built in.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, handle: VertexId) -> Option<&Vertex> {
        self.vertices.get(handle)
    }

    pub fn find(&self, id: &str) -> Option<&Vertex> {
        self.by_id.get(id).map(|&h| &self.vertices[h])
    }

    /// Vertices without dependencies, in handle order.
    pub fn roots(&self) -> &[VertexId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex producing `data_id`.
    pub fn producer_of(&self, data_id: &str) -> Option<&Vertex> {
        self.producers.get(data_id).map(|&h| &self.vertices[h])
    }

    /// Ids of the direct predecessors of `id`.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.find(id)
            .map(|v| {
                v.dependencies()
                    .iter()
                    .map(|d| self.vertices[d.vertex].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of the direct successors of `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.find(id)
            .map(|v| {
                v.successors()
                    .iter()
                    .map(|&s| self.vertices[s].id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Typed data slots created in the data context before every run.
    pub fn slots(&self) -> &[DataKey] {
        &self.slots
    }

    /// Take an idle context from the pool, or create one when it is empty.
    pub fn acquire_context(&self, registry: &ProcessorRegistry) -> Result<Arc<GraphContext>> {
        match self.pool.acquire() {
            Some(ctx) => Ok(ctx),
            None => {
                debug!(graph = %self.name, "context pool empty; creating context");
                Ok(Arc::new(GraphContext::new(self, registry)?))
            }
        }
    }

    pub fn release_context(&self, ctx: Arc<GraphContext>) {
        self.pool.release(ctx);
    }

    /// Number of idle pooled contexts.
    pub fn idle_contexts(&self) -> usize {
        self.pool.len()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("cluster", &self.cluster)
            .field("vertices", &self.vertices)
            .finish_non_exhaustive()
    }
}

struct GraphBuilder<'a> {
    name: String,
    env: &'a BuildEnv<'a>,
    vertices: Vec<Vertex>,
    by_id: HashMap<String, VertexId>,
    producers: HashMap<String, VertexId>,
}

impl<'a> GraphBuilder<'a> {
    /// Create vertices; explicit ids are registered before any id is
    /// generated so generated ids never take an explicit one.
    fn new(cfg: &GraphConfig, env: &'a BuildEnv<'a>) -> Result<Self> {
        let mut by_id: HashMap<String, VertexId> = HashMap::new();
        for (handle, vc) in cfg.vertex.iter().enumerate() {
            if vc.id.is_empty() {
                continue;
            }
            if by_id.insert(vc.id.clone(), handle).is_some() {
                return Err(FlowdagError::DuplicateVertex {
                    graph: cfg.name.clone(),
                    vertex: vc.id.clone(),
                });
            }
        }

        let mut vertices = Vec::with_capacity(cfg.vertex.len());
        for (handle, vc) in cfg.vertex.iter().enumerate() {
            let id = if vc.id.is_empty() {
                let base = if vc.processor.is_empty() {
                    format!("{}_{}", cfg.name, handle)
                } else {
                    vc.processor.clone()
                };
                let id = unique_id(&by_id, base);
                by_id.insert(id.clone(), handle);
                id
            } else {
                vc.id.clone()
            };
            vertices.push(Vertex::from_config(
                handle,
                id,
                vc,
                env.default_expr_processor,
            ));
        }

        Ok(Self {
            name: cfg.name.clone(),
            env,
            vertices,
            by_id,
            producers: HashMap::new(),
        })
    }

    fn index_producers(&mut self) -> Result<()> {
        for vertex in &self.vertices {
            for binding in &vertex.outputs {
                if let Some(&first) = self.producers.get(&binding.id) {
                    return Err(FlowdagError::DuplicateOutput {
                        graph: self.name.clone(),
                        data: binding.id.clone(),
                        first: self.vertices[first].id.clone(),
                        second: vertex.id.clone(),
                    });
                }
                self.producers.insert(binding.id.clone(), vertex.handle);
            }
        }
        Ok(())
    }

    /// Attach field schemas and check bindings against them.
    fn resolve_processors(&mut self) -> Result<()> {
        for vertex in &mut self.vertices {
            let Some(processor) = vertex.kind.processor() else {
                continue;
            };
            let Some(schema) = lookup_schema(self.env, &self.name, &vertex.id, processor)? else {
                continue;
            };

            // Condition evaluators read the data context by name.
            let check_inputs = !vertex.is_condition();
            let inputs = vertex
                .inputs
                .iter()
                .filter(|_| check_inputs)
                .map(|b| (b, schema.input_field(&b.field)));
            let outputs = vertex.outputs.iter().map(|b| (b, schema.output_field(&b.field)));
            for (binding, decl) in inputs.chain(outputs) {
                if decl.is_none() {
                    return Err(FlowdagError::UnknownField {
                        vertex: vertex.id.clone(),
                        processor: processor.to_string(),
                        field: binding.field.clone(),
                    });
                }
            }
            vertex.schema = Some(schema);
        }
        Ok(())
    }

    /// One gate per distinct condition text. Gates have no producer edges:
    /// a consumer waits on its producers and on the gate separately.
    fn create_condition_gates(&mut self) -> Result<()> {
        let mut pending = Vec::new();
        for vertex in &self.vertices {
            for (idx, binding) in vertex.inputs.iter().enumerate() {
                if !binding.cond.is_empty() {
                    pending.push((vertex.handle, idx, binding.cond.clone()));
                }
            }
        }

        let mut gates: HashMap<String, VertexId> = HashMap::new();
        for (handle, idx, cond) in pending {
            let gate = match gates.get(&cond) {
                Some(&gate) => gate,
                None => {
                    let gate = self.vertices.len();
                    let id = unique_id(&self.by_id, format!("{}_cond_{}", self.name, gates.len()));
                    let mut vertex = Vertex::condition_gate(
                        gate,
                        id.clone(),
                        &cond,
                        self.env.default_expr_processor,
                    );
                    vertex.schema = lookup_schema(
                        self.env,
                        &self.name,
                        &id,
                        self.env.default_expr_processor,
                    )?;
                    debug!(graph = %self.name, vertex = %id, cond = %cond, "created condition vertex");
                    self.by_id.insert(id, gate);
                    self.vertices.push(vertex);
                    gates.insert(cond, gate);
                    gate
                }
            };
            self.vertices[handle].inputs[idx].gate = Some(gate);
        }
        Ok(())
    }

    fn link_data_edges(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        for vertex in &self.vertices {
            for binding in &vertex.inputs {
                let mask = binding.mask();
                for data_id in binding.data_ids() {
                    match self.producers.get(data_id) {
                        Some(&producer) => edges.push((producer, vertex.handle, mask)),
                        None if binding.is_extern => {}
                        None => {
                            return Err(FlowdagError::MissingProducer {
                                graph: self.name.clone(),
                                vertex: vertex.id.clone(),
                                data: data_id.to_string(),
                            });
                        }
                    }
                }
                if let Some(gate) = binding.gate {
                    edges.push((gate, vertex.handle, OutcomeMask::OK));
                }
            }
        }

        for (from, to, mask) in edges {
            self.add_edge(from, to, mask)?;
        }
        Ok(())
    }

    fn link_explicit_edges(&mut self, cfg: &GraphConfig) -> Result<()> {
        for (handle, vc) in cfg.vertex.iter().enumerate() {
            let groups = [
                (&vc.deps, OutcomeMask::ALL, false),
                (&vc.deps_on_ok, OutcomeMask::OK, false),
                (&vc.deps_on_err, OutcomeMask::ERR, false),
                (&vc.successor, OutcomeMask::ALL, true),
                (&vc.successor_on_ok, OutcomeMask::OK, true),
                (&vc.successor_on_err, OutcomeMask::ERR, true),
            ];
            for (names, mask, outgoing) in groups {
                for name in names {
                    let other = self.resolve(handle, name)?;
                    if outgoing {
                        self.add_edge(handle, other, mask)?;
                    } else {
                        self.add_edge(other, handle, mask)?;
                    }
                }
            }
            if !vc.expect.is_empty() {
                let other = self.resolve(handle, &vc.expect)?;
                self.add_edge(other, handle, OutcomeMask::OK)?;
            }
        }
        Ok(())
    }

    fn resolve(&self, from: VertexId, name: &str) -> Result<VertexId> {
        self.by_id
            .get(name)
            .copied()
            .ok_or_else(|| FlowdagError::UnknownVertex {
                graph: self.name.clone(),
                vertex: self.vertices[from].id.clone(),
                reference: name.to_string(),
            })
    }

    /// Record `to` depending on `from`; a repeated edge keeps the
    /// intersection of both masks.
    fn add_edge(&mut self, from: VertexId, to: VertexId, mask: OutcomeMask) -> Result<()> {
        if let Some(idx) = self.vertices[to].dependency_index(from) {
            let merged = self.vertices[to].deps[idx].mask.intersect(mask);
            if merged.is_empty() {
                return Err(FlowdagError::ConflictingDependency {
                    graph: self.name.clone(),
                    vertex: self.vertices[to].id.clone(),
                    dependency: self.vertices[from].id.clone(),
                });
            }
            self.vertices[to].deps[idx].mask = merged;
            return Ok(());
        }

        let target = &mut self.vertices[to];
        target.dep_index.insert(from, target.deps.len());
        target.deps.push(Dependency { vertex: from, mask });
        self.vertices[from].successors.push(to);
        Ok(())
    }

    fn check_isolated(&self) -> Result<()> {
        if self.vertices.len() <= 1 {
            return Ok(());
        }
        for vertex in &self.vertices {
            if !vertex.generated && vertex.deps.is_empty() && vertex.successors.is_empty() {
                return Err(FlowdagError::IsolatedVertex {
                    graph: self.name.clone(),
                    vertex: vertex.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<VertexId, ()> = DiGraphMap::new();
        for vertex in &self.vertices {
            graph.add_node(vertex.handle);
        }
        for vertex in &self.vertices {
            for dep in &vertex.deps {
                graph.add_edge(dep.vertex, vertex.handle, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(FlowdagError::DagCycle(format!(
                "cycle detected in graph '{}' involving vertex '{}'",
                self.name,
                self.vertices[cycle.node_id()].id
            ))),
        }
    }

    fn finish(self) -> Graph {
        let roots = self
            .vertices
            .iter()
            .filter(|v| v.deps.is_empty())
            .map(|v| v.handle)
            .collect();

        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for vertex in &self.vertices {
            let Some(schema) = vertex.schema() else {
                continue;
            };
            for binding in &vertex.inputs {
                if let Some(decl) = schema.input_field(&binding.field) {
                    for data_id in binding.data_ids() {
                        let key = DataKey::new(data_id, decl.tag);
                        if seen.insert(key.clone()) {
                            slots.push(key);
                        }
                    }
                }
            }
            for binding in &vertex.outputs {
                if let Some(decl) = schema.output_field(&binding.field) {
                    let key = DataKey::new(binding.id.clone(), decl.tag);
                    if seen.insert(key.clone()) {
                        slots.push(key);
                    }
                }
            }
        }

        Graph {
            name: self.name,
            cluster: self.env.cluster.to_string(),
            vertices: self.vertices,
            by_id: self.by_id,
            producers: self.producers,
            roots,
            slots,
            pool: ContextPool::new(),
        }
    }
}

fn unique_id(taken: &HashMap<String, VertexId>, base: String) -> String {
    if !taken.contains_key(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Schema of `processor`, or `None` when it is not registered and the
/// cluster is not strict.
fn lookup_schema(
    env: &BuildEnv<'_>,
    graph: &str,
    vertex: &str,
    processor: &str,
) -> Result<Option<Arc<FieldSchema>>> {
    match env.registry.schema(processor) {
        Some(schema) => Ok(Some(schema)),
        None if env.strict => Err(FlowdagError::ProcessorNotFound(format!(
            "{processor} (vertex '{vertex}' in graph '{graph}')"
        ))),
        None => {
            warn!(
                graph,
                vertex,
                processor,
                "processor not registered; vertex will be skipped"
            );
            Ok(None)
        }
    }
}
