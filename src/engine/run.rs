// src/engine/run.rs

//! Scheduling of one graph run.
//!
//! Every vertex finishes through [`GraphRun::finish_vertex`] or
//! [`GraphRun::settle`]; both end in `on_vertex_done`, which reports the
//! outcome to successors and collects the ones that became ready.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::dag::{Graph, GraphCluster, Vertex, VertexId, VertexKind};
use crate::data::{DataContext, DataKey};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::params::Params;
use crate::processor::{Completion, ExecContext, Execution, StagedOutput};
use crate::types::{Outcome, VertexCode};

use super::cluster_context::ClusterContext;
use super::graph_context::GraphContext;
use super::manager::ManagerInner;
use super::vertex_context::VertexContext;
use super::{DoneCallback, RunReport};

/// Nesting limit for sub-graph vertices.
pub const MAX_SUBGRAPH_DEPTH: usize = 64;

/// Shared by a top-level run and all of its sub-graph runs.
pub(crate) struct RunEnv {
    pub manager: Arc<ManagerInner>,
    pub executor: Arc<dyn ExecutorBackend>,
    pub base_params: Params,
}

pub(crate) struct GraphRun {
    env: Arc<RunEnv>,
    cluster: ClusterContext,
    graph: Arc<Graph>,
    ctx: Arc<GraphContext>,
    depth: usize,
}

impl GraphRun {
    /// Acquire a context for `graph` and dispatch its roots.
    ///
    /// Only context creation can fail; `done` is not called in that case.
    pub(crate) fn start(
        env: Arc<RunEnv>,
        cluster: Arc<GraphCluster>,
        graph: Arc<Graph>,
        parent: Arc<DataContext>,
        depth: usize,
        done: DoneCallback,
    ) -> Result<()> {
        let ctx = graph.acquire_context(&env.manager.registry)?;
        let data = ctx.data();
        data.set_parent(Some(parent));
        for key in graph.slots() {
            data.prepare(key.clone());
        }

        let cluster = ClusterContext::evaluate(cluster, data, &env.manager.registry, &env.base_params);
        ctx.set_done(done);

        info!(
            cluster = %graph.cluster(),
            graph = %graph.name(),
            vertices = graph.len(),
            depth,
            "starting graph run"
        );

        let roots = graph.roots().to_vec();
        let run = Arc::new(GraphRun {
            env,
            cluster,
            graph,
            ctx,
            depth,
        });
        if roots.is_empty() {
            run.complete();
        } else {
            run.dispatch(roots);
        }
        Ok(())
    }

    /// Submit one executor job per vertex.
    fn dispatch(self: &Arc<Self>, ready: Vec<VertexId>) {
        for handle in ready {
            let run = Arc::clone(self);
            self.env.executor.spawn(Box::new(move || run.run_vertex(handle)));
        }
    }

    /// Run `handle`, then keep running the single successor it readied,
    /// if any, on this thread.
    fn run_vertex(self: &Arc<Self>, handle: VertexId) {
        let mut next = Some(handle);
        while let Some(handle) = next {
            next = self.execute_vertex(handle);
        }
    }

    fn vertex_parts(&self, handle: VertexId) -> Option<(&Vertex, &VertexContext)> {
        Some((self.graph.vertex(handle)?, self.ctx.vertex(handle)?))
    }

    fn execute_vertex(self: &Arc<Self>, handle: VertexId) -> Option<VertexId> {
        let Some((vertex, vctx)) = self.vertex_parts(handle) else {
            error!(graph = %self.graph.name(), handle, "vertex handle out of range");
            return None;
        };

        for (idx, dep) in vertex.dependencies().iter().enumerate() {
            let outcome = vctx.dependency_result(idx);
            if !dep.mask.matches(outcome) {
                debug!(
                    graph = %self.graph.name(),
                    vertex = %vertex.id(),
                    dependency = self.graph.vertex(dep.vertex).map(Vertex::id).unwrap_or_default(),
                    ?outcome,
                    mask = dep.mask.label(),
                    "dependency outcome not accepted; skipping"
                );
                return self.settle(handle, Outcome::Err, VertexCode::Skip);
            }
        }

        if !vertex.expect_config().is_empty() && !self.expect_config_holds(vertex.expect_config()) {
            debug!(
                graph = %self.graph.name(),
                vertex = %vertex.id(),
                expect_config = %vertex.expect_config(),
                "config expectation not met; skipping"
            );
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        }

        match vertex.kind() {
            VertexKind::Control => self.settle(handle, Outcome::Ok, VertexCode::Skip),
            VertexKind::Processor(name) => self.run_processor(handle, vertex, vctx, name),
            VertexKind::SubGraph { cluster, graph } => self.run_subgraph(handle, vertex, cluster, graph),
        }
    }

    fn expect_config_holds(&self, expect: &str) -> bool {
        let (negate, name) = match expect.strip_prefix('!') {
            Some(name) => (true, name),
            None => (false, expect),
        };
        let value = self
            .cluster
            .flag(name)
            .or_else(|| self.ctx.data().flag(name))
            .unwrap_or(false);
        value != negate
    }

    fn run_processor(
        self: &Arc<Self>,
        handle: VertexId,
        vertex: &Vertex,
        vctx: &VertexContext,
        name: &str,
    ) -> Option<VertexId> {
        let (active, params) = vertex.select_params(self.ctx.data());
        vctx.set_active_args(active);

        let Some(mut processor) = vctx.take_processor() else {
            warn!(graph = %self.graph.name(), vertex = %vertex.id(), processor = %name, "processor not registered; skipping");
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        };

        let mut exec = ExecContext::new(vertex.id(), params, Some(&self.env.base_params), self.ctx.data());
        if let Err(data) = self.inject_inputs(vertex, &mut exec) {
            vctx.restore_processor(processor);
            debug!(graph = %self.graph.name(), vertex = %vertex.id(), data = %data, "required input missing; skipping");
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        }

        debug!(graph = %self.graph.name(), vertex = %vertex.id(), processor = %name, active_args = active, "executing vertex");
        let result = catch_unwind(AssertUnwindSafe(|| processor.execute(&mut exec)));
        vctx.restore_processor(processor);
        let outputs = exec.into_outputs();

        match result {
            Ok(Execution::Done(code)) => self.finish_vertex(handle, code, outputs),
            Ok(Execution::Pending(register)) => {
                let run = Arc::clone(self);
                let completion = Completion::new(vertex.id(), outputs, move |code, outputs| {
                    if let Some(next) = run.finish_vertex(handle, code, outputs) {
                        run.run_vertex(next);
                    }
                });
                if catch_unwind(AssertUnwindSafe(move || register(completion))).is_err() {
                    error!(graph = %self.graph.name(), vertex = %vertex.id(), "async registration panicked");
                }
                None
            }
            Err(_) => {
                error!(graph = %self.graph.name(), vertex = %vertex.id(), processor = %name, "processor panicked");
                self.finish_vertex(handle, -1, Vec::new())
            }
        }
    }

    /// Resolve every input binding through the data context chain.
    ///
    /// Returns the first missing data id of a required binding.
    fn inject_inputs(&self, vertex: &Vertex, exec: &mut ExecContext<'_>) -> std::result::Result<(), String> {
        let Some(schema) = vertex.schema() else {
            return Ok(());
        };
        let data = self.ctx.data();

        for binding in vertex.inputs() {
            let Some(decl) = schema.input_field(&binding.field) else {
                continue;
            };
            for data_id in binding.data_ids() {
                match data.get_value(&DataKey::new(data_id, decl.tag)) {
                    Some(value) => exec.add_input(binding.field.clone(), value),
                    None if binding.required => return Err(data_id.to_string()),
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn run_subgraph(
        self: &Arc<Self>,
        handle: VertexId,
        vertex: &Vertex,
        cluster_name: &str,
        graph_name: &str,
    ) -> Option<VertexId> {
        if self.depth >= MAX_SUBGRAPH_DEPTH {
            warn!(graph = %self.graph.name(), vertex = %vertex.id(), depth = self.depth, "sub-graph nesting too deep; skipping");
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        }

        let cluster = if cluster_name.is_empty() {
            Some(Arc::clone(self.cluster.cluster()))
        } else {
            self.env.manager.cluster(cluster_name)
        };
        let Some(cluster) = cluster else {
            warn!(graph = %self.graph.name(), vertex = %vertex.id(), cluster = %cluster_name, "sub-graph cluster not found; skipping");
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        };
        let Some(child) = cluster.graph(graph_name) else {
            warn!(
                graph = %self.graph.name(),
                vertex = %vertex.id(),
                cluster = %cluster.name(),
                subgraph = %graph_name,
                "sub-graph not found; skipping"
            );
            return self.settle(handle, Outcome::Err, VertexCode::Skip);
        };

        let run = Arc::clone(self);
        let done: DoneCallback = Box::new(move |report: &RunReport<'_>| {
            let outputs = run.export_outputs(handle, report.data());
            if let Some(next) = run.finish_vertex(handle, report.code(), outputs) {
                run.dispatch(vec![next]);
            }
        });

        debug!(graph = %self.graph.name(), vertex = %vertex.id(), subgraph = %child.name(), "entering sub-graph");
        match GraphRun::start(
            Arc::clone(&self.env),
            cluster,
            child,
            Arc::clone(self.ctx.data()),
            self.depth + 1,
            done,
        ) {
            Ok(()) => None,
            Err(err) => {
                warn!(graph = %self.graph.name(), vertex = %vertex.id(), error = %err, "failed to start sub-graph; skipping");
                self.settle(handle, Outcome::Err, VertexCode::Skip)
            }
        }
    }

    /// Values of the child run to publish through the vertex's output
    /// bindings: every type stored under each bound `field`.
    fn export_outputs(&self, handle: VertexId, child: &DataContext) -> Vec<StagedOutput> {
        let Some(vertex) = self.graph.vertex(handle) else {
            return Vec::new();
        };
        let mut outputs = Vec::new();
        for binding in vertex.outputs() {
            for (tag, value) in child.entries_named(&binding.field) {
                outputs.push(StagedOutput {
                    field: binding.field.clone(),
                    tag,
                    value,
                });
            }
        }
        outputs
    }

    /// Record the result of a vertex that ran, publish its outputs and
    /// notify successors. Returns a successor to run inline.
    pub(crate) fn finish_vertex(
        self: &Arc<Self>,
        handle: VertexId,
        code: i32,
        outputs: Vec<StagedOutput>,
    ) -> Option<VertexId> {
        let (vertex, vctx) = self.vertex_parts(handle)?;

        self.publish_outputs(vertex, outputs);

        let (outcome, vcode) = if code == 0 {
            (Outcome::Ok, VertexCode::Ok)
        } else {
            (Outcome::Err, VertexCode::Err)
        };
        vctx.set_result(outcome, vcode, code);
        self.ctx.note_code(code);

        debug!(graph = %self.graph.name(), vertex = %vertex.id(), code, "vertex finished");
        self.on_vertex_done(handle)
    }

    /// Record a terminal state for a vertex that did not run.
    fn settle(self: &Arc<Self>, handle: VertexId, outcome: Outcome, code: VertexCode) -> Option<VertexId> {
        let vctx = self.ctx.vertex(handle)?;
        vctx.set_result(outcome, code, 0);
        self.on_vertex_done(handle)
    }

    fn publish_outputs(&self, vertex: &Vertex, outputs: Vec<StagedOutput>) {
        if outputs.is_empty() {
            return;
        }
        let data = self.ctx.data();
        for binding in vertex.outputs() {
            let declared = vertex
                .schema()
                .and_then(|s| s.output_field(&binding.field))
                .map(|decl| decl.tag);

            for staged in outputs.iter().filter(|o| o.field == binding.field) {
                if declared.is_some_and(|tag| tag != staged.tag) {
                    warn!(
                        graph = %self.graph.name(),
                        vertex = %vertex.id(),
                        field = %binding.field,
                        got = staged.tag.type_name(),
                        "output type does not match declared field; dropped"
                    );
                    continue;
                }
                data.set_value(DataKey::new(binding.id.clone(), staged.tag), staged.value.clone());
            }
        }
    }

    fn on_vertex_done(self: &Arc<Self>, handle: VertexId) -> Option<VertexId> {
        if self.ctx.finish_one() {
            self.complete();
            return None;
        }

        let vertex = self.graph.vertex(handle)?;
        let outcome = self.ctx.vertex(handle)?.outcome();

        let mut ready = Vec::new();
        for &succ in vertex.successors() {
            let Some(idx) = self.graph.vertex(succ).and_then(|s| s.dependency_index(handle)) else {
                continue;
            };
            let Some(sctx) = self.ctx.vertex(succ) else {
                continue;
            };
            if sctx.set_dependency_result(idx, outcome) {
                ready.push(succ);
            }
        }

        if ready.len() == 1 {
            return ready.pop();
        }
        self.dispatch(ready);
        None
    }

    fn complete(&self) {
        let code = self.ctx.code();
        info!(cluster = %self.graph.cluster(), graph = %self.graph.name(), code, "graph run complete");

        if let Some(done) = self.ctx.take_done() {
            let report = RunReport::new(&self.graph, &self.ctx);
            if catch_unwind(AssertUnwindSafe(|| done(&report))).is_err() {
                error!(graph = %self.graph.name(), "done callback panicked");
            }
        }

        self.ctx.reset();
        self.graph.release_context(Arc::clone(&self.ctx));
    }
}
