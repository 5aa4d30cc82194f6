// src/processor/mod.rs

//! Units of work run by vertices.
//!
//! A processor is created from a [`ProcessorRegistry`] factory once per
//! pooled context slot, set up once with the vertex's `args`, then executed
//! once per run and `reset` between runs.

pub mod builtin;
pub mod context;
pub mod registry;
pub mod schema;

use std::any::Any;

use tracing::warn;

use crate::params::Params;

pub use context::{ExecContext, StagedOutput};
pub use registry::{ProcessorFactory, ProcessorRegistry};
pub use schema::{FieldDecl, FieldSchema};

pub trait Processor: Send + 'static {
    /// Input and output fields. Queried once, when the processor type is
    /// registered.
    fn schema(&self) -> FieldSchema {
        FieldSchema::default()
    }

    /// Called once per context slot. A non-zero return fails the graph build.
    fn setup(&mut self, _params: &Params) -> i32 {
        0
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Execution;

    /// Called between runs of the same context slot.
    fn reset(&mut self) {}
}

type RegisterFn = Box<dyn FnOnce(Completion) + Send>;
type FinishFn = Box<dyn FnOnce(i32, Vec<StagedOutput>) + Send>;

/// Result of [`Processor::execute`].
pub enum Execution {
    /// Finished synchronously with this code (`0` is success). Outputs are
    /// the ones set on the [`ExecContext`].
    Done(i32),
    /// Finishes later: the engine hands a [`Completion`] to the closure,
    /// which may move it to another thread.
    Pending(RegisterFn),
}

impl Execution {
    pub fn pending(register: impl FnOnce(Completion) + Send + 'static) -> Self {
        Execution::Pending(Box::new(register))
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Done(code) => f.debug_tuple("Done").field(code).finish(),
            Execution::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Single-shot handle finishing an asynchronous execution.
///
/// Dropping it without calling [`complete`](Self::complete) finishes the
/// vertex with code `-1`.
pub struct Completion {
    vertex_id: String,
    outputs: Vec<StagedOutput>,
    finish: Option<FinishFn>,
}

impl Completion {
    pub(crate) fn new(
        vertex_id: impl Into<String>,
        outputs: Vec<StagedOutput>,
        finish: impl FnOnce(i32, Vec<StagedOutput>) + Send + 'static,
    ) -> Self {
        Self {
            vertex_id: vertex_id.into(),
            outputs,
            finish: Some(Box::new(finish)),
        }
    }

    pub fn vertex_id(&self) -> &str {
        &self.vertex_id
    }

    pub fn set_output<T: Any + Send + Sync>(&mut self, field: impl Into<String>, value: T) {
        self.outputs.push(StagedOutput::new(field, value));
    }

    pub fn complete(mut self, code: i32) {
        if let Some(finish) = self.finish.take() {
            finish(code, std::mem::take(&mut self.outputs));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(finish) = self.finish.take() {
            warn!(vertex = %self.vertex_id, "completion dropped without result; finishing with -1");
            finish(-1, std::mem::take(&mut self.outputs));
        }
    }
}
