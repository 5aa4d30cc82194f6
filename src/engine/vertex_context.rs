// src/engine/vertex_context.rs

use std::sync::atomic::{AtomicI32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dag::Vertex;
use crate::errors::{FlowdagError, Result};
use crate::processor::{Processor, ProcessorRegistry};
use crate::types::{Outcome, VertexCode};

/// Run-time state of one vertex inside a pooled [`GraphContext`].
///
/// [`GraphContext`]: super::GraphContext
pub struct VertexContext {
    pending: AtomicUsize,
    dep_results: Vec<AtomicU8>,
    outcome: AtomicU8,
    code: AtomicU8,
    exit_code: AtomicI32,
    active_args: AtomicUsize,
    processor: Mutex<Option<Box<dyn Processor>>>,
}

impl VertexContext {
    /// Create the context and set up the vertex's processor, if it has a
    /// registered one.
    pub(crate) fn new(graph: &str, vertex: &Vertex, registry: &ProcessorRegistry) -> Result<Self> {
        let processor = match vertex.kind().processor() {
            Some(name) => match registry.create(name) {
                Some(mut processor) => {
                    let rc = processor.setup(vertex.params());
                    if rc != 0 {
                        return Err(FlowdagError::ProcessorSetup {
                            vertex: format!("{graph}::{}", vertex.id()),
                            processor: name.to_string(),
                            code: rc,
                        });
                    }
                    Some(processor)
                }
                None => None,
            },
            None => None,
        };

        let dep_count = vertex.dependencies().len();
        Ok(Self {
            pending: AtomicUsize::new(dep_count),
            dep_results: (0..dep_count)
                .map(|_| AtomicU8::new(Outcome::Invalid as u8))
                .collect(),
            outcome: AtomicU8::new(Outcome::Invalid as u8),
            code: AtomicU8::new(VertexCode::Invalid as u8),
            exit_code: AtomicI32::new(0),
            active_args: AtomicUsize::new(0),
            processor: Mutex::new(processor),
        })
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_u8(self.outcome.load(Ordering::Acquire))
    }

    pub fn code(&self) -> VertexCode {
        VertexCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Code returned by the processor or sub-graph; `0` when the vertex
    /// never ran.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    /// Dependencies not yet reported.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn dependency_result(&self, idx: usize) -> Outcome {
        self.dep_results
            .get(idx)
            .map(|r| Outcome::from_u8(r.load(Ordering::Acquire)))
            .unwrap_or(Outcome::Invalid)
    }

    /// `0` for the base parameters, `n` for `select_args[n - 1]`.
    pub fn active_args(&self) -> usize {
        self.active_args.load(Ordering::Relaxed)
    }

    pub(crate) fn set_active_args(&self, idx: usize) {
        self.active_args.store(idx, Ordering::Relaxed);
    }

    /// Record the outcome of the dependency at `idx`.
    ///
    /// Only the first report for a slot counts. Returns `true` for the call
    /// that resolved the last outstanding dependency.
    pub(crate) fn set_dependency_result(&self, idx: usize, outcome: Outcome) -> bool {
        let Some(slot) = self.dep_results.get(idx) else {
            return false;
        };
        if slot
            .compare_exchange(
                Outcome::Invalid as u8,
                outcome as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        self.pending.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn set_result(&self, outcome: Outcome, code: VertexCode, exit_code: i32) {
        self.exit_code.store(exit_code, Ordering::Release);
        self.code.store(code as u8, Ordering::Release);
        self.outcome.store(outcome as u8, Ordering::Release);
    }

    fn lock_processor(&self) -> MutexGuard<'_, Option<Box<dyn Processor>>> {
        self.processor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the processor out for one execution. `None` when the vertex has
    /// no registered processor.
    pub(crate) fn take_processor(&self) -> Option<Box<dyn Processor>> {
        self.lock_processor().take()
    }

    pub(crate) fn restore_processor(&self, processor: Box<dyn Processor>) {
        *self.lock_processor() = Some(processor);
    }

    pub(crate) fn reset(&self) {
        self.pending.store(self.dep_results.len(), Ordering::Release);
        for slot in &self.dep_results {
            slot.store(Outcome::Invalid as u8, Ordering::Release);
        }
        self.outcome.store(Outcome::Invalid as u8, Ordering::Release);
        self.code.store(VertexCode::Invalid as u8, Ordering::Release);
        self.exit_code.store(0, Ordering::Release);
        self.active_args.store(0, Ordering::Relaxed);
        if let Some(processor) = self.lock_processor().as_mut() {
            processor.reset();
        }
    }
}

impl std::fmt::Debug for VertexContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexContext")
            .field("pending", &self.pending())
            .field("outcome", &self.outcome())
            .field("code", &self.code())
            .field("exit_code", &self.exit_code())
            .finish_non_exhaustive()
    }
}
