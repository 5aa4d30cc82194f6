// src/engine/graph_context.rs

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::dag::{Graph, VertexId};
use crate::data::DataContext;
use crate::errors::Result;
use crate::processor::ProcessorRegistry;

use super::vertex_context::VertexContext;
use super::DoneCallback;

/// Run-time state of one graph execution. Pooled by its [`Graph`] and
/// reset between runs.
pub struct GraphContext {
    vertices: Vec<VertexContext>,
    join: AtomicUsize,
    first_error: AtomicI32,
    data: Arc<DataContext>,
    done: Mutex<Option<DoneCallback>>,
}

impl GraphContext {
    pub fn new(graph: &Graph, registry: &ProcessorRegistry) -> Result<Self> {
        let vertices = graph
            .vertices()
            .iter()
            .map(|v| VertexContext::new(graph.name(), v, registry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            join: AtomicUsize::new(vertices.len()),
            vertices,
            first_error: AtomicI32::new(0),
            data: Arc::new(DataContext::new()),
            done: Mutex::new(None),
        })
    }

    pub fn vertex(&self, handle: VertexId) -> Option<&VertexContext> {
        self.vertices.get(handle)
    }

    pub fn vertices(&self) -> &[VertexContext] {
        &self.vertices
    }

    pub fn data(&self) -> &Arc<DataContext> {
        &self.data
    }

    /// Vertices not yet finished.
    pub fn remaining(&self) -> usize {
        self.join.load(Ordering::Acquire)
    }

    /// First non-zero code reported by a vertex, or `0`.
    pub fn code(&self) -> i32 {
        self.first_error.load(Ordering::Acquire)
    }

    pub(crate) fn set_done(&self, done: DoneCallback) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = Some(done);
    }

    pub(crate) fn take_done(&self) -> Option<DoneCallback> {
        self.done.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Count one vertex as finished. Returns `true` for the last one.
    pub(crate) fn finish_one(&self) -> bool {
        self.join.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn note_code(&self, code: i32) {
        if code != 0 {
            let _ = self
                .first_error
                .compare_exchange(0, code, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    pub(crate) fn reset(&self) {
        for vertex in &self.vertices {
            vertex.reset();
        }
        self.join.store(self.vertices.len(), Ordering::Release);
        self.first_error.store(0, Ordering::Release);
        self.data.reset();
        self.take_done();
    }
}

impl std::fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphContext")
            .field("vertices", &self.vertices)
            .field("remaining", &self.remaining())
            .field("code", &self.code())
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
