// src/engine/pool.rs

use std::sync::{Arc, Mutex, PoisonError};

use super::graph_context::GraphContext;

/// Idle execution contexts of one graph.
#[derive(Default)]
pub struct ContextPool {
    idle: Mutex<Vec<Arc<GraphContext>>>,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> Option<Arc<GraphContext>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    pub fn release(&self, ctx: Arc<GraphContext>) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ctx);
    }

    pub fn len(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool").field("idle", &self.len()).finish()
    }
}
