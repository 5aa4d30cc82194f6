// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The engine never blocks or spawns threads itself: every ready vertex is
//! handed to an `ExecutorBackend` as a [`Job`].
//!
//! - [`TokioExecutor`] runs jobs on a tokio runtime's blocking pool, with an
//!   optional concurrency limit. This is what the `flowdag` binary uses.
//! - [`InlineExecutor`] runs each job on the submitting thread.
//! - Any `Fn(Job)` closure is an executor too, which is how tests plug in
//!   fakes that queue or reorder jobs.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::errors::{FlowdagError, Result};

/// A unit of work submitted by the engine.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait ExecutorBackend: Send + Sync {
    /// Run `job` at some point, on any thread.
    fn spawn(&self, job: Job);
}

impl<F> ExecutorBackend for F
where
    F: Fn(Job) + Send + Sync,
{
    fn spawn(&self, job: Job) {
        self(job)
    }
}

/// Runs jobs with `spawn_blocking` on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
    permits: Option<Arc<Semaphore>>,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            permits: None,
        }
    }

    /// Executor on the runtime of the calling task.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            FlowdagError::Precondition(format!("no tokio runtime available: {e}"))
        })?;
        Ok(Self::new(handle))
    }

    /// Run at most `workers` jobs at a time. `0` means unlimited.
    pub fn with_limit(mut self, workers: usize) -> Self {
        self.permits = (workers > 0).then(|| Arc::new(Semaphore::new(workers)));
        self
    }
}

impl ExecutorBackend for TokioExecutor {
    fn spawn(&self, job: Job) {
        match &self.permits {
            None => {
                self.handle.spawn_blocking(job);
            }
            Some(permits) => {
                let permits = Arc::clone(permits);
                self.handle.spawn(async move {
                    let Ok(permit) = permits.acquire_owned().await else {
                        return;
                    };
                    let _ = tokio::task::spawn_blocking(move || {
                        let _permit = permit;
                        job()
                    })
                    .await;
                });
            }
        }
        trace!("submitted job");
    }
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl ExecutorBackend for InlineExecutor {
    fn spawn(&self, job: Job) {
        job()
    }
}
