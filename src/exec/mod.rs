// src/exec/mod.rs

//! Job execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait the engine submits
//!   ready vertices to, and the tokio and inline implementations.

pub mod backend;

pub use backend::{ExecutorBackend, InlineExecutor, Job, TokioExecutor};
