// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Build-time problems (bad graph definitions, unknown processors under
//! strict mode) surface as `FlowdagError`. Run-time problems inside a graph
//! never do: they degrade the affected vertex to `Err`/`Skip` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in graph: {0}")]
    DagCycle(String),

    #[error("duplicate vertex id '{vertex}' in graph '{graph}'")]
    DuplicateVertex { graph: String, vertex: String },

    #[error("data '{data}' is produced by both '{first}' and '{second}' in graph '{graph}'")]
    DuplicateOutput {
        graph: String,
        data: String,
        first: String,
        second: String,
    },

    #[error("vertex '{vertex}' in graph '{graph}' references unknown vertex '{reference}'")]
    UnknownVertex {
        graph: String,
        vertex: String,
        reference: String,
    },

    #[error("no vertex in graph '{graph}' produces data '{data}' required by '{vertex}'")]
    MissingProducer {
        graph: String,
        vertex: String,
        data: String,
    },

    #[error("vertex '{vertex}' in graph '{graph}' has no dependencies and no successors")]
    IsolatedVertex { graph: String, vertex: String },

    #[error("vertex '{vertex}' in graph '{graph}' depends on '{dependency}' with conflicting outcome requirements")]
    ConflictingDependency {
        graph: String,
        vertex: String,
        dependency: String,
    },

    #[error("vertex '{vertex}' binds field '{field}' which processor '{processor}' does not declare")]
    UnknownField {
        vertex: String,
        processor: String,
        field: String,
    },

    #[error("Processor not found: {0}")]
    ProcessorNotFound(String),

    #[error("processor '{processor}' of vertex '{vertex}' failed setup with code {code}")]
    ProcessorSetup {
        vertex: String,
        processor: String,
        code: i32,
    },

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("graph '{graph}' not found in cluster '{cluster}'")]
    GraphNotFound { cluster: String, graph: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowdagError>;
