// src/engine/manager.rs

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::oneshot;
use tracing::info;

use crate::config::{self, ClusterConfig};
use crate::dag::GraphCluster;
use crate::data::DataContext;
use crate::errors::{FlowdagError, Result};
use crate::exec::ExecutorBackend;
use crate::params::Params;
use crate::processor::ProcessorRegistry;

use super::run::{GraphRun, RunEnv};
use super::{RunReport, RunSummary};

/// Per-execution options.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Required: where ready vertices are submitted.
    pub executor: Option<Arc<dyn ExecutorBackend>>,
    /// Fallback parameters for every vertex of the run.
    pub base_params: Params,
}

impl ExecuteOptions {
    pub fn new(executor: Arc<dyn ExecutorBackend>) -> Self {
        Self {
            executor: Some(executor),
            base_params: Params::new(),
        }
    }

    pub fn with_base_params(mut self, params: Params) -> Self {
        self.base_params = params;
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("executor", &self.executor.is_some())
            .field("base_params", &self.base_params)
            .finish()
    }
}

pub(crate) struct ManagerInner {
    pub registry: ProcessorRegistry,
    clusters: RwLock<HashMap<String, Arc<GraphCluster>>>,
}

impl ManagerInner {
    pub(crate) fn cluster(&self, name: &str) -> Option<Arc<GraphCluster>> {
        self.clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Loaded clusters plus the registry they were built against.
///
/// Cheap to clone; clones share the same clusters.
#[derive(Clone)]
pub struct GraphManager {
    inner: Arc<ManagerInner>,
}

impl GraphManager {
    pub fn new(registry: ProcessorRegistry) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                clusters: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.inner.registry
    }

    /// Build and register a cluster. Cluster names must be unique.
    pub fn load_cluster(&self, cfg: &ClusterConfig) -> Result<Arc<GraphCluster>> {
        config::validate_config(cfg)?;
        if self.inner.cluster(&cfg.name).is_some() {
            return Err(FlowdagError::ConfigError(format!(
                "cluster '{}' is already loaded",
                cfg.name
            )));
        }

        let cluster = Arc::new(GraphCluster::build(cfg, &self.inner.registry)?);
        let mut clusters = self
            .inner
            .clusters
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if clusters.contains_key(&cfg.name) {
            return Err(FlowdagError::ConfigError(format!(
                "cluster '{}' is already loaded",
                cfg.name
            )));
        }
        clusters.insert(cfg.name.clone(), Arc::clone(&cluster));
        Ok(cluster)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Arc<GraphCluster>> {
        let cfg = config::load_and_validate(path)?;
        self.load_cluster(&cfg)
    }

    /// Load every `*.toml` cluster file in `dir`.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<Arc<GraphCluster>>> {
        config::load_dir(dir)?
            .iter()
            .map(|cfg| self.load_cluster(cfg))
            .collect()
    }

    pub fn cluster(&self, name: &str) -> Option<Arc<GraphCluster>> {
        self.inner.cluster(name)
    }

    /// Loaded cluster names, sorted.
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .clusters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Start a run of `graph` in `cluster`.
    ///
    /// Returns once the roots are submitted. `done` is called exactly once,
    /// on whichever thread finishes the last vertex. Errors are returned
    /// before anything is submitted, and `done` is not called.
    pub fn execute<F>(
        &self,
        options: ExecuteOptions,
        data: Arc<DataContext>,
        cluster: &str,
        graph: &str,
        done: F,
    ) -> Result<()>
    where
        F: FnOnce(&RunReport<'_>) + Send + 'static,
    {
        let executor = options.executor.ok_or_else(|| {
            FlowdagError::Precondition("ExecuteOptions.executor is required".to_string())
        })?;
        let cluster_ref = self
            .cluster(cluster)
            .ok_or_else(|| FlowdagError::ClusterNotFound(cluster.to_string()))?;
        let graph_ref = cluster_ref
            .graph(graph)
            .ok_or_else(|| FlowdagError::GraphNotFound {
                cluster: cluster.to_string(),
                graph: graph.to_string(),
            })?;

        info!(cluster, graph, "executing graph");
        let env = Arc::new(RunEnv {
            manager: Arc::clone(&self.inner),
            executor,
            base_params: options.base_params,
        });
        GraphRun::start(env, cluster_ref, graph_ref, data, 0, Box::new(done))
    }

    /// Run a graph to completion and return its summary.
    pub async fn run(
        &self,
        options: ExecuteOptions,
        data: Arc<DataContext>,
        cluster: &str,
        graph: &str,
    ) -> Result<RunSummary> {
        let (tx, rx) = oneshot::channel();
        self.execute(options, data, cluster, graph, move |report| {
            let _ = tx.send(report.summary());
        })?;
        rx.await.map_err(|_| {
            FlowdagError::Other(anyhow::anyhow!("graph run ended without reporting"))
        })
    }
}

impl std::fmt::Debug for GraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphManager")
            .field("registry", &self.inner.registry)
            .field("clusters", &self.cluster_names())
            .finish()
    }
}
