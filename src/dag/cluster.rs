// src/dag/cluster.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::model::ClusterConfig;
use crate::errors::{FlowdagError, Result};
use crate::processor::ProcessorRegistry;

use super::graph::{BuildEnv, Graph};

/// A named boolean evaluated before each run of a cluster graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSetting {
    pub name: String,
    pub cond: String,
    pub processor: String,
}

/// Named collection of graphs sharing config settings.
#[derive(Debug)]
pub struct GraphCluster {
    name: String,
    strict: bool,
    default_expr_processor: String,
    pool_size: usize,
    settings: Vec<ConfigSetting>,
    graphs: HashMap<String, Arc<Graph>>,
    order: Vec<String>,
}

impl GraphCluster {
    /// Build every graph of the cluster. Any failure fails the whole
    /// cluster.
    pub fn build(cfg: &ClusterConfig, registry: &ProcessorRegistry) -> Result<Self> {
        let mut settings = Vec::with_capacity(cfg.config_setting.len());
        for setting in &cfg.config_setting {
            let processor = if setting.processor.is_empty() {
                cfg.default_expr_processor.clone()
            } else {
                setting.processor.clone()
            };
            if !registry.contains(&processor) {
                return Err(FlowdagError::ProcessorNotFound(format!(
                    "{processor} (config setting '{}' in cluster '{}')",
                    setting.name, cfg.name
                )));
            }
            settings.push(ConfigSetting {
                name: setting.name.clone(),
                cond: setting.cond.clone(),
                processor,
            });
        }

        let env = BuildEnv {
            registry,
            cluster: &cfg.name,
            default_expr_processor: &cfg.default_expr_processor,
            strict: cfg.strict_dsl,
            pool_size: cfg.default_context_pool_size,
        };

        let mut graphs = HashMap::new();
        let mut order = Vec::with_capacity(cfg.graph.len());
        for graph_cfg in &cfg.graph {
            let graph = Graph::build(graph_cfg, &env)?;
            order.push(graph_cfg.name.clone());
            graphs.insert(graph_cfg.name.clone(), Arc::new(graph));
        }

        info!(
            cluster = %cfg.name,
            graphs = order.len(),
            settings = settings.len(),
            "built cluster"
        );

        Ok(Self {
            name: cfg.name.clone(),
            strict: cfg.strict_dsl,
            default_expr_processor: cfg.default_expr_processor.clone(),
            pool_size: cfg.default_context_pool_size,
            settings,
            graphs,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn default_expr_processor(&self) -> &str {
        &self.default_expr_processor
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Settings in declaration order.
    pub fn settings(&self) -> &[ConfigSetting] {
        &self.settings
    }

    pub fn graph(&self, name: &str) -> Option<Arc<Graph>> {
        self.graphs.get(name).cloned()
    }

    /// Graph names in declaration order.
    pub fn graph_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Graphs in declaration order.
    pub fn graphs(&self) -> impl Iterator<Item = &Arc<Graph>> {
        self.order.iter().filter_map(|name| self.graphs.get(name))
    }
}
