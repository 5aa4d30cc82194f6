// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ClusterConfig, GraphConfig, RawClusterConfig, VertexConfig};
use crate::errors::{FlowdagError, Result};

impl TryFrom<RawClusterConfig> for ClusterConfig {
    type Error = crate::errors::FlowdagError;

    fn try_from(raw: RawClusterConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ClusterConfig::new_unchecked(raw))
    }
}

/// Structural checks that need no processor registry.
///
/// Edge-level problems (dangling references, missing producers, cycles)
/// are reported when the graph is built.
pub fn validate_config(cfg: &ClusterConfig) -> Result<()> {
    let settings = setting_names(&cfg.config_setting)?;
    check_graphs(&cfg.graph, &settings)
}

fn validate_raw_config(cfg: &RawClusterConfig) -> Result<()> {
    ensure_has_graphs(cfg)?;
    validate_cluster_section(cfg)?;
    let settings = setting_names(&cfg.config_setting)?;
    check_graphs(&cfg.graph, &settings)
}

fn ensure_has_graphs(cfg: &RawClusterConfig) -> Result<()> {
    if cfg.graph.is_empty() {
        return Err(FlowdagError::ConfigError(format!(
            "cluster '{}' must contain at least one [[graph]] section",
            cfg.name
        )));
    }
    Ok(())
}

fn validate_cluster_section(cfg: &RawClusterConfig) -> Result<()> {
    if cfg.default_context_pool_size == 0 {
        return Err(FlowdagError::ConfigError(
            "default_context_pool_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.default_expr_processor.trim().is_empty() {
        return Err(FlowdagError::ConfigError(
            "default_expr_processor must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn setting_names(settings: &[crate::config::ConfigSettingConfig]) -> Result<HashSet<&str>> {
    let mut names = HashSet::new();
    for setting in settings {
        if setting.name.is_empty() {
            return Err(FlowdagError::ConfigError(
                "config_setting with empty name".to_string(),
            ));
        }
        if !names.insert(setting.name.as_str()) {
            return Err(FlowdagError::ConfigError(format!(
                "duplicate config_setting '{}'",
                setting.name
            )));
        }
    }
    Ok(names)
}

fn check_graphs(graphs: &[GraphConfig], settings: &HashSet<&str>) -> Result<()> {
    let mut seen = HashSet::new();
    for graph in graphs {
        if graph.name.is_empty() {
            return Err(FlowdagError::ConfigError(
                "graph with empty name".to_string(),
            ));
        }
        if !seen.insert(graph.name.as_str()) {
            return Err(FlowdagError::ConfigError(format!(
                "duplicate graph '{}'",
                graph.name
            )));
        }
        if graph.vertex.is_empty() {
            return Err(FlowdagError::ConfigError(format!(
                "graph '{}' has no vertices",
                graph.name
            )));
        }
        for (idx, vertex) in graph.vertex.iter().enumerate() {
            check_vertex(&graph.name, idx, vertex, settings)?;
        }
    }
    Ok(())
}

fn check_vertex(
    graph: &str,
    idx: usize,
    vertex: &VertexConfig,
    settings: &HashSet<&str>,
) -> Result<()> {
    let label = if vertex.id.is_empty() {
        format!("#{idx}")
    } else {
        vertex.id.clone()
    };

    if !vertex.processor.is_empty() && !vertex.graph.is_empty() {
        return Err(FlowdagError::ConfigError(format!(
            "vertex '{label}' in graph '{graph}' sets both `processor` and `graph`"
        )));
    }
    if !vertex.cluster.is_empty() && vertex.graph.is_empty() {
        return Err(FlowdagError::ConfigError(format!(
            "vertex '{label}' in graph '{graph}' sets `cluster` without `graph`"
        )));
    }

    for select in &vertex.select_args {
        if !settings.contains(select.guard.as_str()) {
            return Err(FlowdagError::ConfigError(format!(
                "vertex '{label}' in graph '{graph}' selects args on unknown config setting '{}'",
                select.guard
            )));
        }
    }

    if !vertex.expect_config.is_empty() {
        let name = vertex.expect_config.trim_start_matches('!');
        if !settings.contains(name) {
            return Err(FlowdagError::ConfigError(format!(
                "vertex '{label}' in graph '{graph}' expects unknown config setting '{name}'"
            )));
        }
    }

    for binding in vertex.input.iter().chain(vertex.output.iter()) {
        if binding.id.is_empty() && (binding.merge.is_empty() || binding.field.is_empty()) {
            return Err(FlowdagError::ConfigError(format!(
                "vertex '{label}' in graph '{graph}' has a data binding without `id`"
            )));
        }
    }
    for binding in &vertex.output {
        if !binding.merge.is_empty() || !binding.cond.is_empty() || binding.is_extern {
            return Err(FlowdagError::ConfigError(format!(
                "output '{}' of vertex '{label}' in graph '{graph}' uses an input-only option",
                binding.id
            )));
        }
    }

    Ok(())
}
