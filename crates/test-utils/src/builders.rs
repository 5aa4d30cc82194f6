#![allow(dead_code)]

use flowdag::config::{
    ClusterConfig, ConfigSettingConfig, DataBindingConfig, GraphConfig, RawClusterConfig,
    SelectArgsConfig, VertexConfig,
};
use flowdag::errors::Result;

/// Builder for `ClusterConfig` to simplify test setup.
pub struct ClusterConfigBuilder {
    config: RawClusterConfig,
}

impl ClusterConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            config: RawClusterConfig {
                name: name.to_string(),
                strict_dsl: false,
                default_expr_processor: "exists".to_string(),
                default_context_pool_size: 2,
                config_setting: Vec::new(),
                graph: Vec::new(),
            },
        }
    }

    pub fn strict(mut self, val: bool) -> Self {
        self.config.strict_dsl = val;
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.default_context_pool_size = size;
        self
    }

    pub fn default_expr_processor(mut self, name: &str) -> Self {
        self.config.default_expr_processor = name.to_string();
        self
    }

    pub fn setting(self, name: &str, cond: &str) -> Self {
        self.setting_with(name, cond, "")
    }

    pub fn setting_with(mut self, name: &str, cond: &str, processor: &str) -> Self {
        self.config.config_setting.push(ConfigSettingConfig {
            name: name.to_string(),
            cond: cond.to_string(),
            processor: processor.to_string(),
        });
        self
    }

    pub fn graph(mut self, graph: GraphConfig) -> Self {
        self.config.graph.push(graph);
        self
    }

    pub fn raw(self) -> RawClusterConfig {
        self.config
    }

    pub fn try_build(self) -> Result<ClusterConfig> {
        ClusterConfig::try_from(self.config)
    }

    pub fn build(self) -> ClusterConfig {
        self.try_build()
            .expect("Failed to build valid cluster config from builder")
    }
}

/// Builder for `GraphConfig`.
pub struct GraphConfigBuilder {
    graph: GraphConfig,
}

impl GraphConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            graph: GraphConfig {
                name: name.to_string(),
                vertex: Vec::new(),
            },
        }
    }

    pub fn vertex(mut self, vertex: VertexConfig) -> Self {
        self.graph.vertex.push(vertex);
        self
    }

    pub fn build(self) -> GraphConfig {
        self.graph
    }
}

/// Builder for `VertexConfig`.
pub struct VertexBuilder {
    vertex: VertexConfig,
}

impl VertexBuilder {
    /// Vertex running `processor`, with id `id`.
    pub fn new(id: &str, processor: &str) -> Self {
        Self {
            vertex: VertexConfig {
                id: id.to_string(),
                processor: processor.to_string(),
                ..VertexConfig::default()
            },
        }
    }

    /// Vertex without processor or sub-graph.
    pub fn control(id: &str) -> Self {
        Self::new(id, "")
    }

    pub fn subgraph(id: &str, cluster: &str, graph: &str) -> Self {
        let mut builder = Self::new(id, "");
        builder.vertex.cluster = cluster.to_string();
        builder.vertex.graph = graph.to_string();
        builder
    }

    /// Condition vertex evaluated by the cluster's condition processor.
    pub fn condition(id: &str, cond: &str) -> Self {
        Self::new(id, "").cond(cond)
    }

    pub fn id(mut self, id: &str) -> Self {
        self.vertex.id = id.to_string();
        self
    }

    pub fn cond(mut self, cond: &str) -> Self {
        self.vertex.cond = cond.to_string();
        self
    }

    pub fn expect(mut self, id: &str) -> Self {
        self.vertex.expect = id.to_string();
        self
    }

    pub fn expect_config(mut self, setting: &str) -> Self {
        self.vertex.expect_config = setting.to_string();
        self
    }

    pub fn arg(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.vertex.args.insert(key.to_string(), value.into());
        self
    }

    pub fn select_args(mut self, guard: &str, args: &[(&str, toml::Value)]) -> Self {
        let args = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.vertex.select_args.push(SelectArgsConfig {
            guard: guard.to_string(),
            args,
        });
        self
    }

    pub fn input(mut self, id: &str, field: &str) -> Self {
        self.vertex.input.push(binding(id, field));
        self
    }

    pub fn required_input(mut self, id: &str, field: &str) -> Self {
        let mut b = binding(id, field);
        b.required = true;
        self.vertex.input.push(b);
        self
    }

    pub fn extern_input(mut self, id: &str, field: &str, required: bool) -> Self {
        let mut b = binding(id, field);
        b.is_extern = true;
        b.required = required;
        self.vertex.input.push(b);
        self
    }

    pub fn cond_input(mut self, id: &str, field: &str, cond: &str) -> Self {
        let mut b = binding(id, field);
        b.cond = cond.to_string();
        self.vertex.input.push(b);
        self
    }

    pub fn merge_input(mut self, field: &str, ids: &[&str], required: bool) -> Self {
        let mut b = binding("", field);
        b.merge = ids.iter().map(|s| s.to_string()).collect();
        b.required = required;
        self.vertex.input.push(b);
        self
    }

    pub fn output(mut self, id: &str, field: &str) -> Self {
        self.vertex.output.push(binding(id, field));
        self
    }

    pub fn dep(mut self, id: &str) -> Self {
        self.vertex.deps.push(id.to_string());
        self
    }

    pub fn dep_on_ok(mut self, id: &str) -> Self {
        self.vertex.deps_on_ok.push(id.to_string());
        self
    }

    pub fn dep_on_err(mut self, id: &str) -> Self {
        self.vertex.deps_on_err.push(id.to_string());
        self
    }

    pub fn successor(mut self, id: &str) -> Self {
        self.vertex.successor.push(id.to_string());
        self
    }

    pub fn successor_on_ok(mut self, id: &str) -> Self {
        self.vertex.successor_on_ok.push(id.to_string());
        self
    }

    pub fn successor_on_err(mut self, id: &str) -> Self {
        self.vertex.successor_on_err.push(id.to_string());
        self
    }

    pub fn build(self) -> VertexConfig {
        self.vertex
    }
}

/// Data binding of `id` to `field`.
pub fn binding(id: &str, field: &str) -> DataBindingConfig {
    DataBindingConfig {
        id: id.to_string(),
        field: field.to_string(),
        ..DataBindingConfig::default()
    }
}
