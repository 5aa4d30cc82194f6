// src/config/model.rs

use serde::Deserialize;

/// One cluster definition as read from a TOML file, before validation.
///
/// ```toml
/// name = "pipeline"
/// default_expr_processor = "exists"
/// default_context_pool_size = 4
///
/// [[config_setting]]
/// name = "with_debug"
/// cond = "debug"
///
/// [[graph]]
/// name = "main"
///
/// [[graph.vertex]]
/// processor = "load"
/// output = [{ id = "rows", field = "rows" }]
///
/// [[graph.vertex]]
/// processor = "store"
/// input = [{ id = "rows", field = "rows", required = true }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClusterConfig {
    /// Cluster name. The loader fills it from the file stem when absent.
    #[serde(default)]
    pub name: String,

    /// Unregistered processor names fail the build instead of producing
    /// vertices that are skipped at run time.
    #[serde(default)]
    pub strict_dsl: bool,

    /// Processor evaluating `cond` expressions when none is named.
    #[serde(default = "default_expr_processor")]
    pub default_expr_processor: String,

    /// Number of execution contexts preallocated per graph.
    #[serde(default = "default_context_pool_size")]
    pub default_context_pool_size: usize,

    #[serde(default)]
    pub config_setting: Vec<ConfigSettingConfig>,

    #[serde(default)]
    pub graph: Vec<GraphConfig>,
}

pub(crate) fn default_expr_processor() -> String {
    "exists".to_string()
}

pub(crate) fn default_context_pool_size() -> usize {
    4
}

/// Validated cluster definition. Build one with `ClusterConfig::try_from`.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub name: String,
    pub strict_dsl: bool,
    pub default_expr_processor: String,
    pub default_context_pool_size: usize,
    pub config_setting: Vec<ConfigSettingConfig>,
    pub graph: Vec<GraphConfig>,
}

impl ClusterConfig {
    pub(crate) fn new_unchecked(raw: RawClusterConfig) -> Self {
        Self {
            name: raw.name,
            strict_dsl: raw.strict_dsl,
            default_expr_processor: raw.default_expr_processor,
            default_context_pool_size: raw.default_context_pool_size,
            config_setting: raw.config_setting,
            graph: raw.graph,
        }
    }

    pub fn graph(&self, name: &str) -> Option<&GraphConfig> {
        self.graph.iter().find(|g| g.name == name)
    }
}

/// `[[config_setting]]`: a named boolean evaluated before every run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSettingConfig {
    pub name: String,

    /// Expression handed to the processor as `expr`.
    #[serde(default)]
    pub cond: String,

    /// Empty means the cluster's `default_expr_processor`.
    #[serde(default)]
    pub processor: String,
}

/// `[[graph]]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphConfig {
    pub name: String,

    #[serde(default)]
    pub vertex: Vec<VertexConfig>,
}

/// `[[graph.vertex]]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VertexConfig {
    /// Unique within the graph; generated when empty.
    pub id: String,

    /// Registered processor name. Mutually exclusive with `graph`.
    pub processor: String,

    /// Run condition. Without a processor, the vertex evaluates it with the
    /// cluster's condition processor.
    pub cond: String,

    /// Id of a vertex that must finish OK before this one runs.
    pub expect: String,

    /// Config setting that must be true (`!name` negates).
    pub expect_config: String,

    /// Cluster of the sub-graph; empty means the containing cluster.
    pub cluster: String,

    /// Sub-graph to run in place of a processor.
    pub graph: String,

    /// Base parameters.
    pub args: toml::Table,

    /// Alternative parameter sets; the first whose guard is true wins.
    pub select_args: Vec<SelectArgsConfig>,

    pub input: Vec<DataBindingConfig>,
    pub output: Vec<DataBindingConfig>,

    pub deps: Vec<String>,
    pub deps_on_ok: Vec<String>,
    pub deps_on_err: Vec<String>,

    pub successor: Vec<String>,
    pub successor_on_ok: Vec<String>,
    pub successor_on_err: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectArgsConfig {
    /// Config setting guarding this alternative.
    #[serde(rename = "match")]
    pub guard: String,

    #[serde(default)]
    pub args: toml::Table,
}

/// One `input` / `output` entry: binds a processor field to a data id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataBindingConfig {
    /// Data id in the graph's data context.
    pub id: String,

    /// Processor field; defaults to `id`.
    pub field: String,

    /// Inputs only: the vertex is skipped when the value is absent, and
    /// the producer must finish OK.
    pub required: bool,

    #[serde(rename = "move")]
    pub is_move: bool,

    /// Inputs only: collect these data ids into the field instead of `id`.
    pub merge: Vec<String>,

    /// Inputs only: the value comes from outside the graph.
    #[serde(rename = "extern")]
    pub is_extern: bool,

    /// Inputs only: consume the value only when this condition holds.
    pub cond: String,
}

impl DataBindingConfig {
    pub fn field_name(&self) -> &str {
        if self.field.is_empty() {
            &self.id
        } else {
            &self.field
        }
    }
}
