// src/engine/cluster_context.rs

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::{ConfigSetting, GraphCluster};
use crate::data::{DataContext, DataKey};
use crate::params::Params;
use crate::processor::{ExecContext, Execution, ProcessorRegistry};

/// Per-run view of a cluster: the cluster itself plus its config settings
/// as evaluated for this run.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    cluster: Arc<GraphCluster>,
    flags: Vec<(String, bool)>,
}

impl ClusterContext {
    /// Evaluate every config setting in declaration order and store each
    /// result as a `bool` named after the setting in `data`.
    pub fn evaluate(
        cluster: Arc<GraphCluster>,
        data: &DataContext,
        registry: &ProcessorRegistry,
        base_params: &Params,
    ) -> Self {
        let mut flags = Vec::with_capacity(cluster.settings().len());
        for setting in cluster.settings() {
            let value = evaluate_setting(setting, data, registry, base_params);
            debug!(cluster = %cluster.name(), setting = %setting.name, value, "evaluated config setting");
            data.set(setting.name.clone(), value);
            flags.push((setting.name.clone(), value));
        }
        Self { cluster, flags }
    }

    pub fn cluster(&self) -> &Arc<GraphCluster> {
        &self.cluster
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags
            .iter()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| *value)
    }

    pub fn flags(&self) -> &[(String, bool)] {
        &self.flags
    }
}

fn evaluate_setting(
    setting: &ConfigSetting,
    data: &DataContext,
    registry: &ProcessorRegistry,
    base_params: &Params,
) -> bool {
    let Some(mut processor) = registry.create(&setting.processor) else {
        warn!(setting = %setting.name, processor = %setting.processor, "config setting processor not registered");
        return false;
    };

    let mut params = Params::new();
    params.insert("expr", setting.cond.clone());
    if processor.setup(&params) != 0 {
        warn!(setting = %setting.name, "config setting processor failed setup");
        return false;
    }

    let mut ctx = ExecContext::new(&setting.name, &params, Some(base_params), data);
    if let Some(schema) = registry.schema(&setting.processor) {
        for field in schema.inputs() {
            if let Some(value) = data.get_value(&DataKey::new(field.name.clone(), field.tag)) {
                ctx.add_input(field.name.clone(), value);
            }
        }
    }

    match catch_unwind(AssertUnwindSafe(|| processor.execute(&mut ctx))) {
        Ok(Execution::Done(code)) => code == 0,
        Ok(Execution::Pending(_)) => {
            warn!(setting = %setting.name, "config setting processors must finish synchronously; treating as false");
            false
        }
        Err(_) => {
            warn!(setting = %setting.name, "config setting processor panicked");
            false
        }
    }
}
