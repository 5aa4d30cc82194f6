// src/processor/context.rs

//! What a processor sees during one `execute` call.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use toml::Value;

use crate::data::{DataContext, DataValue, TypeTag};
use crate::params::Params;

/// A value a processor wants written to one of its output fields.
///
/// Staged values are published to the data context by the engine once the
/// vertex finishes, under the data id bound to `field`.
#[derive(Clone)]
pub struct StagedOutput {
    pub field: String,
    pub tag: TypeTag,
    pub value: DataValue,
}

impl StagedOutput {
    pub fn new<T: Any + Send + Sync>(field: impl Into<String>, value: T) -> Self {
        Self {
            field: field.into(),
            tag: TypeTag::of::<T>(),
            value: Arc::new(value),
        }
    }
}

impl std::fmt::Debug for StagedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedOutput")
            .field("field", &self.field)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

pub struct ExecContext<'a> {
    vertex_id: &'a str,
    params: &'a Params,
    base_params: Option<&'a Params>,
    data: &'a DataContext,
    inputs: HashMap<String, Vec<DataValue>>,
    outputs: Vec<StagedOutput>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        vertex_id: &'a str,
        params: &'a Params,
        base_params: Option<&'a Params>,
        data: &'a DataContext,
    ) -> Self {
        Self {
            vertex_id,
            params,
            base_params,
            data,
            inputs: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn vertex_id(&self) -> &str {
        self.vertex_id
    }

    /// Active parameter set of the vertex (base `args` or the selected
    /// `select_args` alternative).
    pub fn params(&self) -> &Params {
        self.params
    }

    /// Parameter lookup that falls back to the run's base parameters.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params
            .get(key)
            .or_else(|| self.base_params.and_then(|base| base.get(key)))
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.param(key).and_then(Value::as_integer)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.param(key).and_then(Value::as_bool)
    }

    pub fn add_input(&mut self, field: impl Into<String>, value: DataValue) {
        self.inputs.entry(field.into()).or_default().push(value);
    }

    pub fn has_input(&self, field: &str) -> bool {
        self.inputs.get(field).is_some_and(|v| !v.is_empty())
    }

    /// First value injected into `field`.
    pub fn input<T: Any + Send + Sync>(&self, field: &str) -> Option<Arc<T>> {
        let value = self.inputs.get(field)?.first()?.clone();
        value.downcast::<T>().ok()
    }

    /// Every value injected into `field`, in `merge` order.
    pub fn inputs<T: Any + Send + Sync>(&self, field: &str) -> Vec<Arc<T>> {
        self.inputs
            .get(field)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.clone().downcast::<T>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_output<T: Any + Send + Sync>(&mut self, field: impl Into<String>, value: T) {
        self.outputs.push(StagedOutput::new(field, value));
    }

    /// Read access to the whole data context chain.
    pub fn data(&self) -> &DataContext {
        self.data
    }

    pub fn into_outputs(self) -> Vec<StagedOutput> {
        self.outputs
    }
}
