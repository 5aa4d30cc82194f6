// src/processor/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::builtin::{ExistsProcessor, LogProcessor};
use super::schema::FieldSchema;
use super::Processor;

/// Creates fresh processor instances.
pub type ProcessorFactory = Arc<dyn Fn() -> Box<dyn Processor> + Send + Sync>;

struct Registration {
    factory: ProcessorFactory,
    schema: Arc<FieldSchema>,
}

/// Registry of processor types, looked up by name at graph build time.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Registration>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `exists` and `log` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_default::<ExistsProcessor>(ExistsProcessor::NAME);
        registry.register_default::<LogProcessor>(LogProcessor::NAME);
        registry
    }

    /// Register a factory under `name`, replacing any earlier registration.
    ///
    /// The field schema is read from one probe instance here and cached.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        let name = name.into();
        let schema = factory().schema();
        debug!(
            processor = %name,
            inputs = schema.inputs().len(),
            outputs = schema.outputs().len(),
            "registered processor"
        );
        self.processors.insert(
            name,
            Registration {
                factory: Arc::new(factory),
                schema: Arc::new(schema),
            },
        );
    }

    pub fn register_default<P>(&mut self, name: impl Into<String>)
    where
        P: Processor + Default,
    {
        self.register(name, || Box::new(P::default()) as Box<dyn Processor>);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Processor>> {
        self.processors.get(name).map(|r| (r.factory)())
    }

    pub fn factory(&self, name: &str) -> Option<ProcessorFactory> {
        self.processors.get(name).map(|r| r.factory.clone())
    }

    pub fn schema(&self, name: &str) -> Option<Arc<FieldSchema>> {
        self.processors.get(name).map(|r| r.schema.clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish()
    }
}
