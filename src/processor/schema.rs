// src/processor/schema.rs

use std::any::Any;

use crate::data::TypeTag;

/// One declared input or output field of a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub tag: TypeTag,
}

/// Named, typed fields a processor reads and writes.
///
/// Vertex data bindings refer to these by `field`; the graph builder uses
/// the declared tags to pre-register typed slots in the data context.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    inputs: Vec<FieldDecl>,
    outputs: Vec<FieldDecl>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input<T: Any>(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(FieldDecl {
            name: name.into(),
            tag: TypeTag::of::<T>(),
        });
        self
    }

    pub fn output<T: Any>(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(FieldDecl {
            name: name.into(),
            tag: TypeTag::of::<T>(),
        });
        self
    }

    pub fn inputs(&self) -> &[FieldDecl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FieldDecl] {
        &self.outputs
    }

    pub fn input_field(&self, name: &str) -> Option<&FieldDecl> {
        self.inputs.iter().find(|f| f.name == name)
    }

    pub fn output_field(&self, name: &str) -> Option<&FieldDecl> {
        self.outputs.iter().find(|f| f.name == name)
    }
}
