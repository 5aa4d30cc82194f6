// src/config/mod.rs

//! Cluster definitions.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading cluster files from disk.
//! - `validate.rs`: structural checks, `RawClusterConfig` → `ClusterConfig`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_dir, load_from_path};
pub use model::{
    ClusterConfig, ConfigSettingConfig, DataBindingConfig, GraphConfig, RawClusterConfig,
    SelectArgsConfig, VertexConfig,
};
pub use validate::validate_config;
