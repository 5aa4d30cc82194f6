// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{ClusterConfig, RawClusterConfig};
use crate::errors::Result;

/// Load a cluster file and return the raw `RawClusterConfig`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// structural checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawClusterConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawClusterConfig = toml::from_str(&contents)?;
    if config.name.is_empty() {
        config.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    Ok(config)
}

/// Load a cluster file and validate it.
///
/// A missing `name` defaults to the file stem, so `graphs/ingest.toml`
/// defines cluster `ingest`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ClusterConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ClusterConfig::try_from(raw_config)?;
    debug!(
        cluster = %config.name,
        graphs = config.graph.len(),
        path = %path.as_ref().display(),
        "loaded cluster config"
    );
    Ok(config)
}

/// Load every `*.toml` file directly inside `dir`, sorted by file name.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<ClusterConfig>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    paths.iter().map(|path| load_and_validate(path)).collect()
}
