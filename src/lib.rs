// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod data;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod params;
pub mod processor;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::data::DataContext;
use crate::engine::{ExecuteOptions, GraphManager, RunSummary};
use crate::exec::TokioExecutor;
use crate::params::Params;
use crate::processor::ProcessorRegistry;

pub use crate::engine::RunReport;
pub use crate::errors::FlowdagError;
pub use crate::types::{Outcome, OutcomeMask, VertexCode};

/// High-level entry point used by `main.rs`.
///
/// Loads every `--config` path, then either prints the built clusters
/// (`--dry-run`) or runs one graph and returns its code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let manager = GraphManager::new(ProcessorRegistry::with_builtins());
    for path in &args.config {
        load_path(&manager, Path::new(path))?;
    }

    if args.dry_run {
        print_dry_run(&manager, args.cluster.as_deref())?;
        return Ok(0);
    }

    let cluster_name = match args.cluster {
        Some(name) => name,
        None => single_cluster(&manager)?,
    };
    let cluster = manager
        .cluster(&cluster_name)
        .ok_or_else(|| anyhow!("cluster '{cluster_name}' is not loaded"))?;
    let graph_name = match args.graph {
        Some(name) => name,
        None => cluster
            .graph_names()
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cluster '{cluster_name}' has no graphs"))?,
    };

    let mut base_params = Params::new();
    for arg in &args.args {
        let (key, value) = parse_base_param(arg)?;
        base_params.insert(key, value);
    }

    let executor = TokioExecutor::current()?.with_limit(args.workers);
    let options = ExecuteOptions::new(Arc::new(executor)).with_base_params(base_params);

    info!(cluster = %cluster_name, graph = %graph_name, "running graph");
    let summary = manager
        .run(options, Arc::new(DataContext::new()), &cluster_name, &graph_name)
        .await?;

    print_summary(&summary);
    Ok(summary.code)
}

fn load_path(manager: &GraphManager, path: &Path) -> Result<()> {
    if path.is_dir() {
        let clusters = manager
            .load_dir(path)
            .with_context(|| format!("loading clusters from {}", path.display()))?;
        debug!(path = %path.display(), clusters = clusters.len(), "loaded cluster directory");
    } else {
        manager
            .load_file(path)
            .with_context(|| format!("loading cluster {}", path.display()))?;
    }
    Ok(())
}

fn single_cluster(manager: &GraphManager) -> Result<String> {
    let mut names = manager.cluster_names();
    match names.len() {
        1 => Ok(names.remove(0)),
        0 => bail!("no clusters loaded"),
        _ => bail!(
            "several clusters loaded ({}); pick one with --cluster",
            names.join(", ")
        ),
    }
}

/// Parse a `KEY=VALUE` base parameter. The value is read as a TOML
/// scalar when it is one, otherwise kept as a string.
pub fn parse_base_param(arg: &str) -> Result<(String, toml::Value)> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in '{arg}'");
    }

    let value = toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Print every loaded cluster (or only `cluster`) as DOT.
fn print_dry_run(manager: &GraphManager, cluster: Option<&str>) -> Result<()> {
    let names = match cluster {
        Some(name) => vec![name.to_string()],
        None => manager.cluster_names(),
    };
    for name in names {
        let cluster = manager
            .cluster(&name)
            .ok_or_else(|| anyhow!("cluster '{name}' is not loaded"))?;
        print!("{}", cluster.to_dot());
    }
    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{}::{} finished with code {}",
        summary.cluster, summary.graph, summary.code
    );
    for vertex in &summary.vertices {
        println!(
            "  {:<24} {:?}/{:?} (exit {})",
            vertex.id, vertex.outcome, vertex.code, vertex.exit_code
        );
    }
}
