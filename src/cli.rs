// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `flowdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flowdag",
    version,
    about = "Run data-flow graphs of processors defined in TOML cluster files.",
    long_about = None
)]
pub struct CliArgs {
    /// Cluster file or directory of cluster files (TOML). Repeatable.
    #[arg(long, value_name = "PATH", default_value = "flowdag.toml")]
    pub config: Vec<String>,

    /// Cluster to run. May be omitted when exactly one cluster is loaded.
    #[arg(long, value_name = "NAME")]
    pub cluster: Option<String>,

    /// Graph to run. Defaults to the cluster's first graph.
    #[arg(long, value_name = "NAME")]
    pub graph: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOWDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and build the clusters, print them as Graphviz DOT, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of vertices running at once. `0` means unlimited.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub workers: usize,

    /// Base parameter visible to every vertex, as `KEY=VALUE`. Repeatable.
    ///
    /// Values parse as TOML scalars when possible (`n=3`, `on=true`),
    /// otherwise as strings.
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
