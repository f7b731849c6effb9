// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5.53", features = ["derive"] }` in `Cargo.toml`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sitemill`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitemill",
    version,
    about = "Compile, watch and serve a static site.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sitemill.toml` in the current working directory. A missing
    /// file is fine; every setting has a default.
    #[arg(long, value_name = "PATH", default_value = "Sitemill.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEMILL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Compile the whole site for production.
    Build,
    /// Compile for development, then watch, rebuild and live-reload.
    Dev,
    /// Remove the output directory.
    Clean,
    /// Run one task directly, outside the task graph.
    Run {
        #[arg(value_enum)]
        task: RunnableTask,
    },
    /// Check markup class names against BEM naming rules.
    Lint,
    /// Print the task graph and watch rules without executing anything.
    Plan,
}

/// Tasks that can be invoked directly via `sitemill run <task>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum RunnableTask {
    Markup,
    Styles,
    Scripts,
    Static,
    Lint,
    Clean,
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
