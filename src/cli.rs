//! CLI surface (§6): the external options collaborator, implemented
//! concretely here so the binary runs end to end. Subcommand shape
//! mirrors `mickey951112-cargo`'s `src/bin/cargo/commands/*.rs` — one
//! struct per mode, parsed via `clap`'s derive API.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::executor::BuildStrategy;

#[derive(Parser, Debug)]
#[command(name = "plan-orchestrator", about = "Drives a resolved build plan to a relocatable install tree")]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,

    /// Root under which remote sources are fetched and build trees live.
    #[arg(long)]
    pub fetch_dir: PathBuf,

    /// Path baked into installed artifacts.
    #[arg(long, global = true)]
    pub prefix: Option<PathBuf>,

    /// Staging root under which files are actually written this run.
    /// Defaults to `<fetch_dir>/dest`.
    #[arg(long, global = true)]
    pub dest_dir: Option<PathBuf>,

    /// Bounded-parallel execution; omit `=N` for unbounded.
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "0", require_equals = true)]
    pub r#async: Option<usize>,

    /// Emit a portable shell script instead of running anything.
    #[arg(long, global = true)]
    pub script: Option<PathBuf>,

    #[arg(long, global = true, conflicts_with = "update")]
    pub new: bool,

    #[arg(long, global = true, conflicts_with = "new")]
    pub update: bool,

    /// Build mode only: skip fetch entirely (sources already present).
    #[arg(long, global = true)]
    pub prefetched: bool,

    /// Retain the scratch temp directory instead of deleting it on exit.
    #[arg(long, global = true)]
    pub keep_temp: bool,

    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[arg(long = "configure-arg", global = true)]
    pub configure_args: Vec<String>,

    #[arg(long = "register-arg", global = true)]
    pub register_args: Vec<String>,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "ghc")]
    pub compiler: String,

    #[arg(long, global = true, default_value = "ghc-pkg")]
    pub register_tool: String,

    #[arg(long, global = true, default_value = "cabal")]
    pub unpack_tool: String,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Compute a plan from seed requirements and write the blob to disk.
    Plan {
        /// Seed requirements file (JSON-encoded `UnitSpecs`).
        seeds: PathBuf,
        #[arg(long, default_value = "plan.json")]
        out: PathBuf,
    },
    /// Materialize sources named by a previously-captured plan blob.
    Fetch {
        plan_file: PathBuf,
    },
    /// End-to-end: fetch (unless `--prefetched`), build, install, register.
    Build {
        plan_file: PathBuf,
    },
}

impl Cli {
    /// Verbosity level (§6): silent, normal, verbose, debug — from
    /// `-q`/`-v` counts, the way `-v`/`-vv` stacks in cargo's own CLI.
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Silent
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Debug,
            }
        }
    }

    pub fn strategy(&self, config: &crate::config::Config) -> BuildStrategy {
        if let Some(path) = &self.script {
            return BuildStrategy::Script(path.clone());
        }
        if let Some(n) = self.r#async {
            return BuildStrategy::Async(n);
        }
        match config.strategy {
            Some(crate::config::StrategyConfig::Async) => BuildStrategy::Async(config.jobs.unwrap_or(0)),
            Some(crate::config::StrategyConfig::Script) => {
                BuildStrategy::Script(PathBuf::from("build.sh"))
            }
            _ => BuildStrategy::TopoSort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Maps to the `tracing`/`EnvFilter` directive this level corresponds
    /// to, used only when `RUST_LOG` is unset (§10.1: `RUST_LOG` always
    /// takes precedence when present).
    pub fn as_filter_directive(self) -> &'static str {
        match self {
            Verbosity::Silent => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Debug => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_without_value_means_unbounded() {
        let cli = Cli::parse_from(["plan-orchestrator", "--fetch-dir", "/tmp/f", "--async", "fetch", "/tmp/plan.json"]);
        assert_eq!(cli.r#async, Some(0));
    }

    #[test]
    fn async_with_value_parses_n() {
        let cli = Cli::parse_from([
            "plan-orchestrator",
            "--fetch-dir",
            "/tmp/f",
            "--async=4",
            "build",
            "/tmp/plan.json",
        ]);
        assert_eq!(cli.r#async, Some(4));
    }

    #[test]
    fn new_and_update_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "plan-orchestrator",
            "--fetch-dir",
            "/tmp/f",
            "--new",
            "--update",
            "build",
            "/tmp/plan.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_forces_silent_regardless_of_verbose_count() {
        let cli = Cli::parse_from([
            "plan-orchestrator",
            "--fetch-dir",
            "/tmp/f",
            "-q",
            "build",
            "/tmp/plan.json",
        ]);
        assert_eq!(cli.verbosity(), Verbosity::Silent);
    }
}
