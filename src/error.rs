use std::path::PathBuf;

use crate::types::UnitId;

/// Crate-wide result alias; every fallible engine operation returns this.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// The engine's closed error taxonomy.
///
/// Each variant's `Display` is the user-visible diagnostic line: it names
/// the failing component and, where applicable, the exact command that
/// failed, with arguments joined for copy-paste reproduction.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("command failed with exit code {code}: {prog} {}", shell_escape::escape(args.join(" ").into()))]
    CommandFailed {
        prog: String,
        args: Vec<String>,
        code: i32,
    },

    #[error("command `{prog}` could not be executed: {source}")]
    CommandSpawn {
        prog: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan dependency graph is cyclic (detected while visiting {unit})")]
    PlanCyclic { unit: UnitId },

    #[error("dependency {dep} of unit {unit} is not present in the plan")]
    DanglingDep { unit: UnitId, dep: UnitId },

    #[error("fetch directory {0} already exists (requested a new fetch)")]
    FetchDirExists(PathBuf),

    #[error("fetch directory {0} does not exist (requested an update of an existing fetch)")]
    FetchDirMissing(PathBuf),

    #[error("I/O failure at {path}: {source}")]
    IOFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan blob: {0}")]
    PlanParse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl OrchestratorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OrchestratorError::IOFailure {
            path: path.into(),
            source,
        }
    }
}

/// Mirrors `ming2k-wright`'s `WrightResultExt`: attach a path/context to an
/// `io::Error` as it crosses into engine code.
pub trait ResultExt<T> {
    fn with_io_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_io_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| OrchestratorError::io(path, e))
    }
}

/// Exit code contract from SPEC_FULL.md §6/§10.2: zero on success, nonzero
/// (uniformly 1 here — the engine does not distinguish failure kinds at the
/// process boundary beyond the printed diagnostic) otherwise.
pub fn exit_code(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Renders an error the way `main` prints it to stderr: the top-level
/// diagnostic followed by its `#[source]` chain, one cause per line.
pub fn render_chain(err: &OrchestratorError) -> String {
    let mut out = err.to_string();
    let mut cause: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(c) = cause {
        out.push_str("\ncaused by: ");
        out.push_str(&c.to_string());
        cause = c.source();
    }
    out
}
