//! `ProcessRunner` (§4.2): spawns external commands under a held
//! semaphore token, with PATH/env augmentation and nonzero-exit failure.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::semaphore::Semaphore;

/// The OS-appropriate `PATH` list separator: `;` on Windows-family
/// targets, `:` elsewhere.
#[cfg(windows)]
const PATH_SEP: &str = ";";
#[cfg(not(windows))]
const PATH_SEP: &str = ":";

#[derive(Debug, Clone)]
pub struct Cmd {
    pub prog: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Prepended to `PATH`, in order, before the inherited value.
    pub extra_path: Vec<PathBuf>,
    pub extra_env_vars: BTreeMap<String, String>,
}

impl Cmd {
    pub fn new(prog: impl Into<String>, cwd: impl Into<PathBuf>) -> Cmd {
        Cmd {
            prog: prog.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            extra_path: Vec::new(),
            extra_env_vars: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Cmd {
        self.args.push(a.into());
        self
    }

    pub fn args(mut self, a: impl IntoIterator<Item = String>) -> Cmd {
        self.args.extend(a);
        self
    }

    pub fn env(mut self, k: impl Into<String>, v: impl Into<String>) -> Cmd {
        self.extra_env_vars.insert(k.into(), v.into());
        self
    }

    pub fn path(mut self, p: impl Into<PathBuf>) -> Cmd {
        self.extra_path.push(p.into());
        self
    }

    fn shell_words(&self) -> String {
        std::iter::once(self.prog.clone())
            .chain(self.args.iter().cloned())
            .map(|w| shell_escape::escape(w.into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct ProcessRunner {
    sem: Semaphore,
}

impl ProcessRunner {
    pub fn new(sem: Semaphore) -> ProcessRunner {
        ProcessRunner { sem }
    }

    /// Runs `cmd` under the held semaphore token, failing on a nonzero
    /// exit status. Per the invariant in §4.2, if both `extra_path` and
    /// `extra_env_vars` are empty, the child's environment is left wholly
    /// untouched (no `env_clear`, no copy) rather than rebuilt identically.
    pub fn run(&self, cmd: &Cmd) -> Result<()> {
        self.sem.with_token(|| self.spawn_and_wait(cmd))
    }

    fn spawn_and_wait(&self, cmd: &Cmd) -> Result<()> {
        info!(prog = %cmd.prog, cwd = %cmd.cwd.display(), "{}", cmd.shell_words());

        let mut command = Command::new(&cmd.prog);
        command.args(&cmd.args).current_dir(&cmd.cwd);

        if !cmd.extra_path.is_empty() {
            let existing = env::var_os("PATH").unwrap_or_default();
            let mut joined = env::join_paths(cmd.extra_path.iter())
                .map_err(|e| OrchestratorError::ConfigInvalid(e.to_string()))?;
            if !existing.is_empty() {
                joined.push(PATH_SEP);
                joined.push(existing);
            }
            command.env("PATH", joined);
        }
        for (k, v) in &cmd.extra_env_vars {
            command.env(k, v);
        }

        let status = command
            .status()
            .map_err(|source| OrchestratorError::CommandSpawn {
                prog: cmd.prog.clone(),
                source,
            })?;

        debug!(status = ?status, "{} exited", cmd.prog);

        if !status.success() {
            return Err(OrchestratorError::CommandFailed {
                prog: cmd.prog.clone(),
                args: cmd.args.clone(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// Builds the `extra_path` prefix for a unit whose `puExeDepends` is
/// non-empty (resolves the Open Question, §10.6): the shared `installDir`'s
/// `bin` directory, since every exe-dependency in a run installs there.
pub fn exe_depends_path(install_bin_dir: &Path, has_exe_depends: bool) -> Vec<PathBuf> {
    if has_exe_depends {
        vec![install_bin_dir.to_path_buf()]
    } else {
        Vec::new()
    }
}
