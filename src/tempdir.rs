//! `TempDir` (§4.3): scoped creation of a working directory, with optional
//! retention on exit.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{OrchestratorError, Result, ResultExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    Delete,
    Keep,
}

/// A directory that is recursively removed on drop under `Delete`, or left
/// in place under `Keep`. Mirrors `tempfile::TempDir`'s RAII shape but adds
/// the spec's `Keep` branch, which `tempfile::TempDir` alone can't express
/// (it always removes on drop; `Keep` is modeled by leaking it).
pub enum TempDir {
    Owned(tempfile::TempDir),
    Kept(PathBuf),
}

impl TempDir {
    pub fn path(&self) -> &Path {
        match self {
            TempDir::Owned(t) => t.path(),
            TempDir::Kept(p) => p,
        }
    }
}

/// Creates a fresh directory with the given prefix and invokes `body` with
/// its path. Under `Delete`, the directory is removed on every exit path —
/// including when `body` returns an error, since `TempDir::Owned`'s
/// destructor runs regardless. Under `Keep`, it is created under the
/// system temp root and left in place, logged at the level §10.1 promotes
/// this event to (`INFO`, not the distilled spec's "verbose").
pub fn with_temp_dir<T>(
    policy: RetentionPolicy,
    prefix: &str,
    body: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| OrchestratorError::io(std::env::temp_dir(), e))?;

    match policy {
        RetentionPolicy::Delete => {
            let path = dir.path().to_path_buf();
            let result = body(&path);
            // `dir` drops here regardless of `result`, removing the tree.
            result
        }
        RetentionPolicy::Keep => {
            let path = dir.into_path();
            info!(path = %path.display(), "retaining temp directory");
            body(&path)
        }
    }
}

/// Recursively removes `path`, swallowing removal errors — used by
/// `PkgDbManager::prepare` to clear a stale temp package database (§4.7,
/// §7: "removal errors are swallowed, since a subsequent create will
/// either succeed or surface a clearer error").
pub fn remove_dir_all_best_effort(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_io_context(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_policy_removes_directory_after_body() {
        let mut captured = None;
        with_temp_dir(RetentionPolicy::Delete, "orch-test-", |p| {
            captured = Some(p.to_path_buf());
            assert!(p.exists());
            Ok(())
        })
        .unwrap();
        assert!(!captured.unwrap().exists());
    }

    #[test]
    fn delete_policy_removes_directory_even_on_error() {
        let mut captured = None;
        let result: Result<()> = with_temp_dir(RetentionPolicy::Delete, "orch-test-", |p| {
            captured = Some(p.to_path_buf());
            Err(OrchestratorError::ConfigInvalid("boom".into()))
        });
        assert!(result.is_err());
        assert!(!captured.unwrap().exists());
    }

    #[test]
    fn keep_policy_leaves_directory_in_place() {
        let mut captured = None;
        with_temp_dir(RetentionPolicy::Keep, "orch-test-", |p| {
            captured = Some(p.to_path_buf());
            Ok(())
        })
        .unwrap();
        let path = captured.unwrap();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }
}
