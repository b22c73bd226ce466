//! `Fetcher` (§2, §6, §8 property 7): invokes the native tool's "unpack"
//! command to materialize each remote plan unit under the fetch root,
//! skipping directories already present — grounded on `ming2k-wright`'s
//! `Builder::fetch()` cache-hit/skip logic.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::plan::ConfiguredUnit;
use crate::process::{Cmd, ProcessRunner};
use crate::types::PkgSrc;

pub struct Fetcher<'a> {
    pub fetch_dir: &'a Path,
    pub unpack_tool: &'a str,
    pub runner: &'a ProcessRunner,
}

impl<'a> Fetcher<'a> {
    /// `Local` units are never fetched; `Remote` units land under
    /// `fetchDir/<pkgName>-<version>/`. If that directory already exists
    /// the unit is considered fetched and no unpack call is issued — the
    /// idempotence the property in §8 requires.
    pub fn unit_source_dir(&self, unit: &ConfiguredUnit) -> PathBuf {
        match &unit.pu_pkg_src {
            PkgSrc::Local { path } => path.clone(),
            PkgSrc::Remote => self
                .fetch_dir
                .join(format!("{}-{}", unit.pu_pkg_name, unit.pu_version)),
        }
    }

    /// Fetches every `Remote` unit in `units` that isn't already present.
    /// Returns the number of unpack calls actually issued, so callers
    /// (and tests asserting idempotence) can tell a no-op run from one
    /// that did work.
    pub fn fetch_all(&self, units: &[ConfiguredUnit]) -> Result<usize> {
        let mut issued = 0;
        for unit in units {
            if !matches!(unit.pu_pkg_src, PkgSrc::Remote) {
                continue;
            }
            let dir = self.unit_source_dir(unit);
            if dir.exists() {
                debug!(dir = %dir.display(), "already fetched, skipping unpack");
                continue;
            }
            info!(pkg = %unit.pu_pkg_name, version = %unit.pu_version, "fetching");
            let cmd = Cmd::new(self.unpack_tool, self.fetch_dir)
                .arg("get")
                .arg("--destdir")
                .arg(self.fetch_dir.display().to_string())
                .arg(format!("{}-{}", unit.pu_pkg_name, unit.pu_version));
            self.runner.run(&cmd)?;
            issued += 1;
        }
        Ok(issued)
    }
}

/// Fetch-directory lifecycle guard (§6, §7, S6): `--new` must not
/// pre-exist, `--update` must pre-exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirMode {
    New,
    Existing,
}

pub fn check_fetch_dir(mode: FetchDirMode, fetch_dir: &Path) -> Result<()> {
    match mode {
        FetchDirMode::New if fetch_dir.exists() => {
            Err(crate::error::OrchestratorError::FetchDirExists(fetch_dir.to_path_buf()))
        }
        FetchDirMode::Existing if !fetch_dir.exists() => {
            Err(crate::error::OrchestratorError::FetchDirMissing(fetch_dir.to_path_buf()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semaphore::Semaphore;
    use crate::types::{ComponentKind, ComponentName, FlagSpec, PkgName, UnitId, Version};

    fn remote_unit(pkg: &str, ver: &str) -> ConfiguredUnit {
        ConfiguredUnit {
            pu_id: UnitId::from(format!("{pkg}-{ver}-id")),
            pu_pkg_name: PkgName::from(pkg),
            pu_version: Version(semver::Version::parse(ver).unwrap()),
            pu_component_name: ComponentName {
                kind: ComponentKind::Lib,
                name: pkg.to_string(),
            },
            pu_pkg_src: PkgSrc::Remote,
            pu_setup_depends: vec![],
            pu_depends: vec![],
            pu_exe_depends: vec![],
            pu_flags: FlagSpec::new(),
        }
    }

    #[test]
    fn s6_new_fails_if_fetch_dir_exists() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_fetch_dir(FetchDirMode::New, dir.path()).unwrap_err();
        assert!(matches!(err, crate::error::OrchestratorError::FetchDirExists(_)));
    }

    #[test]
    fn s6_existing_fails_if_fetch_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = check_fetch_dir(FetchDirMode::Existing, &missing).unwrap_err();
        assert!(matches!(err, crate::error::OrchestratorError::FetchDirMissing(_)));
    }

    #[test]
    fn property7_second_fetch_issues_no_unpack_calls() {
        let fetch_dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Semaphore::none());
        let fetcher = Fetcher {
            fetch_dir: fetch_dir.path(),
            unpack_tool: "true", // any zero-exit program; should never actually run on 2nd pass
            runner: &runner,
        };
        let unit = remote_unit("foo", "1.0.0");
        // Pre-create the destination to simulate an already-fetched unit.
        std::fs::create_dir_all(fetcher.unit_source_dir(&unit)).unwrap();

        let issued = fetcher.fetch_all(&[unit]).unwrap();
        assert_eq!(issued, 0);
    }

    #[test]
    fn local_units_are_never_fetched() {
        let fetch_dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Semaphore::none());
        let fetcher = Fetcher {
            fetch_dir: fetch_dir.path(),
            unpack_tool: "true",
            runner: &runner,
        };
        let mut unit = remote_unit("foo", "1.0.0");
        unit.pu_pkg_src = PkgSrc::Local {
            path: PathBuf::from("/some/local/path"),
        };
        let issued = fetcher.fetch_all(&[unit]).unwrap();
        assert_eq!(issued, 0);
    }
}
