//! `PkgDbManager` (§4.7): the two-stage package database protocol — a
//! "temp" database rooted in the fetch tree, and a "final" database
//! rooted under the install prefix, with registration files staged
//! between them as packages complete.
//!
//! This is a directory of registration files (one per `UnitId`), the way
//! `ghc-pkg`'s `package.conf.d` works — not a SQL database. A prior
//! candidate design reused `ming2k-wright`'s SQLite-backed package store,
//! but that store indexes a resolver's own metadata, a different kind of
//! "package database" than the one this spec describes.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, ResultExt};
use crate::tempdir::remove_dir_all_best_effort;
use crate::types::{PkgName, Version};

#[derive(Debug, Clone)]
pub struct PkgDbDirs {
    pub temp_pkg_db_dir: PathBuf,
    pub final_pkg_db_dir: PathBuf,
}

pub struct PkgDbManager;

impl PkgDbManager {
    /// Computes `tempPkgDbDir = fetchDir/package.conf` and
    /// `finalPkgDbDir = installDir/package.conf`. If `tempPkgDbDir`
    /// already exists it is removed recursively first (swallowing removal
    /// errors, per §7 — a subsequent create either succeeds or surfaces a
    /// clearer error of its own). Both directories are created empty.
    pub fn prepare(fetch_dir: &Path, install_dir: &Path) -> Result<PkgDbDirs> {
        let temp_pkg_db_dir = fetch_dir.join("package.conf");
        let final_pkg_db_dir = install_dir.join("package.conf");

        if temp_pkg_db_dir.exists() {
            remove_dir_all_best_effort(&temp_pkg_db_dir);
        }
        std::fs::create_dir_all(&temp_pkg_db_dir).with_io_context(&temp_pkg_db_dir)?;
        std::fs::create_dir_all(&final_pkg_db_dir).with_io_context(&final_pkg_db_dir)?;

        info!(
            temp = %temp_pkg_db_dir.display(),
            final_dir = %final_pkg_db_dir.display(),
            "prepared package databases"
        );

        Ok(PkgDbDirs {
            temp_pkg_db_dir,
            final_pkg_db_dir,
        })
    }

    /// Registration-file name for a unit: distinct per `UnitId`, so
    /// concurrent writes into `tempPkgDbDir` by sibling units never
    /// collide (§5).
    pub fn registration_file_name(pkg_name: &PkgName, version: &Version, unit_id: &crate::types::UnitId) -> String {
        format!("{pkg_name}-{version}-{unit_id}.conf")
    }

    /// Moves every registration file belonging to `pkg_name`/`version`
    /// from `tempPkgDbDir` into `finalPkgDbDir`. Called once per package,
    /// after that package's last unit has completed its register step —
    /// the engine's scheduling (not this method) is what keeps this
    /// per-package-serial.
    pub fn stage_registration(dirs: &PkgDbDirs, pkg_name: &PkgName, version: &Version) -> Result<()> {
        let prefix = format!("{pkg_name}-{version}-");
        let entries = std::fs::read_dir(&dirs.temp_pkg_db_dir)
            .with_io_context(&dirs.temp_pkg_db_dir)?;

        for entry in entries {
            let entry = entry.with_io_context(&dirs.temp_pkg_db_dir)?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if !name.starts_with(&prefix) {
                continue;
            }
            let dest = dirs.final_pkg_db_dir.join(file_name.clone());
            std::fs::rename(entry.path(), &dest).with_io_context(&dest)?;
            debug!(file = %name, "staged registration into final package database");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_recreates_stale_temp_db() {
        let fetch = tempfile::tempdir().unwrap();
        let install = tempfile::tempdir().unwrap();
        let stale = fetch.path().join("package.conf");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("leftover.conf"), b"x").unwrap();

        let dirs = PkgDbManager::prepare(fetch.path(), install.path()).unwrap();
        assert!(dirs.temp_pkg_db_dir.exists());
        assert!(!dirs.temp_pkg_db_dir.join("leftover.conf").exists());
        assert!(dirs.final_pkg_db_dir.exists());
    }

    #[test]
    fn stage_registration_moves_only_matching_package() {
        let fetch = tempfile::tempdir().unwrap();
        let install = tempfile::tempdir().unwrap();
        let dirs = PkgDbManager::prepare(fetch.path(), install.path()).unwrap();

        std::fs::write(dirs.temp_pkg_db_dir.join("foo-1.0.0-abc.conf"), b"foo").unwrap();
        std::fs::write(dirs.temp_pkg_db_dir.join("bar-2.0.0-def.conf"), b"bar").unwrap();

        let pkg = PkgName::from("foo");
        let ver = Version(semver::Version::parse("1.0.0").unwrap());
        PkgDbManager::stage_registration(&dirs, &pkg, &ver).unwrap();

        assert!(dirs.final_pkg_db_dir.join("foo-1.0.0-abc.conf").exists());
        assert!(!dirs.temp_pkg_db_dir.join("foo-1.0.0-abc.conf").exists());
        assert!(dirs.temp_pkg_db_dir.join("bar-2.0.0-def.conf").exists());
        assert!(!dirs.final_pkg_db_dir.join("bar-2.0.0-def.conf").exists());
    }
}
