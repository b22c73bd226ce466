//! `UnitCompiler` (§4.6): assembles the configure/build/copy/register
//! command sequence for a single unit, and the one-off Setup-driver build
//! for whichever unit owns its package's setup phase.
//!
//! Grounded in `custom_build.rs`'s `prepare`/`build_work`: a fixed
//! sequence of `Command`s built up by chaining `.arg()`/`.env()` calls
//! against a per-unit context, then handed to either a real runner or
//! (here) a `ScriptBuffer`.

use std::path::{Path, PathBuf};

use crate::pkgdb::{PkgDbDirs, PkgDbManager};
use crate::plan::ConfiguredUnit;
use crate::process::{exe_depends_path, Cmd};
use crate::script::ScriptBuffer;
use crate::types::UnitId;

/// Three argument lists supplied by the caller per unit; the engine treats
/// every entry as an opaque string and appends it verbatim (§3).
#[derive(Debug, Clone, Default)]
pub struct UnitArgs {
    pub configure_args: Vec<String>,
    pub build_args: Vec<String>,
    pub register_args: Vec<String>,
}

/// Dynamic per-unit argument injection (§9 design note): modeled as a
/// single-method interface rather than a bare function pointer, so a
/// caller can close over whatever per-run state it needs (a CLI's parsed
/// pass-through argument lists, a config file, ...).
pub trait UnitArgsProvider: Send + Sync {
    fn args_for(&self, unit: &ConfiguredUnit) -> UnitArgs;
}

impl<F> UnitArgsProvider for F
where
    F: Fn(&ConfiguredUnit) -> UnitArgs + Send + Sync,
{
    fn args_for(&self, unit: &ConfiguredUnit) -> UnitArgs {
        self(unit)
    }
}

/// Where a unit's sources live and where its build tree is rooted — the
/// caller resolves `PkgSrc::Local`/`Remote` into a concrete directory
/// before handing it to the compiler (`Fetcher`'s job, not this one's).
pub struct UnitPaths {
    pub source_dir: PathBuf,
    pub dist_dir: PathBuf,
}

impl UnitPaths {
    pub fn setup_binary(&self) -> PathBuf {
        self.dist_dir.join("setup").join("Setup")
    }
}

pub struct UnitCompiler<'a> {
    pub prefix: &'a Path,
    pub dest_dir: &'a Path,
    pub install_dir: &'a Path,
    pub pkg_db: &'a PkgDbDirs,
    pub compiler_prog: &'a str,
    pub register_tool: &'a str,
}

/// Where to send an assembled command: a live `ProcessRunner` (direct
/// mode) or a `ScriptBuffer` (script mode). A single small trait keeps
/// `UnitCompiler` itself oblivious to which mode it's running under,
/// mirroring how `Executor`'s two non-`Script` strategies share one
/// compiling path.
pub trait CommandSink {
    fn run(&mut self, cmd: &Cmd) -> crate::error::Result<()>;
}

pub struct RunnerSink<'a>(pub &'a crate::process::ProcessRunner);
impl<'a> CommandSink for RunnerSink<'a> {
    fn run(&mut self, cmd: &Cmd) -> crate::error::Result<()> {
        self.0.run(cmd)
    }
}

pub struct BufferSink<'a>(pub &'a mut ScriptBuffer);
impl<'a> CommandSink for BufferSink<'a> {
    fn run(&mut self, cmd: &Cmd) -> crate::error::Result<()> {
        self.0.push_command(cmd);
        Ok(())
    }
}

impl<'a> UnitCompiler<'a> {
    /// Builds the package's `Setup` driver from `Setup.hs`/`Setup.lhs` in
    /// the unit's source directory. Only invoked once per package, for
    /// the owner unit.
    pub fn compile_setup(
        &self,
        owner: &ConfiguredUnit,
        paths: &UnitPaths,
        sink: &mut impl CommandSink,
    ) -> crate::error::Result<()> {
        let setup_src = if paths.source_dir.join("Setup.hs").exists() {
            paths.source_dir.join("Setup.hs")
        } else {
            paths.source_dir.join("Setup.lhs")
        };

        let mut cmd = Cmd::new(self.compiler_prog, &paths.source_dir)
            .arg(setup_src.display().to_string())
            .arg("-o")
            .arg(paths.setup_binary().display().to_string())
            .arg(format!("--package-db={}", self.pkg_db.temp_pkg_db_dir.display()));

        for dep in &owner.pu_setup_depends {
            cmd = cmd.arg(format!("-package-id={dep}"));
        }

        sink.run(&cmd)
    }

    /// The configure/build/copy/(register) sequence for a single unit.
    /// For library-bearing components, also performs the register step
    /// into the temp database (step 4 of §4.6); final staging into the
    /// authoritative database is a separate call the executor makes once
    /// a whole package is done (`PkgDbManager::stage_registration`).
    pub fn compile_unit(
        &self,
        unit: &ConfiguredUnit,
        paths: &UnitPaths,
        plan_components: &dyn Fn(&UnitId) -> Option<crate::types::ComponentName>,
        args: &UnitArgs,
        sink: &mut impl CommandSink,
    ) -> crate::error::Result<()> {
        let extra_path = exe_depends_path(&self.install_dir.join("bin"), !unit.pu_exe_depends.is_empty());

        let configure = self.configure_cmd(unit, paths, plan_components, args, &extra_path);
        sink.run(&configure)?;

        let build = Cmd::new(paths.setup_binary().display().to_string(), &paths.source_dir)
            .arg("build")
            .args(args.build_args.iter().cloned())
            .extend_path(&extra_path);
        sink.run(&build)?;

        let copy = Cmd::new(paths.setup_binary().display().to_string(), &paths.source_dir)
            .arg("copy")
            .arg(format!("--destdir={}", self.dest_dir.display()));
        sink.run(&copy)?;

        if unit.pu_component_name.kind.is_library_bearing() {
            self.register(unit, paths, args, sink)?;
        }
        Ok(())
    }

    fn configure_cmd(
        &self,
        unit: &ConfiguredUnit,
        paths: &UnitPaths,
        plan_components: &dyn Fn(&UnitId) -> Option<crate::types::ComponentName>,
        args: &UnitArgs,
        extra_path: &[PathBuf],
    ) -> Cmd {
        let mut cmd = Cmd::new(paths.setup_binary().display().to_string(), &paths.source_dir)
            .arg("configure")
            .arg(format!("--prefix={}", self.prefix.display()))
            .arg(format!("--cid={}", unit.pu_id))
            .arg(format!("--package-db={}", self.pkg_db.temp_pkg_db_dir.display()))
            .arg(format!("--{}={}", unit.pu_component_name.kind.as_flag(), unit.pu_component_name.name));

        for dep in unit.pu_depends.iter().chain(unit.pu_exe_depends.iter()) {
            if let Some(component) = plan_components(dep) {
                cmd = cmd.arg(format!("--dependency={component}={dep}"));
            }
        }

        for (flag, value) in &unit.pu_flags {
            let sign = match value {
                crate::types::FlagValue::On => "+",
                crate::types::FlagValue::Off => "-",
            };
            cmd = cmd.arg(format!("{sign}{flag}"));
        }

        cmd = cmd.args(args.configure_args.iter().cloned());
        for p in extra_path {
            cmd = cmd.path(p.clone());
        }
        cmd
    }

    fn register(
        &self,
        unit: &ConfiguredUnit,
        paths: &UnitPaths,
        args: &UnitArgs,
        sink: &mut impl CommandSink,
    ) -> crate::error::Result<()> {
        let gen_pkg_config = paths
            .dist_dir
            .join(format!("{}.conf", PkgDbManager::registration_file_name(&unit.pu_pkg_name, &unit.pu_version, &unit.pu_id)));

        let gen = Cmd::new(paths.setup_binary().display().to_string(), &paths.source_dir)
            .arg("register")
            .arg(format!("--gen-pkg-config={}", gen_pkg_config.display()));
        sink.run(&gen)?;

        let dest = self
            .pkg_db
            .temp_pkg_db_dir
            .join(PkgDbManager::registration_file_name(&unit.pu_pkg_name, &unit.pu_version, &unit.pu_id));
        let register = Cmd::new(self.register_tool, &paths.source_dir)
            .arg("register")
            .arg(format!("--package-db={}", self.pkg_db.temp_pkg_db_dir.display()))
            .arg(gen_pkg_config.display().to_string())
            .arg(format!("--output={}", dest.display()))
            .args(args.register_args.iter().cloned());
        sink.run(&register)
    }
}

impl Cmd {
    /// `Cmd::path` appends one entry at a time; this folds a whole slice
    /// in, used where `extra_path` is computed once up front (e.g. the
    /// exe-depends PATH injection) rather than built incrementally.
    fn extend_path(mut self, extra: &[PathBuf]) -> Cmd {
        for p in extra {
            self.extra_path.push(p.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ComponentKind, ComponentName, FlagSpec, FlagValue, PkgName, PkgSrc, Version};

    fn make_unit() -> ConfiguredUnit {
        ConfiguredUnit {
            pu_id: UnitId::from("foo-1.0-abc"),
            pu_pkg_name: PkgName::from("foo"),
            pu_version: Version(semver::Version::parse("1.0.0").unwrap()),
            pu_component_name: ComponentName {
                kind: ComponentKind::Lib,
                name: "foo".into(),
            },
            pu_pkg_src: PkgSrc::Remote,
            pu_setup_depends: vec![],
            pu_depends: vec![],
            pu_exe_depends: vec![],
            pu_flags: {
                let mut f = FlagSpec::new();
                f.insert("threaded".into(), FlagValue::On);
                f
            },
        }
    }

    fn dirs(tmp: &Path) -> (PkgDbDirs, PathBuf, PathBuf, PathBuf) {
        let fetch = tmp.join("fetch");
        let install = tmp.join("install");
        let dest = tmp.join("dest");
        std::fs::create_dir_all(&fetch).unwrap();
        std::fs::create_dir_all(&install).unwrap();
        let pkg_db = PkgDbManager::prepare(&fetch, &install).unwrap();
        (pkg_db, fetch, install, dest)
    }

    #[test]
    fn configure_command_includes_prefix_cid_and_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let (pkg_db, _fetch, install, dest) = dirs(tmp.path());
        let prefix = PathBuf::from("/usr/local");
        let compiler = UnitCompiler {
            prefix: &prefix,
            dest_dir: &dest,
            install_dir: &install,
            pkg_db: &pkg_db,
            compiler_prog: "ghc",
            register_tool: "ghc-pkg",
        };
        let unit = make_unit();
        let paths = UnitPaths {
            source_dir: tmp.path().join("src"),
            dist_dir: tmp.path().join("dist"),
        };
        let args = UnitArgs::default();
        let cmd = compiler.configure_cmd(&unit, &paths, &|_| None, &args, &[]);
        assert!(cmd.args.contains(&"--prefix=/usr/local".to_string()));
        assert!(cmd.args.contains(&"--cid=foo-1.0-abc".to_string()));
        assert!(cmd.args.contains(&"+threaded".to_string()));
        assert!(cmd.args.iter().any(|a| a == "--lib=foo"));
    }

    #[test]
    fn exe_dependency_unit_gets_path_augmented() {
        let mut unit = make_unit();
        unit.pu_exe_depends.push(UnitId::from("happy-1.0-xyz"));
        let install_bin = PathBuf::from("/opt/install/bin");
        let extra_path = exe_depends_path(&install_bin, !unit.pu_exe_depends.is_empty());
        assert_eq!(extra_path, vec![install_bin]);
    }

    #[test]
    fn buffer_sink_records_commands_without_running_them() {
        let mut buf = ScriptBuffer::new();
        let mut sink = BufferSink(&mut buf);
        let cmd = Cmd::new("echo", "/tmp").arg("hi");
        sink.run(&cmd).unwrap();
        assert!(buf.render().contains("echo"));
    }
}
