//! `ScriptBuffer` (§2, §4.8 `Script` strategy): accumulates a sequence of
//! command invocations and env mutations as a portable shell script.

use std::path::Path;

use crate::error::{OrchestratorError, Result, ResultExt};
use crate::process::Cmd;
use crate::types::{PkgName, Version};

#[derive(Default)]
pub struct ScriptBuffer {
    lines: Vec<String>,
}

impl ScriptBuffer {
    pub fn new() -> ScriptBuffer {
        ScriptBuffer::default()
    }

    /// Emits a `cd`, any env exports, and the escaped command line. Each
    /// invocation is self-contained (it re-`cd`s rather than relying on a
    /// preceding line's directory change), so reordering or dropping a
    /// block never desynchronizes the script's working directory.
    pub fn push_command(&mut self, cmd: &Cmd) {
        let mut line = String::new();
        line.push_str(&format!("cd {} &&\n", shell_escape::escape(cmd.cwd.display().to_string().into())));

        if !cmd.extra_path.is_empty() {
            let joined = cmd
                .extra_path
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(":");
            line.push_str(&format!(
                "PATH={}:\"$PATH\" \\\n",
                shell_escape::escape(joined.into())
            ));
        }
        for (k, v) in &cmd.extra_env_vars {
            line.push_str(&format!("{}={} \\\n", k, shell_escape::escape(v.clone().into())));
        }

        let words = std::iter::once(cmd.prog.clone())
            .chain(cmd.args.iter().cloned())
            .map(|w| shell_escape::escape(w.into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        line.push_str(&words);
        self.lines.push(line);
    }

    /// A blank-line-separated marker grouping a unit's setup and/or build
    /// blocks, so a reader of the emitted script (or a test asserting
    /// block boundaries, per S5) can tell units apart.
    pub fn push_comment(&mut self, text: &str) {
        self.lines.push(format!("# {text}"));
    }

    /// Shell equivalent of `PkgDbManager::stage_registration` (§4.7): moves
    /// every registration file for `pkg_name`/`version` out of the temp
    /// package database and into the final one. The directory arguments are
    /// shell-escaped as whole words; the `pkg-version-*` glob is left
    /// unescaped so the script's own shell expands it. A package with no
    /// library component has no matching files, so the trailing `|| true`
    /// keeps that case from tripping the script's `set -e`.
    pub fn push_stage_package(&mut self, temp_pkg_db_dir: &Path, final_pkg_db_dir: &Path, pkg_name: &PkgName, version: &Version) {
        let src = shell_escape::escape(temp_pkg_db_dir.display().to_string().into());
        let dest = shell_escape::escape(final_pkg_db_dir.display().to_string().into());
        self.lines.push(format!(
            "mv {src}/{pkg_name}-{version}-* {dest}/ 2>/dev/null || true"
        ));
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/sh\nset -e\n\n");
        out.push_str(&self.lines.join("\n\n"));
        out.push('\n');
        out
    }

    /// Appends the buffer's rendered text to the file at `path`, creating
    /// it (and its parent directories) if necessary.
    pub fn append_to_file(&self, path: &Path) -> Result<()> {
        use std::fs::OpenOptions;
        use std::io::Write;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_io_context(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OrchestratorError::io(path, e))?;
        file.write_all(self.render().as_bytes())
            .map_err(|e| OrchestratorError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_shebang_and_set_e() {
        let buf = ScriptBuffer::new();
        let rendered = buf.render();
        assert!(rendered.starts_with("#!/bin/sh\nset -e\n"));
    }

    #[test]
    fn command_lines_are_shell_escaped() {
        let mut buf = ScriptBuffer::new();
        let cmd = Cmd::new("Setup", "/tmp/pkg dir").arg("configure").arg("--prefix=/usr local");
        buf.push_command(&cmd);
        let rendered = buf.render();
        assert!(rendered.contains("Setup"));
        assert!(rendered.contains("configure"));
        // Paths containing spaces must be quoted/escaped, not emitted raw.
        assert!(!rendered.contains("cd /tmp/pkg dir"));
    }

    #[test]
    fn stage_package_emits_a_guarded_mv_glob() {
        let mut buf = ScriptBuffer::new();
        let pkg = PkgName::from("foo");
        let version = Version(semver::Version::parse("1.0.0").unwrap());
        buf.push_stage_package(Path::new("/tmp/fetch/package.conf"), Path::new("/opt/foo/package.conf"), &pkg, &version);
        let rendered = buf.render();
        assert!(rendered.contains("mv"));
        assert!(rendered.contains("foo-1.0.0-*"));
        assert!(rendered.contains("|| true"));
    }

    #[test]
    fn append_to_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.sh");
        let mut buf = ScriptBuffer::new();
        buf.push_comment("hello");
        buf.append_to_file(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# hello"));
    }

    #[test]
    fn append_to_file_appends_not_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sh");
        let mut a = ScriptBuffer::new();
        a.push_comment("first");
        a.append_to_file(&path).unwrap();
        let mut b = ScriptBuffer::new();
        b.push_comment("second");
        b.append_to_file(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }
}
