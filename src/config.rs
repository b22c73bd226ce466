//! Project-level configuration (§10.3): an optional `orchestrator.toml`
//! supplying defaults for flags that are tedious to repeat on every
//! invocation. Precedence, highest first: CLI flag > config file > built-in
//! default.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub strategy: Option<StrategyConfig>,
    pub jobs: Option<usize>,
    pub fetch_dir: Option<PathBuf>,
    pub extra_path: Vec<PathBuf>,
    pub configure_args: Vec<String>,
    pub register_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyConfig {
    Async,
    Toposort,
    Script,
}

impl Config {
    pub fn empty() -> Config {
        Config::default()
    }

    /// Loads `orchestrator.toml` at `path` if present; a missing file is
    /// not an error (the engine falls back to built-in defaults), but a
    /// present-and-malformed one is a `ConfigInvalid` error naming the
    /// file and the parse failure — unknown keys count as malformed,
    /// since `deny_unknown_fields` rejects typos rather than silently
    /// ignoring them.
    pub fn load(path: &Path) -> Result<Config> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| OrchestratorError::ConfigInvalid(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::empty()),
            Err(e) => Err(OrchestratorError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("orchestrator.toml")).unwrap();
        assert!(cfg.jobs.is_none());
    }

    #[test]
    fn parses_known_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(
            &path,
            r#"
            jobs = 4
            strategy = "async"
            configure_args = ["--enable-tests"]
            "#,
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.jobs, Some(4));
        assert_eq!(cfg.strategy, Some(StrategyConfig::Async));
        assert_eq!(cfg.configure_args, vec!["--enable-tests".to_string()]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(&path, "bogus_key = 1\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigInvalid(_)));
    }
}
