//! Configuration loaded from a TOML file.
//!
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```toml
//! learner_id = 1
//!
//! [session]
//! size = 15
//! mode = "sequential"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{DEFAULT_DUE_LIMIT, EngineOptions};
use crate::session::DisplayMode;
use crate::session::forward::DEFAULT_MAX_ATTEMPTS;

const APP_DIR: &str = "vocab-srs";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub resume_path: PathBuf,
    pub learner_id: i64,
    pub engine: EngineConfig,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            database_path: dir.join("reviews.sqlite3"),
            resume_path: dir.join("resume.json"),
            learner_id: 1,
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub due_limit: usize,
    pub enforce_ownership: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            due_limit: DEFAULT_DUE_LIMIT,
            enforce_ownership: options.enforce_ownership,
        }
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            enforce_ownership: self.enforce_ownership,
            due_limit: self.due_limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cards per sitting, 0 for the whole collection.
    pub size: usize,
    pub mode: DisplayMode,
    pub feedback_gate_ms: u64,
    pub max_delivery_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            size: 10,
            mode: DisplayMode::default(),
            feedback_gate_ms: 500,
            max_delivery_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    pub fn feedback_gate(&self) -> Duration {
        Duration::from_millis(self.feedback_gate_ms)
    }
}

impl Config {
    /// `~/.config/vocab-srs/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Reads the file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        log::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Loads the explicit path if given, else the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session.size, 10);
        assert_eq!(config.session.mode, DisplayMode::Random);
        assert_eq!(config.session.feedback_gate(), Duration::from_millis(500));
        assert!(config.engine.enforce_ownership);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
learner_id = 42
database_path = "/tmp/reviews.sqlite3"

[session]
size = 0
mode = "sequential"

[engine]
enforce_ownership = false
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.learner_id, 42);
        assert_eq!(config.database_path, PathBuf::from("/tmp/reviews.sqlite3"));
        assert_eq!(config.session.size, 0);
        assert_eq!(config.session.mode, DisplayMode::Sequential);
        assert_eq!(config.session.feedback_gate_ms, 500);
        assert!(!config.engine.options().enforce_ownership);
        assert_eq!(config.engine.options().due_limit, DEFAULT_DUE_LIMIT);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "learner_id = \"not a number\"").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
