//! Config file handling.
//!
//! Precedence: command line, then environment (handled by clap), then the
//! config file, then built-in defaults.

use driverlab_client::{ConfigError, SessionConfig};
use driverlab_core::{EndpointError, RunMode, normalize_base};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cli::Cli;

pub const DEFAULT_SERVER: &str = "ws://127.0.0.1:6200";

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_FILE: &str = "driverlab.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Server base URL.
    pub server: String,
    pub run_mode: RunMode,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            run_mode: RunMode::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load `path`, or `./driverlab.toml` if it exists, or the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, LoadError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_FILE).exists() => Self::load(Path::new(DEFAULT_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line and environment overrides.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(server) = &cli.server {
            self.server = server.clone();
        }
        if let Some(mode) = cli.mode {
            self.run_mode = mode;
        }
        self
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let url = Url::parse(&self.server).map_err(EndpointError::from)?;
        normalize_base(&url)?;
        self.session.validate()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid server: {0}")]
    Server(#[from] EndpointError),
    #[error("invalid session settings: {0}")]
    Session(#[from] ConfigError),
}
