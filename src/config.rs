//! `fev.toml` settings for the command-line evaluator.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::playground::DEFAULT_QUERY_LIMIT;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fev.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playground: PlaygroundSettings,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaygroundSettings {
    /// Maximum environments × features × contexts per advanced query
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Environment used when a features file is given without `env=`
    #[serde(default = "default_environment")]
    pub default_environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Config {
    /// Load `path`, or `fev.toml` from the working directory when it exists.
    /// An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_path(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

impl Default for PlaygroundSettings {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            default_environment: default_environment(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

fn default_environment() -> String {
    "default".to_string()
}

fn default_filter() -> String {
    "warn".to_string()
}
