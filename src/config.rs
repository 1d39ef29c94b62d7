//! Configuration file handling.
//!
//! The reader is configured from a TOML file:
//!
//! ```toml
//! initial_feed = 0
//! fetch_timeout_secs = 20
//!
//! [[feeds]]
//! name = "Udacity Blog"
//! url = "http://blog.udacity.com/feed"
//! ```
//!
//! Every key is optional; a missing file means "use the defaults".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::LoaderSettings;
use crate::registry::{FeedDescriptor, FeedRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid feed list: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index of the feed loaded at startup.
    pub initial_feed: usize,
    /// Upper bound for a single feed retrieval, in seconds.
    pub fetch_timeout_secs: u64,
    pub feeds: Vec<FeedDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_feed: 0,
            fetch_timeout_secs: 20,
            feeds: default_feeds(),
        }
    }
}

fn default_feeds() -> Vec<FeedDescriptor> {
    vec![
        FeedDescriptor::new("Udacity Blog", "http://blog.udacity.com/feed"),
        FeedDescriptor::new("CSS Tricks", "http://feeds.feedburner.com/CssTricks"),
        FeedDescriptor::new("HTML5 Rocks", "http://feeds.feedburner.com/html5rocks"),
        FeedDescriptor::new(
            "Linear Digressions",
            "http://feeds.feedburner.com/udacity-linear-digressions",
        ),
    ]
}

impl Config {
    /// `<config dir>/feedreader/config.toml`, or `./feedreader/config.toml`
    /// when the platform has no config directory.
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("feedreader").join("config.toml")
    }

    /// Load from `path`, or from [`Config::default_path`] when `None`.
    ///
    /// An explicitly given path must exist.  A missing default file yields
    /// [`Config::default()`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { source, .. } => ConfigError::ParseError { path, source },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - the feed list forms a valid registry
    /// - `initial_feed` names one of the feeds
    /// - the fetch timeout is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = FeedRegistry::new(self.feeds.clone())?;

        if let Err(RegistryError::OutOfRange { index, len }) = registry.get(self.initial_feed) {
            return Err(ConfigError::ValidationError {
                message: format!("initial_feed {index} is out of range ({len} feeds configured)"),
            });
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "fetch_timeout_secs must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Build the registry.  Fails on an empty or malformed feed list.
    pub fn registry(&self) -> Result<FeedRegistry, ConfigError> {
        Ok(FeedRegistry::new(self.feeds.clone())?)
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}
