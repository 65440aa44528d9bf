//! qwire configuration
//!
//! Read from `qwire.toml` in the working directory, falling back to
//! `<config dir>/qwire/config.toml`.
//!
//! ```toml
//! [codec]
//! protocol_version = 3
//! single_char_strings = "as_char_atom"
//! message_type = "async"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{CharStringPolicy, EncodeOptions, MessageType};

/// Project-local config file name.
pub const CONFIG_FILE: &str = "qwire.toml";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Encoder defaults
    #[serde(default)]
    pub codec: EncodeOptions,
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a specific file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// First config file that exists, if any.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("qwire").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Load the discovered file, or defaults when there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::discover() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn protocol_version(mut self, version: u8) -> Self {
        self.config.codec.protocol_version = version;
        self
    }

    pub fn single_char_strings(mut self, policy: CharStringPolicy) -> Self {
        self.config.codec.single_char_strings = policy;
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.config.codec.message_type = message_type;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}
