
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Everything read from `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Directory the file was loaded from; relative paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub embeddings_dir: Option<PathBuf>,
    /// Result count used when a caller does not pass one
    pub default_limit: usize,
    pub score_threshold: f32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            embeddings_dir: None,
            default_limit: 10,
            score_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: String::from("http"),
            host: String::from("localhost"),
            port: 11434,
            model: String::from("nomic-embed-text:latest"),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite database holding the `courses` table
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No home or data directory to keep the configuration in")]
    NoConfigDirectory,
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("Ollama address {0} is not a valid URL")]
    InvalidUrl(String),
    #[error("Could not access configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),
}

impl ConfigError {
    fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }

    /// Name of the offending setting, for range errors
    #[inline]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl Config {
    /// `~/.course-vectors`, or the platform data directory without a home
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".course-vectors"))
            .or_else(|| dirs::data_dir().map(|data| data.join("course-vectors")))
            .ok_or(ConfigError::NoConfigDirectory)
    }

    /// Read `config.toml` from `config_dir`; a missing file yields defaults
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> anyhow::Result<Self> {
        let base_dir = config_dir.as_ref().to_path_buf();
        let path = base_dir.join(CONFIG_FILE_NAME);

        let mut config = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str::<Self>(&text)
                .map_err(ConfigError::from)
                .with_context(|| format!("Could not parse {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(ConfigError::from(e))
                    .with_context(|| format!("Could not read {}", path.display()));
            }
        };
        config.base_dir = base_dir;

        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config)
    }

    #[inline]
    pub fn load_default() -> anyhow::Result<Self> {
        Self::load(Self::config_dir()?)
    }

    /// Validate, then replace `config.toml` in one step
    #[inline]
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate().context("Refusing to save invalid settings")?;

        fs::create_dir_all(&self.base_dir)
            .map_err(ConfigError::from)
            .with_context(|| format!("Could not create {}", self.base_dir.display()))?;

        let text = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        let path = self.config_file_path();
        let mut temp = NamedTempFile::new_in(&self.base_dir).map_err(ConfigError::from)?;
        temp.write_all(text.as_bytes()).map_err(ConfigError::from)?;
        temp.persist(&path)
            .map_err(|e| ConfigError::from(e.error))
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.ollama.validate()
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    /// Root directory of the vector store
    #[inline]
    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .embeddings_dir
            .as_ref()
            .map_or_else(
                || self.base_dir.join("data").join("embeddings"),
                |dir| self.base_dir.join(dir),
            )
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.url()
    }
}

impl StorageConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::out_of_range(
                "storage.default_limit",
                self.default_limit,
                "at least 1",
            ));
        }
        if !(-1.0..=1.0).contains(&self.score_threshold) {
            return Err(ConfigError::out_of_range(
                "storage.score_threshold",
                self.score_threshold,
                "a cosine score between -1.0 and 1.0",
            ));
        }
        Ok(())
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(ConfigError::out_of_range(
                "ollama.protocol",
                &self.protocol,
                "http or https",
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::out_of_range("ollama.port", self.port, "1-65535"));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::out_of_range(
                "ollama.model",
                "\"\"",
                "a model name",
            ));
        }
        if !(1..=1000).contains(&self.batch_size) {
            return Err(ConfigError::out_of_range(
                "ollama.batch_size",
                self.batch_size,
                "1-1000",
            ));
        }
        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::out_of_range(
                "ollama.embedding_dimension",
                self.embedding_dimension,
                "64-4096",
            ));
        }
        self.url().map(|_| ())
    }

    /// `protocol://host:port` of the Ollama server
    #[inline]
    pub fn url(&self) -> Result<Url, ConfigError> {
        let address = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&address).map_err(|_| ConfigError::InvalidUrl(address))
    }
}
