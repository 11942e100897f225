// Configuration management module
// Handles TOML configuration for storage location, embedding provider and course catalog

pub mod settings;

#[cfg(test)]
mod tests;

pub use settings::{
    CONFIG_FILE_NAME, CatalogConfig, Config, ConfigError, OllamaConfig, StorageConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
