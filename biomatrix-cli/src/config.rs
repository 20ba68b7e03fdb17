//! Configuration handling for the biomatrix CLI
//!
//! Supports loading configuration from biomatrix.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{CodecType, OutputFormat};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub io: IoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads for bulk loads and materialization
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Regular expression selecting shard file names
    #[serde(default = "default_shard_pattern")]
    pub pattern: String,

    /// Bytes per encoded cell in the shards
    #[serde(default = "default_bytes_per_value")]
    pub bytes_per_value: usize,

    /// Byte substitutions as FROM:TO, applied before command-line ones
    #[serde(default)]
    pub remap: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Cell codec used when --codec is not given
    #[serde(default = "default_codec")]
    pub codec: CodecType,

    /// Output format used by convert when --to is not given
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_shard_pattern() -> String { r"\.txt$".to_string() }
fn default_bytes_per_value() -> usize { 2 }
fn default_codec() -> CodecType { CodecType::Pair }
fn default_output_format() -> OutputFormat { OutputFormat::Packed }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            pattern: default_shard_pattern(),
            bytes_per_value: default_bytes_per_value(),
            remap: Vec::new(),
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            output_format: default_output_format(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                // Try to find biomatrix.toml in current directory
                let default_path = PathBuf::from("biomatrix.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: biomatrix.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(test)]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.merge.bytes_per_value, 2);
        assert_eq!(config.io.codec, CodecType::Pair);
        assert!(config.general.threads >= 1);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.merge.remap = vec!["a:A".to_string()];
        config.io.output_format = OutputFormat::Sparse;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded.merge.remap, config.merge.remap);
        assert_eq!(loaded.io.output_format, OutputFormat::Sparse);
        assert_eq!(loaded.general.threads, config.general.threads);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        std::fs::write(temp_file.path(), "[io]\ncodec = \"float\"\n")?;

        let loaded = Config::load_from_file(temp_file.path())?;
        assert_eq!(loaded.io.codec, CodecType::Float);
        assert_eq!(loaded.io.output_format, OutputFormat::Packed);
        assert_eq!(loaded.merge.pattern, r"\.txt$");

        Ok(())
    }
}
