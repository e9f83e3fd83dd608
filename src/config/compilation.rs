//! Per-run compilation settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use staticmap_expand::{StreamingConfig, DEFAULT_CACHE_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::merge::merge_layers;
use crate::template::OutputFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one compilation. Immutable once the compile starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilationConfig {
    /// Artifact format (default: json)
    pub output_format: OutputFormat,

    /// Emit the metadata block (default: true)
    pub include_metadata: bool,

    /// Embed provenance inside the metadata block (default: true)
    pub include_provenance: bool,

    /// Generated modules use binary search instead of a linear scan (default: true)
    pub optimize_lookups: bool,

    /// Upper bound on patterns per streaming chunk (default: derived from memory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Streaming memory budget in MiB (default: 512)
    pub max_memory_mb: usize,

    /// Memoized expansions kept by the engine (default: 1024)
    pub cache_size: usize,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Json,
            include_metadata: true,
            include_provenance: true,
            optimize_lookups: true,
            chunk_size: None,
            max_memory_mb: 512,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CompilationConfig {
    /// Resolve defaults, an optional TOML config file, and overrides.
    ///
    /// `overrides` is a JSON object using the same keys as the config file.
    pub fn resolve(config_file: Option<&Path>, overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers =
            vec![serde_json::to_value(Self::default()).map_err(|e| ConfigError::Invalid(e.to_string()))?];

        if let Some(path) = config_file {
            layers.push(load_toml_file(path)?);
        }
        if let Some(overrides) = overrides {
            layers.push(overrides);
        }

        let config: Self = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file on top of the defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        Self::resolve(Some(path), None)
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn streaming(&self) -> StreamingConfig {
        StreamingConfig {
            max_memory_mb: self.max_memory_mb,
            chunk_size: self.chunk_size,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_memory_mb == 0 {
            return Err(ConfigError::Invalid("max_memory_mb must be positive".to_string()));
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid("cache_size must be positive".to_string()));
        }
        Ok(())
    }
}

fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(crate::loader::toml_to_json(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CompilationConfig::default();
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(config.include_metadata);
        assert!(config.include_provenance);
        assert!(config.optimize_lookups);
        assert_eq!(config.chunk_size, None);
        assert_eq!(config.max_memory_mb, 512);
    }

    #[test]
    fn test_resolve_without_layers_is_default() {
        let config = CompilationConfig::resolve(None, None).unwrap();
        assert_eq!(config, CompilationConfig::default());
    }

    #[test]
    fn test_file_then_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staticmap.toml");
        fs::write(&path, "output_format = \"yaml\"\nmax_memory_mb = 64\nchunk_size = 100\n").unwrap();

        let config =
            CompilationConfig::resolve(Some(&path), Some(json!({"chunk_size": 10}))).unwrap();
        assert_eq!(config.output_format, OutputFormat::Yaml);
        assert_eq!(config.max_memory_mb, 64);
        assert_eq!(config.chunk_size, Some(10));
        assert!(config.include_metadata);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = CompilationConfig::resolve(None, Some(json!({"output_format": "xml"}))).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_memory_rejected() {
        let err = CompilationConfig::resolve(None, Some(json!({"max_memory_mb": 0}))).unwrap_err();
        assert!(err.to_string().contains("max_memory_mb"));
    }

    #[test]
    fn test_missing_file() {
        let err = CompilationConfig::from_toml_file(Path::new("/nonexistent/staticmap.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_streaming_config() {
        let config = CompilationConfig {
            chunk_size: Some(50),
            max_memory_mb: 8,
            ..Default::default()
        };
        let streaming = config.streaming();
        assert_eq!(streaming.chunk_size, Some(50));
        assert_eq!(streaming.max_memory_mb, 8);
    }
}
