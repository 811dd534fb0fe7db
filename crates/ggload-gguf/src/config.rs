//! Reader configuration, typically loaded from YAML.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a [`ReaderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsed but failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Limits and policies applied while parsing a GGUF file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Maximum nesting depth of metadata arrays.
    #[serde(default = "default_max_array_depth")]
    pub max_array_depth: usize,

    /// Accept repeated tensor names; the last descriptor wins the name lookup.
    #[serde(default)]
    pub allow_duplicate_tensor_names: bool,
}

/// Upper bound accepted for [`ReaderConfig::max_array_depth`].
///
/// Dropping and comparing a [`crate::MetadataValue`] recurse once per nesting
/// level, so the limit has to stay well inside a thread's stack.
pub const MAX_ARRAY_DEPTH_LIMIT: usize = 1024;

fn default_max_array_depth() -> usize {
    64
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_array_depth: default_max_array_depth(),
            allow_duplicate_tensor_names: false,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_array_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_array_depth must be at least 1".to_string(),
            ));
        }
        if self.max_array_depth > MAX_ARRAY_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_array_depth must be at most {MAX_ARRAY_DEPTH_LIMIT}, got {}",
                self.max_array_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.max_array_depth, 64);
        assert!(!config.allow_duplicate_tensor_names);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = ReaderConfig::from_yaml("allow_duplicate_tensor_names: true\n").unwrap();
        assert_eq!(config.max_array_depth, 64);
        assert!(config.allow_duplicate_tensor_names);
    }

    #[test]
    fn test_from_yaml_rejects_zero_depth() {
        let err = ReaderConfig::from_yaml("max_array_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_yaml_rejects_excessive_depth() {
        let err = ReaderConfig::from_yaml("max_array_depth: 10000000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = ReaderConfig::from_yaml("max_array_depth: 1024\n").unwrap();
        assert_eq!(config.max_array_depth, MAX_ARRAY_DEPTH_LIMIT);
    }

    #[test]
    fn test_from_yaml_malformed() {
        let err = ReaderConfig::from_yaml("max_array_depth: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_array_depth: 4").unwrap();
        let config = ReaderConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_array_depth, 4);

        let missing = ReaderConfig::from_yaml_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
