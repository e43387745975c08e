//! YAML configuration file support.
//!
//! One file describes where the reference data lives and how matching and
//! batching behave, so library users and offline tools share the settings
//! the server reads from its own sources.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "nightly reconciliation"
//!
//! reference_data_path: "data/reference.json"
//!
//! matching:
//!   limit: 5
//!   auto_accept_confidence: 0.9
//!
//! batch:
//!   max_items: 1000
//!   concurrency: 10
//!   ttl_secs: 86400
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use batch::{BatchConfig, BatchError};
use matcher::{MatchConfig, MatchError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

impl From<MatchError> for ConfigLoadError {
    fn from(err: MatchError) -> Self {
        ConfigLoadError::Validation(err.to_string())
    }
}

impl From<BatchError> for ConfigLoadError {
    fn from(err: BatchError) -> Self {
        ConfigLoadError::Validation(err.to_string())
    }
}

/// Top-level YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TerritoiresConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// JSON reference snapshot. Relative paths resolve against the working
    /// directory.
    #[serde(default)]
    pub reference_data_path: Option<PathBuf>,

    #[serde(default)]
    pub matching: MatchConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

impl TerritoiresConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: TerritoiresConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.matching.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

impl Default for TerritoiresConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            reference_data_path: None,
            matching: MatchConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
reference_data_path: "data/reference.json"
matching:
  limit: 3
"#;

        let config = TerritoiresConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.matching.limit, 3);
        assert_eq!(config.matching.auto_accept_confidence, 0.9);
        assert_eq!(config.batch.max_items, 1000);
        assert_eq!(
            config.reference_data_path.as_deref(),
            Some(Path::new("data/reference.json"))
        );
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
batch:
  concurrency: 4
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = TerritoiresConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.batch.concurrency, 4);
    }

    #[test]
    fn test_default_config() {
        let config = TerritoiresConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert!(config.reference_data_path.is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let result = TerritoiresConfig::from_yaml("version: \"2.0\"\n");
        assert!(matches!(result, Err(ConfigLoadError::UnsupportedVersion(v)) if v == "2.0"));
    }

    #[test]
    fn test_matching_validation() {
        let yaml = r#"
version: "1.0"
matching:
  limit: 0
"#;

        let result = TerritoiresConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("limit must be >= 1"));
    }

    #[test]
    fn test_batch_validation() {
        let yaml = r#"
version: "1.0"
batch:
  concurrency: 0
"#;

        let result = TerritoiresConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("concurrency"));
    }
}
