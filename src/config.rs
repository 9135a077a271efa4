//! Configuration management for the schema mapper
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (mapper.toml)
//! - Environment variables (MAPPER__*)
//!
//! ## Example config file (mapper.toml):
//! ```toml
//! [validation]
//! debounce_ms = 500
//! export_on_valid = true
//!
//! [ingest]
//! delimiter = ","
//! chunk_size = 8192
//!
//! [properties]
//! default_type = "text"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::schema::PropertyType;

/// Main configuration for a mapping session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Validation coordinator settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Data source ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Property defaults
    #[serde(default)]
    pub properties: PropertyConfig,
}

/// Validation coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Quiescence window before a validation pass runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Snapshot the schema whenever a pass finds it valid
    #[serde(default = "default_true")]
    pub export_on_valid: bool,
}

/// Two-line preview ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Column delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Bytes requested per incremental read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Defaults applied to properties created by binding a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    #[serde(default = "default_property_type")]
    pub default_type: PropertyType,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_chunk_size() -> usize {
    8192
}

fn default_property_type() -> PropertyType {
    PropertyType::Text
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            export_on_valid: true,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            default_type: default_property_type(),
        }
    }
}

impl ValidationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl MapperConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["mapper.toml", ".mapper.toml", "config/mapper.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        let project = directories::ProjectDirs::from("dev", "schema-mapper", "schema-mapper");
        if let Some(dirs) = project {
            let xdg_config = dirs.config_dir().join("mapper.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MAPPER__VALIDATION__DEBOUNCE_MS=250
        builder = builder.add_source(
            Environment::with_prefix("MAPPER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert_eq!(config.validation.debounce(), Duration::from_millis(500));
        assert!(config.validation.export_on_valid);
        assert_eq!(config.ingest.delimiter, ',');
        assert_eq!(config.properties.default_type, PropertyType::Text);
    }

    #[test]
    fn test_serialize_config() {
        let config = MapperConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[ingest]"));
        assert!(toml_str.contains("default_type = \"text\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[validation]\ndebounce_ms = 120\n\n[ingest]\ndelimiter = \";\"\n",
        )
        .unwrap();

        let config = MapperConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.validation.debounce_ms, 120);
        assert_eq!(config.ingest.delimiter, ';');
        assert_eq!(config.ingest.chunk_size, 8192);
    }
}
