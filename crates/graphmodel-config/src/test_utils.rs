//! Test utilities for configuration testing.

use crate::{ConfigFormat, GraphModelConfig, LogFormat};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

/// Builder for configurations used in tests
#[derive(Debug, Default)]
pub struct TestConfigBuilder {
    config: GraphModelConfig,
}

impl TestConfigBuilder {
    /// Start from defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Point at a test database
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.connection.uri = uri.into();
        self
    }

    /// Set the complex-property read depth
    pub fn complex_property_depth(mut self, depth: usize) -> Self {
        self.config.query.complex_property_depth = depth;
        self
    }

    /// Map a type to a different label
    pub fn label(mut self, type_name: &str, label: &str) -> Self {
        self.config
            .mapping
            .labels
            .insert(type_name.to_string(), label.to_string());
        self
    }

    /// Store a member under a different attribute name
    pub fn property_name(mut self, member: &str, storage_name: &str) -> Self {
        self.config
            .mapping
            .property_names
            .insert(member.to_string(), storage_name.to_string());
        self
    }

    /// Debug-level compact logging without colors
    pub fn debug_logging(mut self) -> Self {
        self.config.logging.level = "debug".to_string();
        self.config.logging.format = LogFormat::Compact;
        self.config.logging.use_ansi = false;
        self
    }

    /// Finish
    pub fn build(self) -> GraphModelConfig {
        self.config
    }
}

/// Serialize `config` in `format`
pub fn render_config(config: &GraphModelConfig, format: ConfigFormat) -> String {
    match format {
        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string(config).unwrap(),
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yaml::to_string(config).unwrap(),
        #[allow(unreachable_patterns)]
        _ => serde_json::to_string_pretty(config).unwrap(),
    }
}

/// Write `content` to `filename` inside `dir` and return the full path
pub fn write_config_in_dir(dir: &TempDir, filename: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(filename);
    std::fs::write(&path, content).unwrap();
    path
}

/// Write `content` to a temporary file with the given extension
pub fn create_temp_config(content: &str, extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
