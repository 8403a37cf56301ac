//! Reading configuration files.

use crate::config::GraphModelConfig;
use crate::env::{apply_overrides, substitute_env_references};
use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }

    fn parse(self, content: &str) -> ConfigResult<Value> {
        let parse_error = |message: String| ConfigError::Parse {
            format: self.name(),
            message,
        };

        match self {
            #[cfg(feature = "toml")]
            Self::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Self::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            #[allow(unreachable_patterns)]
            other => Err(ConfigError::UnsupportedFormat(format!(
                "{} support is not enabled",
                other.name()
            ))),
        }
    }
}

enum EnvSource {
    Process,
    Fixed(HashMap<String, String>),
}

/// Loads [`GraphModelConfig`] from files or strings.
///
/// Loading parses the content, resolves `{env:VAR}` references, applies the
/// `GRAPHMODEL_*` overrides and validates the result.
pub struct ConfigLoader {
    env: EnvSource,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.env {
            EnvSource::Process => "process",
            EnvSource::Fixed(_) => "fixed",
        };
        f.debug_struct("ConfigLoader").field("env", &source).finish()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment
    pub fn new() -> Self {
        Self {
            env: EnvSource::Process,
        }
    }

    /// Loader reading only the given variables
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: EnvSource::Fixed(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Load a file using the process environment
    pub async fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<GraphModelConfig> {
        Self::new().load(path).await
    }

    /// Load a file, picking the format from its extension
    pub async fn load(&self, path: impl AsRef<Path>) -> ConfigResult<GraphModelConfig> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = self.parse(&content, format)?;
        info!(path = %path.display(), uri = %config.connection.uri, "Loaded graphmodel configuration");
        Ok(config)
    }

    /// Parse configuration text
    pub fn parse(&self, content: &str, format: ConfigFormat) -> ConfigResult<GraphModelConfig> {
        let mut value = format.parse(content)?;
        // An empty YAML document parses to null
        if value.is_null() {
            value = Value::Object(serde_json::Map::new());
        }

        let lookup = |name: &str| self.var(name);
        substitute_env_references(&mut value, &lookup)?;

        let mut config: GraphModelConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                format: format.name(),
                message: e.to_string(),
            })?;

        apply_overrides(&mut config, &lookup);
        config.validate()?;
        debug!(?config, "Configuration validated");
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.env {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use graphmodel_core::AccessMode;
    use test_case::test_case;

    #[test_case("graphmodel.toml", ConfigFormat::Toml ; "toml")]
    #[test_case("graphmodel.yaml", ConfigFormat::Yaml ; "yaml")]
    #[test_case("graphmodel.YML", ConfigFormat::Yaml ; "upper case yml")]
    #[test_case("graphmodel.json", ConfigFormat::Json ; "json")]
    fn test_format_from_extension(file: &str, expected: ConfigFormat) {
        assert_eq!(ConfigFormat::from_path(Path::new(file)).unwrap(), expected);
    }

    #[test]
    fn test_unknown_extension() {
        let err = ConfigFormat::from_path(Path::new("graphmodel.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_parse_full_toml() {
        let content = r#"
[connection]
uri = "bolt://localhost:7687"
user = "neo4j"
password = "{env:NEO4J_PASSWORD}"
database = "neo4j"
fetch_size = 500
max_connections = 16

[session]
access_mode = "read"

[query]
complex_property_depth = 3
log_parameters = true

[mapping]
labels = { Person = "Human" }
ignored = ["Person.Scratch"]
indexed = ["Person.Email"]
[mapping.property_names]
"Person.FirstName" = "first_name"

[logging]
level = "debug"
format = "json"
"#;
        let loader = ConfigLoader::with_vars([("NEO4J_PASSWORD", "s3cret")]);
        let config = loader.parse(content, ConfigFormat::Toml).unwrap();

        assert_eq!(config.connection.password.as_deref(), Some("s3cret"));
        assert_eq!(config.connection.database.as_deref(), Some("neo4j"));
        assert_eq!(config.session.access_mode, AccessMode::Read);
        assert_eq!(config.query.complex_property_depth, 3);
        assert!(config.query.log_parameters);
        assert_eq!(config.logging.format, LogFormat::Json);

        let table = config.mapping.to_mapping_table();
        assert_eq!(table.label_for("Person"), Some("Human"));
        assert_eq!(table.property_name_for("Person", "FirstName"), Some("first_name"));
        assert!(table.is_ignored("Person", "Scratch"));
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let content = "connection:\n  uri: neo4j://graph:7687\nquery:\n  traversal_limit: 10\n";
        let config = ConfigLoader::with_vars(Vec::<(String, String)>::new())
            .parse(content, ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(config.connection.uri, "neo4j://graph:7687");
        assert_eq!(config.connection.user, "neo4j");
        assert_eq!(config.query.complex_property_depth, 5);
        assert_eq!(config.query.traversal_limit, Some(10));
    }

    #[test]
    fn test_empty_document_is_default() {
        let loader = ConfigLoader::with_vars(Vec::<(String, String)>::new());
        let config = loader.parse("", ConfigFormat::Yaml).unwrap();
        assert_eq!(config, GraphModelConfig::default());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let content = r#"{"connection": {"uri": "bolt://file:7687", "user": "file"}}"#;
        let loader = ConfigLoader::with_vars([
            ("GRAPHMODEL_URI", "bolt://env:7687"),
            ("GRAPHMODEL_DATABASE", "analytics"),
        ]);
        let config = loader.parse(content, ConfigFormat::Json).unwrap();

        assert_eq!(config.connection.uri, "bolt://env:7687");
        assert_eq!(config.connection.user, "file");
        assert_eq!(config.connection.database.as_deref(), Some("analytics"));
    }

    #[test]
    fn test_missing_env_reference_fails() {
        let content = "[connection]\npassword = \"{env:NOT_SET_ANYWHERE}\"\n";
        let loader = ConfigLoader::with_vars(Vec::<(String, String)>::new());
        let err = loader.parse(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar { ref names } if names == &["NOT_SET_ANYWHERE"]));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let content = "[query]\ncomplex_property_depth = 0\n";
        let loader = ConfigLoader::with_vars(Vec::<(String, String)>::new());
        let err = loader.parse(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_syntax_error_names_format() {
        let loader = ConfigLoader::with_vars(Vec::<(String, String)>::new());
        let err = loader.parse("[connection", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse TOML config"));
    }

    #[test]
    fn test_unknown_access_mode_is_parse_error() {
        let loader = ConfigLoader::with_vars(Vec::<(String, String)>::new());
        let err = loader
            .parse("[session]\naccess_mode = \"admin\"\n", ConfigFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));
    }
}
