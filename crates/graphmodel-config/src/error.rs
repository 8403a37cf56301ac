use graphmodel_core::GraphError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or applying configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The content is not valid for its format
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        /// Format name
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// The extension does not name a supported format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// One or more `{env:VAR}` references could not be resolved
    #[error("Environment variable not found: {} (referenced as {{env:{}}})", .names.join(", "), .names.join("}, {env:"))]
    MissingEnvVar {
        /// Unresolved variable names
        names: Vec<String>,
    },

    /// A value is out of range
    #[error("Invalid configuration for {field}: {message}")]
    Validation {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong
        message: String,
    },

    /// The tracing subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for GraphError {
    fn from(err: ConfigError) -> Self {
        GraphError::configuration("graphmodel config", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmodel_core::ErrorKind;

    #[test]
    fn test_missing_env_message() {
        let err = ConfigError::MissingEnvVar {
            names: vec!["NEO4J_PASSWORD".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Environment variable not found: NEO4J_PASSWORD (referenced as {env:NEO4J_PASSWORD})"
        );
    }

    #[test]
    fn test_converts_to_configuration_error() {
        let err: GraphError =
            ConfigError::validation("query.complex_property_depth", "must be at least 1").into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("query.complex_property_depth"));
    }
}
