//! Configuration sections.
//!
//! Every section has a `Default`, so a file only needs the keys it
//! changes.

use crate::error::{ConfigError, ConfigResult};
use graphmodel_core::naming::DEFAULT_DEPTH_ALLOWED;
use graphmodel_core::{AccessMode, MappingTable, SessionOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Deepest complex-property read accepted by validation
pub const MAX_COMPLEX_PROPERTY_DEPTH: usize = 32;

/// Complete graphmodel configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphModelConfig {
    /// Where the database lives and how to authenticate
    pub connection: ConnectionConfig,
    /// Session options for transactions
    pub session: SessionConfig,
    /// Query rendering options
    pub query: QueryConfig,
    /// Label and property-name overrides
    pub mapping: MappingSection,
    /// Subscriber settings for [`init_logging`](crate::init_logging)
    pub logging: LoggingConfig,
}

impl GraphModelConfig {
    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection.uri.trim().is_empty() {
            return Err(ConfigError::validation("connection.uri", "must not be empty"));
        }

        if self.connection.max_connections == 0 {
            return Err(ConfigError::validation(
                "connection.max_connections",
                "must be greater than 0",
            ));
        }

        let depth = self.query.complex_property_depth;
        if !(1..=MAX_COMPLEX_PROPERTY_DEPTH).contains(&depth) {
            return Err(ConfigError::validation(
                "query.complex_property_depth",
                format!("must be between 1 and {MAX_COMPLEX_PROPERTY_DEPTH}, got {depth}"),
            ));
        }

        if self.query.traversal_limit == Some(0) {
            return Err(ConfigError::validation(
                "query.traversal_limit",
                "must be greater than 0",
            ));
        }

        for key in self
            .mapping
            .property_names
            .keys()
            .chain(&self.mapping.indexed)
            .chain(&self.mapping.ignored)
        {
            if !is_member_key(key) {
                return Err(ConfigError::validation(
                    "mapping",
                    format!("'{key}' is not of the form Type.Member"),
                ));
            }
        }

        Ok(())
    }

    /// Session options for the configured database and access mode
    pub fn session_options(&self) -> SessionOptions {
        let options = SessionOptions::default().with_access_mode(self.session.access_mode);
        match &self.connection.database {
            Some(database) => options.with_database(database.clone()),
            None => options,
        }
    }
}

fn is_member_key(key: &str) -> bool {
    key.split_once('.')
        .is_some_and(|(type_name, member)| !type_name.is_empty() && !member.is_empty())
}

/// Database connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`
    pub uri: String,
    /// User name
    pub user: String,
    /// Password; usually an `{env:VAR}` reference
    pub password: Option<String>,
    /// Target database; `None` uses the server default
    pub database: Option<String>,
    /// Rows fetched per round trip
    pub fetch_size: usize,
    /// Connection pool size
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: None,
            fetch_size: 500,
            max_connections: 16,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("fetch_size", &self.fetch_size)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Session settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Read or write sessions
    pub access_mode: AccessMode,
}

/// Query rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How many auxiliary-node levels are read back for complex properties
    pub complex_property_depth: usize,
    /// Log parameter values at trace level alongside the query text
    pub log_parameters: bool,
    /// Upper bound on the summed max depth of traversal steps
    pub traversal_limit: Option<usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            complex_property_depth: DEFAULT_DEPTH_ALLOWED,
            log_parameters: false,
            traversal_limit: None,
        }
    }
}

/// The `[mapping]` section; members are addressed as `"Type.Member"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingSection {
    /// Type name to label or relationship type
    pub labels: BTreeMap<String, String>,
    /// Members that are never stored
    pub ignored: BTreeSet<String>,
    /// Members that are indexed
    pub indexed: BTreeSet<String>,
    /// Member to storage attribute name
    pub property_names: BTreeMap<String, String>,
}

impl MappingSection {
    /// Build the lookup table consulted by the schema registry
    pub fn to_mapping_table(&self) -> MappingTable {
        MappingTable::from_parts(
            self.labels.clone(),
            self.property_names.clone(),
            self.indexed.clone(),
            self.ignored.clone(),
        )
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// Single line per event
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for graphmodel targets
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Extra filter directives, e.g. `neo4rs=warn`
    pub filter: Option<String>,
    /// Whether to print event targets
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub use_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            filter: None,
            include_target: true,
            use_ansi: true,
        }
    }
}
