//! Environment handling: `{env:VAR}` references and `GRAPHMODEL_*` overrides.

use crate::config::GraphModelConfig;
use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;
use tracing::{debug, warn};

const ENV_REF_PREFIX: &str = "{env:";
const ENV_REF_SUFFIX: &str = "}";

/// Variables that override connection settings after the file is read
pub const ENV_OVERRIDES: [&str; 4] = [
    "GRAPHMODEL_URI",
    "GRAPHMODEL_USER",
    "GRAPHMODEL_PASSWORD",
    "GRAPHMODEL_DATABASE",
];

fn extract_env_var(s: &str) -> Option<&str> {
    s.strip_prefix(ENV_REF_PREFIX)?
        .strip_suffix(ENV_REF_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Replace every string of the form `{env:VAR}` in the tree with the value
/// `lookup` returns for `VAR`. All unresolved names are reported together.
pub fn substitute_env_references(
    value: &mut Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let mut missing = Vec::new();
    substitute_recursive(value, lookup, &mut missing);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingEnvVar { names: missing })
    }
}

fn substitute_recursive(
    value: &mut Value,
    lookup: &dyn Fn(&str) -> Option<String>,
    missing: &mut Vec<String>,
) {
    match value {
        Value::String(s) => {
            if let Some(var_name) = extract_env_var(s) {
                debug!("Processing env reference: {}", var_name);
                match lookup(var_name) {
                    Some(env_value) => *value = Value::String(env_value),
                    None => {
                        warn!("Environment variable not found: {}", var_name);
                        missing.push(var_name.to_string());
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                substitute_recursive(item, lookup, missing);
            }
        }
        Value::Object(table) => {
            for (_key, val) in table.iter_mut() {
                substitute_recursive(val, lookup, missing);
            }
        }
        _ => {}
    }
}

/// Apply `GRAPHMODEL_*` connection overrides
pub(crate) fn apply_overrides(
    config: &mut GraphModelConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
) {
    let connection = &mut config.connection;
    if let Some(uri) = lookup("GRAPHMODEL_URI") {
        debug!("GRAPHMODEL_URI overrides connection.uri");
        connection.uri = uri;
    }
    if let Some(user) = lookup("GRAPHMODEL_USER") {
        debug!("GRAPHMODEL_USER overrides connection.user");
        connection.user = user;
    }
    if let Some(password) = lookup("GRAPHMODEL_PASSWORD") {
        debug!("GRAPHMODEL_PASSWORD overrides connection.password");
        connection.password = Some(password);
    }
    if let Some(database) = lookup("GRAPHMODEL_DATABASE") {
        debug!("GRAPHMODEL_DATABASE overrides connection.database");
        connection.database = Some(database);
    }
}
