//! # graphmodel configuration
//!
//! Loads the connection, session, query, mapping and logging settings used
//! to assemble a graph, and installs the tracing subscriber for binaries and
//! tests that want one.
//!
//! ## Features
//!
//! - TOML, YAML and JSON files, picked by extension
//! - `{env:VAR}` references anywhere in the file
//! - `GRAPHMODEL_URI`, `GRAPHMODEL_USER`, `GRAPHMODEL_PASSWORD` and
//!   `GRAPHMODEL_DATABASE` overrides
//! - the `[mapping]` section converts straight into a
//!   [`MappingTable`](graphmodel_core::MappingTable)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphmodel_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("graphmodel.toml").await?;
//!     graphmodel_config::init_logging(&config.logging)?;
//!     let mapping = config.mapping.to_mapping_table();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod env;
mod error;
mod loader;
mod logging;

#[cfg(feature = "test-utils")]
mod test_utils;

pub use config::*;
pub use env::{substitute_env_references, ENV_OVERRIDES};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader};
pub use logging::{build_filter_string, init_logging};

#[cfg(feature = "test-utils")]
pub use test_utils::*;
