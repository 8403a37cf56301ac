//! Target renderers for query models.
//!
//! Renderers convert an engine-neutral [`QueryModel`] into query text plus
//! a parameter table, and describe the columns the rows will carry so the
//! caller can materialize them.

mod complex;
mod cypher;

pub use complex::{complex_column, ComplexLoad};
pub use cypher::CypherRenderer;

use crate::operator::QueryModel;
use graphmodel_core::{GraphResult, Parameters};
use std::borrow::Cow;

/// Columns carrying one returned entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityColumns {
    pub column: String,
    /// Collected complex-property entries, when the type has any
    pub complex_column: Option<String>,
    /// Start and end node id columns, for relationships
    pub endpoint_columns: Option<(String, String)>,
}

impl EntityColumns {
    pub fn node(column: impl Into<String>, complex_column: Option<String>) -> Self {
        Self {
            column: column.into(),
            complex_column,
            endpoint_columns: None,
        }
    }

    pub fn relationship(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            endpoint_columns: Some((format!("{column}_start"), format!("{column}_end"))),
            column,
            complex_column: None,
        }
    }
}

/// Shape of each returned row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    Entities(EntityColumns),
    /// Projected values; `single` rows carry one unnamed `value` column
    Projection { columns: Vec<String>, single: bool },
    Scalar { column: String },
    /// Source, the hops of the last traversal step, and the target
    Traversal {
        source: EntityColumns,
        hops: String,
        target: EntityColumns,
    },
    Groups {
        key: String,
        items: EntityColumns,
    },
    /// Whole paths; `complex_column` holds one entry list per path node
    Paths {
        column: String,
        complex_column: Option<String>,
    },
}

/// Which rows the caller keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowSelection {
    #[default]
    All,
    First,
    /// Exactly one row is expected; the query fetches at most two
    Single,
    /// Every row is fetched and the final one kept
    Last,
}

/// Output from rendering
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// The generated query text
    pub text: String,
    /// Parameters to bind to the query
    pub parameters: Parameters,
    pub shape: ResultShape,
    pub selection: RowSelection,
}

/// Trait for rendering query models to a target query language.
pub trait QueryRenderer: Send + Sync {
    /// Unique name for this renderer
    fn name(&self) -> &str;

    /// Render the model to query text with parameters
    fn render(&self, model: &QueryModel) -> GraphResult<RenderedQuery>;
}

/// Backtick-quote an identifier unless it is a plain word
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    let plain = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}
