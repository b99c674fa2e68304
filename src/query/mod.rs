//! Query translation layer
//!
//! Turns the registry's clause DSL, field lists and sort keys into the
//! document store's native query representation, and runs the result
//! through a single store call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod executor;
pub mod filter;
pub mod projection;

pub use executor::QueryExecutor;
pub use filter::{compile, Operator};
pub use projection::{project, Projection};

/// A stored document, or a native query/filter expressed as one.
pub type Document = Map<String, Value>;

/// One `{field, action, value}` condition of the filter DSL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterClause {
    #[serde(default)]
    pub field: String,
    pub action: String,
    #[serde(default)]
    pub value: Option<Value>,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, action: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            action: action.into(),
            value: Some(value),
        }
    }

    /// A boolean composition clause that wraps whatever was compiled before it.
    pub fn wrap_previous(action: impl Into<String>) -> Self {
        Self {
            field: String::new(),
            action: action.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parses `field` / `-field`. An empty key means "store order".
    pub fn parse(key: &str) -> Option<Self> {
        let (field, direction) = match key.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Descending),
            None => (key, SortDirection::Ascending),
        };

        if field.is_empty() {
            return None;
        }

        Some(Self {
            field: field.to_string(),
            direction,
        })
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Field list, sort key and pagination for one list/search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub fields: Vec<String>,
    pub sort: String,
    pub start: Option<u64>,
    pub size: Option<u64>,
}

impl QueryRequest {
    pub fn sorted_by(sort: impl Into<String>) -> Self {
        Self {
            sort: sort.into(),
            ..Default::default()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn paginate(mut self, start: Option<u64>, size: Option<u64>) -> Self {
        self.start = start;
        self.size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_spec_parse() {
        assert_eq!(SortSpec::parse("slug"), Some(SortSpec::ascending("slug")));
        assert_eq!(
            SortSpec::parse("-popularity.daily"),
            Some(SortSpec::descending("popularity.daily"))
        );
        assert_eq!(SortSpec::parse(""), None);
        assert_eq!(SortSpec::parse("-"), None);
    }

    #[test]
    fn test_clause_deserialization_defaults() {
        let clause: FilterClause = serde_json::from_value(json!({"action": "or"})).unwrap();
        assert_eq!(clause.field, "");
        assert_eq!(clause.value, None);

        let clause: FilterClause =
            serde_json::from_value(json!({"field": "x", "action": "=", "value": 5})).unwrap();
        assert_eq!(clause, FilterClause::new("x", "=", json!(5)));
    }
}
