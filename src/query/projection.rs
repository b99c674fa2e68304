use serde::Serialize;
use serde_json::{Map, Value};

/// Native projection: `field -> 0|1`, with `_id` excluded unless asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Projection(Map<String, Value>);

impl Default for Projection {
    fn default() -> Self {
        let mut fields = Map::new();
        fields.insert("_id".to_string(), Value::from(0));
        Self(fields)
    }
}

impl Projection {
    /// Projection that keeps every stored field, `_id` included.
    pub fn everything() -> Self {
        Self(Map::new())
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), Value::from(1));
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), Value::from(0));
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_included(&self, field: &str) -> Option<bool> {
        self.0.get(field).map(|v| v.as_i64().unwrap_or(0) != 0)
    }

    /// Fields explicitly included, `_id` aside.
    pub fn inclusions(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(k, v)| k.as_str() != "_id" && v.as_i64().unwrap_or(0) != 0)
            .map(|(k, _)| k.as_str())
    }

    pub fn exclusions(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(k, v)| k.as_str() != "_id" && v.as_i64().unwrap_or(0) == 0)
            .map(|(k, _)| k.as_str())
    }

    /// Inclusion mode when any non-`_id` field is included.
    pub fn is_inclusive(&self) -> bool {
        self.inclusions().next().is_some()
    }
}

/// Builds a projection from a field list; `-name` excludes `name`.
pub fn project<S: AsRef<str>>(field_names: &[S]) -> Projection {
    field_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !name.is_empty())
        .fold(Projection::default(), |projection, name| {
            match name.strip_prefix('-') {
                Some(excluded) => projection.exclude(excluded),
                None => projection.include(name),
            }
        })
}
