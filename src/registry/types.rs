use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Release channel of a plugin version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Release,
    Beta,
    Alpha,
}

impl Channel {
    /// Case-insensitive channel name lookup.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "release" => Some(Self::Release),
            "beta" => Some(Self::Beta),
            "alpha" => Some(Self::Alpha),
            _ => None,
        }
    }

    /// Name as stored in a version's `type` attribute.
    pub fn stored_name(self) -> &'static str {
        match self {
            Self::Release => "Release",
            Self::Beta => "Beta",
            Self::Alpha => "Alpha",
        }
    }
}

/// One entry of a plugin's `versions` array. Attributes other than
/// `version` and `type` are carried along untouched; either of the two may
/// be missing when a projection dropped it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Version {
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub version: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reads `"2.0"`, `2.0` or `true` alike; `null` becomes empty.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {}",
            other
        ))),
    }
}

impl Version {
    pub fn new(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            kind: kind.into(),
            extra: Map::new(),
        }
    }

    pub fn channel(&self) -> Option<Channel> {
        Channel::parse(&self.kind)
    }
}

/// Which versions a detail request wants to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Channel(Channel),
    Exact(String),
}

impl VersionRequest {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("latest") {
            return Self::Latest;
        }
        match Channel::parse(s) {
            Some(channel) => Self::Channel(channel),
            None => Self::Exact(s.to_string()),
        }
    }
}

/// Author or category with the number of plugins filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCount {
    pub name: Value,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub latest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpToDate {
    pub slug: Value,
    pub plugin_name: Value,
    pub versions: VersionSummary,
}
