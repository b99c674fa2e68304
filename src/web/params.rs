use std::collections::HashMap;

use crate::error::RegistryError;
use crate::query::{FilterClause, QueryRequest};

use super::reply::callback_name;

/// Server assumed by update checks that do not name one.
pub const DEFAULT_UPDATE_SERVER: &str = "bukkit";

/// Raw request parameters: the query string, merged with a urlencoded form
/// body on POST routes.
#[derive(Debug, Clone, Default)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new(query: HashMap<String, String>) -> Self {
        Self(query)
    }

    /// Body values fill in whatever the query string left out.
    pub fn merged(query: HashMap<String, String>, form: HashMap<String, String>) -> Self {
        let mut merged = form;
        merged.extend(query);
        Self(merged)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn callback(&self) -> Option<String> {
        callback_name(&self.0)
    }

    /// Comma separated `fields`, empty entries dropped.
    pub fn fields(&self) -> Vec<String> {
        split_list(self.get("fields"))
    }

    pub fn number(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|raw| raw.trim().parse().ok())
    }

    pub fn query_request(&self, default_sort: &str) -> QueryRequest {
        let sort = self
            .get("sort")
            .filter(|s| !s.is_empty())
            .unwrap_or(default_sort);

        QueryRequest::sorted_by(sort)
            .with_fields(self.fields())
            .paginate(self.number("start"), self.number("size"))
    }

    pub fn slugs(&self) -> Vec<String> {
        split_list(self.get("slugs"))
    }

    pub fn update_server(&self) -> &str {
        self.get("server")
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_UPDATE_SERVER)
    }

    /// The JSON clause list in `filters`; absent means no clauses.
    pub fn filters(&self) -> Result<Vec<FilterClause>, RegistryError> {
        match self.get("filters") {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| RegistryError::InvalidRequest(format!("invalid filters: {}", e))),
        }
    }
}

/// Percent-decodes a path segment; undecodable input is used as is.
pub fn decode_segment(raw: String) -> String {
    let decoded = urlencoding::decode(&raw).map(|d| d.into_owned());
    decoded.unwrap_or(raw)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_query_request_defaults() {
        let request = params(&[]).query_request("slug");
        assert_eq!(request, QueryRequest::sorted_by("slug"));
    }

    #[test]
    fn test_query_request_from_params() {
        let request = params(&[
            ("fields", "slug, plugin_name,,-authors"),
            ("sort", "-popularity.daily"),
            ("start", "20"),
            ("size", "10"),
        ])
        .query_request("slug");

        assert_eq!(request.fields, vec!["slug", "plugin_name", "-authors"]);
        assert_eq!(request.sort, "-popularity.daily");
        assert_eq!(request.start, Some(20));
        assert_eq!(request.size, Some(10));
    }

    #[test]
    fn test_unparseable_numbers_are_ignored() {
        let request = params(&[("size", "ten"), ("start", "-1")]).query_request("slug");
        assert_eq!(request.size, None);
        assert_eq!(request.start, None);
    }

    #[test]
    fn test_filters_parsing() {
        assert!(params(&[]).filters().unwrap().is_empty());

        let clauses = params(&[("filters", r#"[{"field":"slug","action":"=","value":"x"}]"#)])
            .filters()
            .unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].field, "slug");

        assert!(matches!(
            params(&[("filters", "{not json")]).filters(),
            Err(RegistryError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("Admin%20Tools".to_string()), "Admin Tools");
        assert_eq!(decode_segment("worldedit".to_string()), "worldedit");
        assert_eq!(decode_segment("%FF".to_string()), "%FF");
    }

    #[test]
    fn test_update_params() {
        let p = params(&[("slugs", "worldedit,worldguard")]);
        assert_eq!(p.slugs(), vec!["worldedit", "worldguard"]);
        assert_eq!(p.update_server(), DEFAULT_UPDATE_SERVER);

        assert_eq!(params(&[("server", "spigot")]).update_server(), "spigot");
    }

    #[test]
    fn test_query_string_wins_over_form() {
        let query = HashMap::from([("slugs".to_string(), "a".to_string())]);
        let form = HashMap::from([
            ("slugs".to_string(), "b".to_string()),
            ("server".to_string(), "spigot".to_string()),
        ]);
        let merged = Params::merged(query, form);
        assert_eq!(merged.slugs(), vec!["a"]);
        assert_eq!(merged.update_server(), "spigot");
    }
}
