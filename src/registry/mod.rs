//! Registry operations consumed by the HTTP layer.
//!
//! Every operation is read-only and wires the filter compiler, field
//! projector, version selector and query executor together. Lookups that
//! find nothing return `None`; failing queries degrade to empty results.

use serde_json::Value;
use std::sync::Arc;

use crate::query::{compile, project, Document, FilterClause, QueryExecutor, QueryRequest, SortSpec};
use crate::state::Metrics;
use crate::store::{Collection, DocumentStore, FindQuery};

pub mod stats;
pub mod types;
pub mod versions;

pub use stats::TrendSummary;
pub use types::{Channel, NamedCount, UpToDate, Version, VersionRequest, VersionSummary};

pub struct RegistryService {
    executor: QueryExecutor,
}

impl RegistryService {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            executor: QueryExecutor::new(store, metrics),
        }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Plugins that are not deleted, optionally for one server only.
    pub async fn list_plugins(&self, server: Option<&str>, request: &QueryRequest) -> Vec<Document> {
        let mut filter = Document::new();
        filter.insert("deleted".to_string(), serde_json::json!({ "$exists": false }));
        with_server(&mut filter, server);

        self.executor.run(filter, request).await
    }

    pub async fn list_author_plugins(
        &self,
        server: Option<&str>,
        author: &str,
        request: &QueryRequest,
    ) -> Vec<Document> {
        let mut filter = Document::new();
        filter.insert("authors".to_string(), Value::from(author));
        with_server(&mut filter, server);

        self.executor.run(filter, request).await
    }

    pub async fn list_category_plugins(
        &self,
        server: Option<&str>,
        category: &str,
        request: &QueryRequest,
    ) -> Vec<Document> {
        let mut filter = Document::new();
        filter.insert("categories".to_string(), Value::from(category));
        with_server(&mut filter, server);

        self.executor.run(filter, request).await
    }

    /// A single plugin, with its versions narrowed when `version` names a
    /// channel, `latest`, or a version string.
    pub async fn plugin_details(
        &self,
        server: &str,
        slug: &str,
        version: Option<&str>,
        fields: &[String],
    ) -> Option<Document> {
        let request = version.map(VersionRequest::parse);

        let mut filter = Document::new();
        filter.insert("slug".to_string(), Value::from(slug));
        filter.insert("server".to_string(), Value::from(server));

        let mut fields = fields.to_vec();
        if let Some(VersionRequest::Channel(channel)) = &request {
            filter.insert(
                "versions.type".to_string(),
                Value::from(channel.stored_name()),
            );
            // channel selection needs each version's type
            if project(&fields).is_inclusive() {
                fields.push("versions.type".to_string());
            } else {
                fields.retain(|f| f != "-versions.type");
            }
        }

        let mut plugin = self.executor.find_one(filter, project(&fields)).await?;

        if let Some(request) = &request {
            narrow_versions(&mut plugin, request);
        }

        Some(plugin)
    }

    pub async fn list_authors(&self) -> Vec<NamedCount> {
        self.named_counts(Collection::Authors).await
    }

    pub async fn list_categories(&self) -> Vec<NamedCount> {
        self.named_counts(Collection::Categories).await
    }

    pub async fn plugins_up_to_date(&self, slugs: &[String], server: &str) -> Vec<UpToDate> {
        self.executor.up_to_date(slugs, server).await
    }

    /// Runs a clause-list search. An empty clause list matches every plugin.
    pub async fn search(&self, filters: &[FilterClause], request: &QueryRequest) -> Vec<Document> {
        let filter = compile(filters, false);
        let compiled = Value::Object(filter.clone());
        tracing::debug!(%compiled, "Compiled search filter");

        self.executor.run(filter, request).await
    }

    async fn named_counts(&self, collection: Collection) -> Vec<NamedCount> {
        let query = FindQuery::all().sort(Some(SortSpec::ascending("_id")));
        self.executor
            .find_all(collection, query)
            .await
            .into_iter()
            .map(to_named_count)
            .collect()
    }
}

fn with_server(filter: &mut Document, server: Option<&str>) {
    if let Some(server) = server {
        filter.insert("server".to_string(), Value::from(server));
    }
}

/// Reshapes a stored `{_id, value}` aggregation row.
fn to_named_count(mut row: Document) -> NamedCount {
    NamedCount {
        name: row.remove("_id").unwrap_or(Value::Null),
        count: row.remove("value").unwrap_or(Value::Null),
    }
}

fn narrow_versions(plugin: &mut Document, request: &VersionRequest) {
    let Some(raw) = plugin.get("versions").filter(|v| v.is_array()).cloned() else {
        return;
    };

    match serde_json::from_value::<Vec<Version>>(raw) {
        Ok(all) => {
            let picked = versions::select(&all, request);
            match serde_json::to_value(picked) {
                Ok(value) => {
                    plugin.insert("versions".to_string(), value);
                }
                Err(e) => tracing::warn!("Failed to encode selected versions: {}", e),
            }
        }
        Err(e) => {
            tracing::warn!("Leaving unparseable versions untouched: {}", e);
        }
    }
}
