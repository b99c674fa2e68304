use serde_json::Value;
use std::sync::Arc;

use super::{project, Document, Projection, QueryRequest, SortSpec};
use crate::registry::types::{UpToDate, Version};
use crate::registry::versions::summarize;
use crate::state::Metrics;
use crate::store::{Collection, DocumentStore, FindQuery};

/// Issues plugin queries against the store. Store failures never reach the
/// caller: they are logged, counted and turned into empty results.
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Runs one plugin query. Without `size` every match is returned and
    /// `start` is ignored; with `size`, `start` defaults to 0.
    pub async fn execute(
        &self,
        filter: Document,
        projection: Projection,
        sort: &str,
        start: Option<u64>,
        size: Option<u64>,
    ) -> Vec<Document> {
        let mut query = FindQuery::new(filter)
            .project(projection)
            .sort(SortSpec::parse(sort));

        if let Some(size) = size {
            query = query.skip(start.unwrap_or(0)).limit(size);
        }

        self.find_all(Collection::Plugins, query).await
    }

    /// Runs `query` on any collection, degrading failures to no results.
    pub async fn find_all(&self, collection: Collection, query: FindQuery) -> Vec<Document> {
        let timer = self.metrics.query_duration.start_timer();
        let result = self.store.find(collection, query).await;
        timer.observe_duration();

        match result {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(
                    "Query on '{}' failed, returning no results: {}",
                    collection.name(),
                    e
                );
                self.metrics.record_store_error();
                Vec::new()
            }
        }
    }

    pub async fn run(&self, filter: Document, request: &QueryRequest) -> Vec<Document> {
        self.execute(
            filter,
            project(&request.fields),
            &request.sort,
            request.start,
            request.size,
        )
        .await
    }

    pub async fn find_one(&self, filter: Document, projection: Projection) -> Option<Document> {
        self.find_one_in(Collection::Plugins, filter, projection).await
    }

    /// Single-document lookup on any collection; failures read as not found.
    pub async fn find_one_in(
        &self,
        collection: Collection,
        filter: Document,
        projection: Projection,
    ) -> Option<Document> {
        let timer = self.metrics.query_duration.start_timer();
        let result = self.store.find_one(collection, filter, projection).await;
        timer.observe_duration();

        match result {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Lookup on '{}' failed: {}", collection.name(), e);
                self.metrics.record_store_error();
                None
            }
        }
    }

    /// Latest version per channel for each of `slugs` on `server`.
    pub async fn up_to_date(&self, slugs: &[String], server: &str) -> Vec<UpToDate> {
        if slugs.is_empty() {
            return Vec::new();
        }

        let mut filter = Document::new();
        filter.insert(
            "$or".to_string(),
            Value::Array(
                slugs
                    .iter()
                    .map(|slug| serde_json::json!({ "slug": slug }))
                    .collect(),
            ),
        );
        filter.insert("server".to_string(), Value::from(server));

        let projection = Projection::default()
            .include("slug")
            .include("plugin_name")
            .include("versions");

        self.execute(filter, projection, "", None, None)
            .await
            .into_iter()
            .filter_map(|doc| {
                let raw = doc.get("versions").cloned()?;
                let versions: Vec<Version> = match serde_json::from_value(raw) {
                    Ok(versions) => versions,
                    Err(e) => {
                        tracing::warn!(
                            "Skipping plugin {:?} with unreadable versions: {}",
                            doc.get("slug"),
                            e
                        );
                        return None;
                    }
                };
                let Some(summary) = summarize(&versions) else {
                    tracing::debug!("Skipping plugin without versions: {:?}", doc.get("slug"));
                    return None;
                };

                Some(UpToDate {
                    slug: doc.get("slug").cloned().unwrap_or(Value::Null),
                    plugin_name: doc.get("plugin_name").cloned().unwrap_or(Value::Null),
                    versions: summary,
                })
            })
            .collect()
    }
}
