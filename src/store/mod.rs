//! Document store abstraction
//!
//! The registry only needs find/sort/skip/limit primitives from its store.
//! Backends keep raw JSON documents and share the evaluation engine in
//! [`engine`], which understands the native filter and projection forms the
//! query layer produces.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::query::{Document, Projection, SortSpec};

pub mod engine;
pub mod matcher;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Plugins,
    Webstats,
    Geninfo,
    Authors,
    Categories,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Plugins,
        Collection::Webstats,
        Collection::Geninfo,
        Collection::Authors,
        Collection::Categories,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Plugins => "plugins",
            Collection::Webstats => "webstats",
            Collection::Geninfo => "geninfo",
            Collection::Authors => "authors",
            Collection::Categories => "categories",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// A `find` call: filter and projection plus the cursor modifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Projection,
    pub sort: Option<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            projection: Projection::everything(),
            sort: None,
            skip: None,
            limit: None,
        }
    }

    pub fn all() -> Self {
        Self::new(Document::new())
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(mut self, sort: Option<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: Collection,
        query: FindQuery,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, StoreError>;

    async fn count(&self, collection: Collection) -> Result<usize, StoreError>;
}

/// Wraps a store so every call fails with [`StoreError::Timeout`] once it
/// runs past `limit`.
pub struct TimeLimitedStore {
    inner: Arc<dyn DocumentStore>,
    limit: Duration,
}

impl TimeLimitedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.limit.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl DocumentStore for TimeLimitedStore {
    async fn find(
        &self,
        collection: Collection,
        query: FindQuery,
    ) -> Result<Vec<Document>, StoreError> {
        self.bounded(self.inner.find(collection, query)).await
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, StoreError> {
        self.bounded(self.inner.find_one(collection, filter, projection))
            .await
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        self.bounded(self.inner.count(collection)).await
    }
}

/// Splits a seed document `{"plugins": [...], "authors": [...]}` into
/// per-collection document lists. Unknown collection names are skipped.
pub fn parse_seed(seed: Value) -> Result<Vec<(Collection, Vec<Document>)>, StoreError> {
    let Value::Object(collections) = seed else {
        return Err(StoreError::Decode(
            "seed must be an object keyed by collection name".to_string(),
        ));
    };

    let mut parsed = Vec::new();
    for (name, documents) in collections {
        let Some(collection) = Collection::from_name(&name) else {
            tracing::warn!("Skipping unknown collection '{}' in seed data", name);
            continue;
        };

        let Value::Array(documents) = documents else {
            return Err(StoreError::Decode(format!(
                "collection '{}' must be an array of documents",
                name
            )));
        };

        let documents = documents
            .into_iter()
            .map(|doc| match doc {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::Decode(format!(
                    "collection '{}' contains a non-object document: {}",
                    name, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        parsed.push((collection, documents));
    }

    Ok(parsed)
}
