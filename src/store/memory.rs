use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::{engine, parse_seed, Collection, DocumentStore, FindQuery};
use crate::error::StoreError;
use crate::query::{Document, Projection};

/// Keeps every collection in memory, in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Value) -> Result<Self, StoreError> {
        let collections = parse_seed(seed)?.into_iter().collect::<HashMap<_, _>>();
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Connection(format!("Failed to read seed file {}: {}", path.display(), e))
        })?;
        let seed: Value = serde_json::from_str(&content)
            .map_err(|e| StoreError::Decode(format!("Invalid seed JSON: {}", e)))?;

        let store = Self::from_seed(seed)?;
        tracing::info!("Loaded seed data from {}", path.display());
        Ok(store)
    }

    pub async fn insert_many(&self, collection: Collection, documents: Vec<Document>) {
        let mut collections = self.collections.write().await;
        collections.entry(collection).or_default().extend(documents);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: Collection,
        query: FindQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let documents = collections.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(engine::run_find(documents, &query))
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, StoreError> {
        let query = FindQuery::new(filter).project(projection).limit(1);
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{project, SortSpec};
    use serde_json::json;
    use std::io::Write;

    fn seeded() -> MemoryStore {
        MemoryStore::from_seed(json!({
            "plugins": [
                {"_id": "a1", "slug": "worldedit", "server": "bukkit"},
                {"_id": "a2", "slug": "worldguard", "server": "bukkit"},
                {"_id": "a3", "slug": "worldedit", "server": "spigot"}
            ],
            "authors": [{"_id": "sk89q", "value": 2}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_with_sort_and_projection() {
        let store = seeded();
        let found = store
            .find(
                Collection::Plugins,
                FindQuery::new(json!({"server": "bukkit"}).as_object().cloned().unwrap())
                    .project(project(&["slug"]))
                    .sort(SortSpec::parse("-slug")),
            )
            .await
            .unwrap();

        assert_eq!(
            found,
            vec![
                json!({"slug": "worldguard"}).as_object().cloned().unwrap(),
                json!({"slug": "worldedit"}).as_object().cloned().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_find_one_and_missing_collection() {
        let store = seeded();
        let found = store
            .find_one(
                Collection::Plugins,
                json!({"slug": "worldedit", "server": "spigot"}).as_object().cloned().unwrap(),
                Projection::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("_id"), None);
        assert_eq!(found["server"], "spigot");

        let none = store
            .find(Collection::Webstats, FindQuery::all())
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(store.count(Collection::Webstats).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Plugins).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"categories": [{{"_id": "Fun", "value": 7}}]}}"#).unwrap();

        let store = MemoryStore::load(file.path()).await.unwrap();
        assert_eq!(store.count(Collection::Categories).await.unwrap(), 1);

        store
            .insert_many(Collection::Categories, vec![Document::new()])
            .await;
        assert_eq!(store.count(Collection::Categories).await.unwrap(), 2);
    }
}
