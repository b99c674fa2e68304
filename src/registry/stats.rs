//! Generation info and usage statistics.
//!
//! Geninfo lookups degrade like the plugin queries; the stats operations
//! hand store errors back so the HTTP layer can answer with a 500.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::RegistryService;
use crate::error::StoreError;
use crate::query::{Document, Projection, SortSpec};
use crate::store::{Collection, FindQuery};

/// Plugin and version totals over the whole registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub plugin_count: usize,
    pub version_count: usize,
}

impl RegistryService {
    /// The newest `size` generation records (1 when unset), newest first.
    pub async fn list_geninfo(&self, size: Option<u64>) -> Vec<Document> {
        let query = FindQuery::all()
            .sort(Some(SortSpec::descending("_id")))
            .limit(size.unwrap_or(1));

        self.executor()
            .find_all(Collection::Geninfo, query)
            .await
            .into_iter()
            .map(expose_id)
            .collect()
    }

    pub async fn get_geninfo(&self, id: &str) -> Option<Document> {
        let mut filter = Document::new();
        filter.insert("_id".to_string(), id_matcher(id));

        self.executor()
            .find_one_in(Collection::Geninfo, filter, Projection::everything())
            .await
            .map(expose_id)
    }

    /// Plugins still flagged with `_use_dbo`.
    pub async fn naughty_list(&self) -> Result<Vec<Document>, StoreError> {
        let mut filter = Document::new();
        filter.insert("_use_dbo".to_string(), json!({ "$exists": true }));

        let query = FindQuery::new(filter).project(
            Projection::default()
                .include("slug")
                .include("plugin_name")
                .include("authors"),
        );
        self.executor().store().find(Collection::Plugins, query).await
    }

    pub async fn todays_trends(&self) -> Result<TrendSummary, StoreError> {
        let query = FindQuery::all().project(
            Projection::everything()
                .include("slug")
                .include("versions.version"),
        );
        let plugins = self.executor().store().find(Collection::Plugins, query).await?;

        let version_count = plugins
            .iter()
            .filter_map(|p| p.get("versions").and_then(Value::as_array))
            .map(Vec::len)
            .sum();

        Ok(TrendSummary {
            plugin_count: plugins.len(),
            version_count,
        })
    }

    /// Daily web statistics for the last `days` days, without per-plugin
    /// counters.
    pub async fn trend(&self, days: u64) -> Result<Vec<Document>, StoreError> {
        self.webstats(days, Projection::default().exclude("plugins"))
            .await
    }

    /// Daily web statistics restricted to the named plugins' counters.
    pub async fn trend_for<S: AsRef<str>>(
        &self,
        days: u64,
        names: &[S],
    ) -> Result<Vec<Document>, StoreError> {
        let projection = names
            .iter()
            .fold(Projection::default().include("timestamp"), |p, name| {
                p.include(format!("plugins.{}", name.as_ref()))
            });

        self.webstats(days, projection).await
    }

    async fn webstats(
        &self,
        days: u64,
        projection: Projection,
    ) -> Result<Vec<Document>, StoreError> {
        let query = FindQuery::all()
            .project(projection)
            .sort(Some(SortSpec::descending("_id")))
            .limit(days);

        self.executor().store().find(Collection::Webstats, query).await
    }
}

fn expose_id(mut document: Document) -> Document {
    if let Some(id) = document.remove("_id") {
        document.insert("id".to_string(), id);
    }
    document
}

/// Path ids arrive as text; numeric ids are stored as numbers.
fn id_matcher(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => json!({ "$in": [id, n] }),
        Err(_) => Value::from(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Metrics;
    use crate::store::{MemoryStore, MockDocumentStore};
    use std::sync::Arc;

    fn service() -> RegistryService {
        let store = MemoryStore::from_seed(json!({
            "plugins": [
                {"_id": 1, "slug": "essentials", "plugin_name": "Essentials", "authors": ["snowleo"],
                 "_use_dbo": true, "versions": [{"version": "2.0"}, {"version": "1.9"}]},
                {"_id": 2, "slug": "dynmap", "plugin_name": "dynmap", "authors": ["mikeprimm"],
                 "versions": [{"version": "1.0"}]}
            ],
            "geninfo": [
                {"_id": 10, "parser": "bukkit", "duration": 120},
                {"_id": 11, "parser": "bukkit", "duration": 95},
                {"_id": 12, "parser": "spigot", "duration": 30}
            ],
            "webstats": [
                {"_id": 1, "timestamp": 100, "total": 5, "plugins": {"essentials": 3, "dynmap": 2}},
                {"_id": 2, "timestamp": 200, "total": 7, "plugins": {"essentials": 4, "dynmap": 3}},
                {"_id": 3, "timestamp": 300, "total": 9, "plugins": {"essentials": 6, "dynmap": 3}}
            ]
        }))
        .unwrap();

        RegistryService::new(Arc::new(store), Arc::new(Metrics::new()))
    }

    fn failing() -> RegistryService {
        let mut store = MockDocumentStore::new();
        store
            .expect_find()
            .returning(|_, _| Err(StoreError::Timeout(50)));
        RegistryService::new(Arc::new(store), Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_list_geninfo_newest_first_with_renamed_id() {
        let registry = service();

        let newest = registry.list_geninfo(None).await;
        assert_eq!(
            Value::Array(newest.into_iter().map(Value::Object).collect()),
            json!([{"id": 12, "parser": "spigot", "duration": 30}])
        );

        let two = registry.list_geninfo(Some(2)).await;
        let ids: Vec<&Value> = two.iter().map(|d| &d["id"]).collect();
        assert_eq!(ids, vec![&json!(12), &json!(11)]);
        assert!(two.iter().all(|d| d.get("_id").is_none()));
    }

    #[tokio::test]
    async fn test_get_geninfo() {
        let registry = service();

        let found = registry.get_geninfo("11").await.unwrap();
        assert_eq!(found["id"], 11);
        assert_eq!(found["duration"], 95);

        assert!(registry.get_geninfo("99").await.is_none());
        assert!(registry.get_geninfo("not-an-id").await.is_none());
    }

    #[tokio::test]
    async fn test_naughty_list() {
        let registry = service();
        let naughty = registry.naughty_list().await.unwrap();
        assert_eq!(
            Value::Object(naughty[0].clone()),
            json!({"slug": "essentials", "plugin_name": "Essentials", "authors": ["snowleo"]})
        );
        assert_eq!(naughty.len(), 1);
    }

    #[tokio::test]
    async fn test_todays_trends_counts_versions() {
        let registry = service();
        assert_eq!(
            registry.todays_trends().await.unwrap(),
            TrendSummary {
                plugin_count: 2,
                version_count: 3
            }
        );
    }

    #[tokio::test]
    async fn test_trend_drops_plugin_counters() {
        let registry = service();
        let days = registry.trend(2).await.unwrap();
        assert_eq!(
            Value::Array(days.into_iter().map(Value::Object).collect()),
            json!([{"timestamp": 300, "total": 9}, {"timestamp": 200, "total": 7}])
        );
    }

    #[tokio::test]
    async fn test_trend_for_named_plugins() {
        let registry = service();
        let days = registry.trend_for(1, &["dynmap"]).await.unwrap();
        assert_eq!(
            Value::Array(days.into_iter().map(Value::Object).collect()),
            json!([{"timestamp": 300, "plugins": {"dynmap": 3}}])
        );
    }

    #[tokio::test]
    async fn test_stats_surface_store_errors() {
        let registry = failing();
        assert!(matches!(
            registry.naughty_list().await,
            Err(StoreError::Timeout(50))
        ));
        assert!(registry.todays_trends().await.is_err());
        assert!(registry.trend(7).await.is_err());
        assert!(registry.trend_for(7, &["dynmap"]).await.is_err());

        // geninfo degrades instead
        assert!(registry.list_geninfo(Some(3)).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_geninfo_failure_is_counted() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find_one()
            .returning(|_, _, _| Err(StoreError::Connection("refused".to_string())));
        let metrics = Arc::new(Metrics::new());
        let registry = RegistryService::new(Arc::new(store), metrics.clone());

        assert!(registry.get_geninfo("10").await.is_none());
        assert_eq!(metrics.store_errors.get(), 1);
    }
}
