use crate::config::{Config, StoreBackend};
use crate::error::{ConfigError, Result};
use crate::registry::RegistryService;
use crate::store::{DocumentStore, MemoryStore, SqliteStore, TimeLimitedStore};
use std::path::Path;
use std::sync::Arc;

pub mod metrics;

pub use metrics::Metrics;

/// Everything a worker needs to answer requests. Shared read-only between
/// workers; only the shutdown channel is ever written to.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RegistryService>,
    pub metrics: Arc<Metrics>,
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
    ) -> (Arc<Self>, tokio::sync::broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(16);

        let metrics = Arc::new(Metrics::new());
        let store = match config.query_timeout() {
            Some(limit) => Arc::new(TimeLimitedStore::new(store, limit)) as Arc<dyn DocumentStore>,
            None => store,
        };

        let state = Arc::new(Self {
            registry: Arc::new(RegistryService::new(store, metrics.clone())),
            config,
            metrics,
            shutdown_tx,
        });

        (state, shutdown_rx)
    }

    /// Opens the configured backend and builds the state around it.
    pub async fn from_config(
        config: Config,
    ) -> Result<(Arc<Self>, tokio::sync::broadcast::Receiver<()>)> {
        let store = open_store(&config).await?;
        Ok(Self::new(config, store))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        self.registry.executor().store()
    }

    pub fn subscribe_shutdown(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        // no receivers left just means every worker is already gone
        let _ = self.shutdown_tx.send(());
    }
}

/// Opens the document store named by `database.backend`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            let store = match &config.database.seed_path {
                Some(seed) => {
                    tracing::info!("Seeding in-memory store from {}", seed);
                    MemoryStore::load(Path::new(seed)).await?
                }
                None => {
                    tracing::warn!("In-memory store has no seed file, serving an empty registry");
                    MemoryStore::new()
                }
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => {
            let path = config.sqlite_path().ok_or_else(|| {
                ConfigError::MissingField("database.path".to_string())
            })?;
            Ok(Arc::new(SqliteStore::open(&path).await?))
        }
    }
}
