use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::state::open_store;
use crate::store::Collection;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Validates `config`, opens the configured store and reports how many
/// documents each collection holds.
pub async fn run_config_check(config: Config) -> Result<BTreeMap<&'static str, usize>> {
    info!("Running configuration check...");

    crate::config::validate(&config)?;
    info!("✓ Configuration is valid");

    info!("\nServer:");
    info!("  Listen address: {}", config.listen_addr());
    info!("  Workers: {}", config.server.workers);
    info!("  Restart delay: {:?}", config.restart_delay());

    info!("\nDatabase:");
    match config.database.backend {
        StoreBackend::Memory => {
            info!("  Backend: memory");
            match &config.database.seed_path {
                Some(seed) => info!("  Seed file: {}", seed),
                None => warn!("  No seed file configured, the registry will be empty"),
            }
        }
        StoreBackend::Sqlite => {
            info!("  Backend: sqlite");
            if let Some(path) = &config.database.path {
                info!("  Path: {}", path);
            }
        }
    }
    match config.query_timeout() {
        Some(limit) => info!("  Query timeout: {:?}", limit),
        None => info!("  Query timeout: none"),
    }

    let store = open_store(&config).await?;

    info!("\n--- Collections ---");
    let mut counts = BTreeMap::new();
    for collection in Collection::ALL {
        let count = store.count(collection).await?;
        info!("  {}: {} documents", collection.name(), count);
        counts.insert(collection.name(), count);
    }

    if counts.get(Collection::Plugins.name()).copied().unwrap_or(0) == 0 {
        warn!("The plugins collection is empty");
    }

    info!("\n✓ All checks passed");
    Ok(counts)
}
