use crate::config::{Config, StoreBackend};
use crate::error::{ConfigError, Result, StoreError};
use crate::store::{parse_seed, SqliteStore};
use std::path::Path;
use tracing::info;

/// Loads a `{collection: [documents]}` JSON file into the SQLite backend.
/// With `replace`, each imported collection is emptied first.
pub async fn run_import(config: Config, file: &Path, replace: bool) -> Result<usize> {
    if config.database.backend != StoreBackend::Sqlite {
        return Err(ConfigError::Validation(
            "import requires database.backend = \"sqlite\"".to_string(),
        )
        .into());
    }
    let path = config
        .sqlite_path()
        .ok_or_else(|| ConfigError::MissingField("database.path".to_string()))?;

    info!("Importing {} into {}", file.display(), path.display());

    let content = tokio::fs::read_to_string(file).await?;
    let seed = serde_json::from_str(&content)
        .map_err(|e| StoreError::Decode(format!("{}: {}", file.display(), e)))?;
    let collections = parse_seed(seed)?;

    let store = SqliteStore::open(&path).await?;
    let mut total = 0;
    for (collection, documents) in collections {
        if replace {
            let removed = store.clear(collection).await?;
            info!("  {}: removed {} documents", collection.name(), removed);
        }
        let inserted = store.insert_many(collection, &documents).await?;
        info!("  {}: imported {} documents", collection.name(), inserted);
        total += inserted;
    }

    info!("✓ Imported {} documents", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, DocumentStore};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn sqlite_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.database.backend = StoreBackend::Sqlite;
        config.database.path = Some(dir.join("registry.db").display().to_string());
        config
    }

    fn seed_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[tokio::test]
    async fn test_import_appends_or_replaces() {
        let dir = tempdir().unwrap();
        let config = sqlite_config(dir.path());
        let seed = seed_file(r#"{"plugins": [{"slug": "a"}, {"slug": "b"}], "geninfo": [{"_id": 1}]}"#);

        assert_eq!(run_import(config.clone(), seed.path(), false).await.unwrap(), 3);
        assert_eq!(run_import(config.clone(), seed.path(), false).await.unwrap(), 3);

        let store = SqliteStore::open(&dir.path().join("registry.db")).await.unwrap();
        assert_eq!(store.count(Collection::Plugins).await.unwrap(), 4);

        run_import(config, seed.path(), true).await.unwrap();
        assert_eq!(store.count(Collection::Plugins).await.unwrap(), 2);
        assert_eq!(store.count(Collection::Geninfo).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_import_requires_sqlite_backend() {
        let seed = seed_file(r#"{"plugins": []}"#);
        assert!(run_import(Config::default(), seed.path(), false).await.is_err());
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_seed() {
        let dir = tempdir().unwrap();
        let seed = seed_file("not json");
        assert!(run_import(sqlite_config(dir.path()), seed.path(), false)
            .await
            .is_err());
    }
}
