use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Multi-word keys also accept their all-lowercase spelling, which is how
/// figment hands over environment overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default, alias = "restartdelayms")]
    pub restart_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, alias = "seedpath")]
    pub seed_path: Option<String>,
    #[serde(default, alias = "querytimeoutms")]
    pub query_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "default_sort", alias = "defaultsort")]
    pub default_sort: String,
    #[serde(default = "default_cors_origin", alias = "corsalloworigin")]
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            restart_delay_ms: 0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            seed_path: None,
            query_timeout_ms: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_sort: default_sort(),
            cors_allow_origin: default_cors_origin(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9132
}

/// One worker per core, leaving a core for the rest of the machine.
fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_sort() -> String {
    "slug".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.server.restart_delay_ms)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.database.query_timeout_ms.map(Duration::from_millis)
    }

    pub fn sqlite_path(&self) -> Option<PathBuf> {
        self.database.path.as_ref().map(PathBuf::from)
    }
}
