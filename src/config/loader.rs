use super::schema::{Config, StoreBackend};
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use std::path::Path;

const ENV_PREFIX: &str = "PLUGIN_REGISTRY_";

pub async fn load_from_env_or_file() -> Result<Config> {
    let config: Config = Figment::new()
        .merge(Toml::file("plugin-registry.toml"))
        .merge(Json::file("plugin-registry.json"))
        .merge(Yaml::file("plugin-registry.yaml"))
        .merge(Yaml::file("plugin-registry.yml"))
        // PLUGIN_REGISTRY_SERVER__PORT=8080
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let config = apply_env_substitutions(config)?;
    validate(&config)?;

    Ok(config)
}

pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let figment = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new().merge(Toml::file(path)),
        Some("json") => Figment::new().merge(Json::file(path)),
        Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
        _ => {
            return Err(ConfigError::Parse(
                "Unsupported config file format. Use .toml, .json, .yaml, or .yml".into(),
            )
            .into())
        }
    };

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let config = apply_env_substitutions(config)?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        return Err(ConfigError::Validation("Server port must be greater than 0".into()).into());
    }

    if config.server.workers == 0 {
        return Err(
            ConfigError::Validation("Worker count must be greater than 0".into()).into(),
        );
    }

    if config.database.backend == StoreBackend::Sqlite && config.database.path.is_none() {
        return Err(ConfigError::MissingField("database.path".into()).into());
    }

    if config.api.default_sort.trim_start_matches('-').is_empty() {
        return Err(ConfigError::Validation("Default sort field must not be empty".into()).into());
    }

    let origin = &config.api.cors_allow_origin;
    if origin.is_empty() || !origin.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ConfigError::Validation(format!(
            "CORS origin '{}' is not a valid header value",
            origin
        ))
        .into());
    }

    Ok(())
}

fn apply_env_substitutions(mut config: Config) -> Result<Config> {
    if let Some(path) = &mut config.database.path {
        *path = substitute_env_vars(path)?;
    }

    if let Some(seed) = &mut config.database.seed_path {
        *seed = substitute_env_vars(seed)?;
    }

    Ok(config)
}

fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        // ${VAR:-default}
        if let Some((name, default)) = var_name.split_once(":-") {
            match std::env::var(name) {
                Ok(value) => result = result.replace(&cap[0], &value),
                Err(_) => result = result.replace(&cap[0], default),
            }
            continue;
        }

        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                return Err(ConfigError::EnvVar(format!(
                    "Environment variable '{}' not found",
                    var_name
                ))
                .into());
            }
        }
    }

    Ok(result)
}
