use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::catalog::{DEFAULT_API_BASE, RetryPolicy};
use crate::domain::ReleaseType;
use crate::error::ModfetchError;
use crate::selector::Constraints;

pub const API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub references_file: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub cache_file: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub excluded_versions: Vec<String>,
    #[serde(default)]
    pub release_types: Option<Vec<ReleaseType>>,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub references_file: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub cache_file: Utf8PathBuf,
    pub constraints: Constraints,
    pub retry: RetryPolicy,
    pub api_base: String,
    pub api_key: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ModfetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("modfetch.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ModfetchError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ModfetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ModfetchError::ConfigParse(err.to_string()))?;

        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve_config(config, env_key)
    }

    pub fn resolve_config(
        config: Config,
        env_api_key: Option<String>,
    ) -> Result<ResolvedConfig, ModfetchError> {
        let release_types = config
            .release_types
            .unwrap_or_else(default_release_types);
        if release_types.is_empty() {
            return Err(ModfetchError::ConfigValue(
                "release_types must name at least one release type".to_string(),
            ));
        }

        let retry = match config.retry {
            Some(entry) => RetryPolicy {
                max_attempts: entry
                    .max_attempts
                    .unwrap_or(RetryPolicy::default().max_attempts),
                backoff_ms: entry.backoff_ms.unwrap_or(0),
            },
            None => RetryPolicy::default(),
        };
        if retry.max_attempts == 0 {
            return Err(ModfetchError::ConfigValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let cache_file = match config.cache_file {
            Some(path) => Utf8PathBuf::from(path),
            None => default_cache_file()?,
        };

        let api_key = env_api_key
            .or(config.api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(ResolvedConfig {
            references_file: Utf8PathBuf::from(
                config.references_file.unwrap_or_else(|| "mods.txt".to_string()),
            ),
            output_dir: Utf8PathBuf::from(config.output_dir.unwrap_or_else(|| "mods".to_string())),
            cache_file,
            constraints: Constraints::new(config.versions, config.excluded_versions, release_types),
            retry,
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key,
        })
    }
}

pub fn default_release_types() -> Vec<ReleaseType> {
    vec![ReleaseType::Release, ReleaseType::Beta, ReleaseType::Alpha]
}

fn default_cache_file() -> Result<Utf8PathBuf, ModfetchError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(
                dirs.home_dir()
                    .join(".cache")
                    .join("modfetch")
                    .join("catalog.json"),
            )
            .ok()
        })
        .ok_or_else(|| ModfetchError::Filesystem("unable to resolve cache directory".to_string()))
}
