use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::{CatalogEntry, DependencyDescriptor, FileRecord, RelationKind, ReleaseType};
use crate::error::ModfetchError;
use crate::run_log::LogSink;

pub const DEFAULT_API_BASE: &str = "https://api.curseforge.com/v1";
pub const PAGE_SIZE: u64 = 50;
pub const SEARCH_SCAN_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 0,
        }
    }
}

pub enum Attempt<T> {
    Done(T),
    Retry(String),
    Fatal(ModfetchError),
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff_ms == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }

    /// Runs `attempt` until it settles. `exhausted` builds the error returned
    /// once every attempt asked for a retry.
    pub fn run<T, F, E>(
        &self,
        target: &str,
        log: &dyn LogSink,
        exhausted: E,
        mut attempt: F,
    ) -> Result<T, ModfetchError>
    where
        F: FnMut(u32) -> Attempt<T>,
        E: FnOnce(u32) -> ModfetchError,
    {
        for index in 1..=self.max_attempts {
            match attempt(index) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(reason) => {
                    log.severe(format!(
                        "(Retry) attempt {index}/{} failed for {target}: {reason}",
                        self.max_attempts
                    ));
                    if index < self.max_attempts {
                        let delay = self.delay_after(index);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                }
            }
        }
        log.severe(format!(
            "(Retry) giving up on {target} after {} attempts",
            self.max_attempts
        ));
        Err(exhausted(self.max_attempts))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSearch {
    pub site_id: u64,
    pub category_id: u64,
    pub slug: Option<String>,
    pub search_filter: Option<String>,
    pub index: u64,
    pub page_size: u64,
}

impl ItemSearch {
    pub fn by_slug(site_id: u64, category_id: u64, slug: &str) -> Self {
        Self {
            site_id,
            category_id,
            slug: Some(slug.to_string()),
            search_filter: None,
            index: 0,
            page_size: PAGE_SIZE,
        }
    }

    pub fn by_filter(site_id: u64, category_id: u64, filter: &str, index: u64) -> Self {
        Self {
            site_id,
            category_id,
            slug: None,
            search_filter: Some(filter.to_string()),
            index,
            page_size: PAGE_SIZE,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("gameId", self.site_id.to_string()),
            // Top-level categories are "classes" on the catalog side.
            ("classId", self.category_id.to_string()),
            ("index", self.index.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(slug) = &self.slug {
            params.push(("slug", slug.clone()));
        }
        if let Some(filter) = &self.search_filter {
            params.push(("searchFilter", filter.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub entries: Vec<CatalogEntry>,
    pub total_count: Option<u64>,
}

pub trait CatalogClient: Send + Sync {
    fn list_sites(&self, log: &dyn LogSink) -> Result<Vec<CatalogEntry>, ModfetchError>;
    fn list_categories(
        &self,
        site_id: u64,
        log: &dyn LogSink,
    ) -> Result<Vec<CatalogEntry>, ModfetchError>;
    fn search_items(
        &self,
        query: &ItemSearch,
        log: &dyn LogSink,
    ) -> Result<SearchPage, ModfetchError>;
    fn get_item(&self, item_id: u64, log: &dyn LogSink) -> Result<CatalogEntry, ModfetchError>;
    fn list_files(&self, item_id: u64, log: &dyn LogSink)
    -> Result<Vec<FileRecord>, ModfetchError>;
}

#[derive(Debug, Deserialize)]
struct ApiList<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<ApiPagination>,
}

#[derive(Debug, Deserialize)]
struct ApiOne<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPagination {
    #[serde(default)]
    result_count: u64,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
    id: u64,
    name: String,
    slug: String,
}

impl From<ApiNamed> for CatalogEntry {
    fn from(value: ApiNamed) -> Self {
        CatalogEntry {
            id: value.id,
            slug: value.slug,
            name: value.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFile {
    id: u64,
    #[serde(default)]
    display_name: String,
    file_name: String,
    release_type: u8,
    file_date: DateTime<Utc>,
    #[serde(default)]
    file_length: u64,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    dependencies: Vec<ApiDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDependency {
    mod_id: u64,
    relation_type: u8,
}

impl ApiFile {
    pub fn into_record(self) -> Option<FileRecord> {
        let release_type = ReleaseType::from_code(self.release_type)?;
        let dependencies = self
            .dependencies
            .into_iter()
            .filter_map(|dep| {
                RelationKind::from_code(dep.relation_type).map(|relation_kind| {
                    DependencyDescriptor {
                        dependent_item_id: dep.mod_id,
                        relation_kind,
                    }
                })
            })
            .collect();
        Some(FileRecord {
            id: self.id,
            display_name: self.display_name,
            file_name: self.file_name,
            file_date: self.file_date,
            file_size_bytes: self.file_length,
            compatible_versions: self.game_versions,
            release_type,
            download_url: self.download_url.filter(|url| !url.trim().is_empty()),
            dependencies,
        })
    }
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl CatalogHttpClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        retry: RetryPolicy,
    ) -> Result<Self, ModfetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("modfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ModfetchError::CatalogHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8"));
        if let Some(api_key) = api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(api_key)
                    .map_err(|err| ModfetchError::CatalogHttp(err.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ModfetchError::CatalogHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        log: &dyn LogSink,
    ) -> Result<T, ModfetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let target = describe_target(&url, params);
        let exhausted = |attempts: u32| ModfetchError::CatalogExhausted {
            url: target.clone(),
            attempts,
        };
        self.retry.run(&target, log, exhausted, |_| {
            let response = match self.client.get(&url).query(params).send() {
                Ok(response) => response,
                Err(err) => return Attempt::Retry(err.to_string()),
            };
            let status = response.status();
            if status != StatusCode::OK {
                return Attempt::Retry(format!("status {}", status.as_u16()));
            }
            match response.json::<T>() {
                Ok(value) => Attempt::Done(value),
                Err(err) => Attempt::Fatal(ModfetchError::CatalogDecode {
                    url: target.clone(),
                    message: err.to_string(),
                }),
            }
        })
    }

    fn collect_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        log: &dyn LogSink,
    ) -> Result<Vec<T>, ModfetchError> {
        let mut items = Vec::new();
        let mut index = 0u64;
        loop {
            let mut page_params = params.to_vec();
            page_params.push(("index", index.to_string()));
            page_params.push(("pageSize", PAGE_SIZE.to_string()));
            let page: ApiList<T> = self.get_json(endpoint, &page_params, log)?;
            let fetched = page.data.len() as u64;
            items.extend(page.data);
            index += fetched;

            let total = page.pagination.as_ref().and_then(|p| p.total_count);
            let result_count = page
                .pagination
                .as_ref()
                .map(|p| p.result_count)
                .unwrap_or(fetched);
            let more = match total {
                Some(total) => index < total,
                None => result_count == PAGE_SIZE,
            };
            if fetched == 0 || !more || index >= SEARCH_SCAN_LIMIT {
                break;
            }
        }
        Ok(items)
    }
}

impl CatalogClient for CatalogHttpClient {
    fn list_sites(&self, log: &dyn LogSink) -> Result<Vec<CatalogEntry>, ModfetchError> {
        let games: Vec<ApiNamed> = self.collect_pages("games", &[], log)?;
        Ok(games.into_iter().map(CatalogEntry::from).collect())
    }

    fn list_categories(
        &self,
        site_id: u64,
        log: &dyn LogSink,
    ) -> Result<Vec<CatalogEntry>, ModfetchError> {
        let list: ApiList<ApiNamed> =
            self.get_json("categories", &[("gameId", site_id.to_string())], log)?;
        Ok(list.data.into_iter().map(CatalogEntry::from).collect())
    }

    fn search_items(
        &self,
        query: &ItemSearch,
        log: &dyn LogSink,
    ) -> Result<SearchPage, ModfetchError> {
        let list: ApiList<ApiNamed> = self.get_json("mods/search", &query.params(), log)?;
        Ok(SearchPage {
            total_count: list.pagination.and_then(|p| p.total_count),
            entries: list.data.into_iter().map(CatalogEntry::from).collect(),
        })
    }

    fn get_item(&self, item_id: u64, log: &dyn LogSink) -> Result<CatalogEntry, ModfetchError> {
        let item: ApiOne<ApiNamed> = self.get_json(&format!("mods/{item_id}"), &[], log)?;
        Ok(item.data.into())
    }

    fn list_files(
        &self,
        item_id: u64,
        log: &dyn LogSink,
    ) -> Result<Vec<FileRecord>, ModfetchError> {
        let files: Vec<ApiFile> = self.collect_pages(&format!("mods/{item_id}/files"), &[], log)?;
        let mut records = Vec::with_capacity(files.len());
        for file in files {
            let name = file.file_name.clone();
            match file.into_record() {
                Some(record) => records.push(record),
                None => log.warn(format!(
                    "(Catalog) skipping file {name} of item {item_id}: unknown release type"
                )),
            }
        }
        Ok(records)
    }
}

fn describe_target(url: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{query}")
}
