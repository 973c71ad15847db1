#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};

use modfetch::catalog::{CatalogClient, ItemSearch, SearchPage};
use modfetch::domain::{
    CatalogEntry, DependencyDescriptor, FileRecord, Reference, RelationKind, ReleaseType,
};
use modfetch::download::Downloader;
use modfetch::error::ModfetchError;
use modfetch::resolver::{ManualAnswer, ManualFallback};
use modfetch::run_log::LogSink;

pub const MINECRAFT: u64 = 432;
pub const MC_MODS: u64 = 6;

pub fn entry(id: u64, slug: &str, name: &str) -> CatalogEntry {
    CatalogEntry {
        id,
        slug: slug.to_string(),
        name: name.to_string(),
    }
}

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()
}

pub fn file(id: u64, name: &str, date: DateTime<Utc>, size: u64, tags: &[&str]) -> FileRecord {
    FileRecord {
        id,
        display_name: name.to_string(),
        file_name: name.to_string(),
        file_date: date,
        file_size_bytes: size,
        compatible_versions: tags.iter().map(|tag| tag.to_string()).collect(),
        release_type: ReleaseType::Release,
        download_url: None,
        dependencies: Vec::new(),
    }
}

pub fn requires(mut record: FileRecord, deps: &[(u64, RelationKind)]) -> FileRecord {
    record.dependencies = deps
        .iter()
        .map(|(id, kind)| DependencyDescriptor {
            dependent_item_id: *id,
            relation_kind: *kind,
        })
        .collect();
    record
}

pub fn reference(slug: &str) -> Reference {
    Reference::canonical("minecraft", "mc-mods", slug)
}

pub fn utf8_dir(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// In-memory catalog that records every call it receives.
#[derive(Default)]
pub struct MockCatalog {
    pub sites: Vec<CatalogEntry>,
    pub categories: Vec<CatalogEntry>,
    /// Found by the slug search.
    pub items: Vec<CatalogEntry>,
    /// Only reachable through the paged search scan.
    pub scan_items: Vec<CatalogEntry>,
    /// Only reachable by id.
    pub hidden_items: Vec<CatalogEntry>,
    pub files: HashMap<u64, Vec<FileRecord>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn minecraft() -> Self {
        Self {
            sites: vec![entry(1, "wow", "World of Warcraft"), entry(MINECRAFT, "minecraft", "Minecraft")],
            categories: vec![
                entry(12, "texture-packs", "Resource Packs"),
                entry(MC_MODS, "mc-mods", "Mods"),
            ],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn exhausted(endpoint: &str) -> ModfetchError {
        ModfetchError::CatalogExhausted {
            url: endpoint.to_string(),
            attempts: 5,
        }
    }
}

impl CatalogClient for MockCatalog {
    fn list_sites(&self, _log: &dyn LogSink) -> Result<Vec<CatalogEntry>, ModfetchError> {
        self.record("list_sites".to_string());
        Ok(self.sites.clone())
    }

    fn list_categories(
        &self,
        site_id: u64,
        _log: &dyn LogSink,
    ) -> Result<Vec<CatalogEntry>, ModfetchError> {
        self.record(format!("list_categories:{site_id}"));
        Ok(self.categories.clone())
    }

    fn search_items(
        &self,
        query: &ItemSearch,
        _log: &dyn LogSink,
    ) -> Result<SearchPage, ModfetchError> {
        if let Some(slug) = &query.slug {
            self.record(format!("search_slug:{slug}"));
            return Ok(SearchPage {
                entries: self
                    .items
                    .iter()
                    .filter(|item| &item.slug == slug)
                    .cloned()
                    .collect(),
                total_count: None,
            });
        }
        let filter = query.search_filter.clone().unwrap_or_default();
        self.record(format!("search_scan:{filter}:{}", query.index));
        let start = (query.index as usize).min(self.scan_items.len());
        let end = (start + query.page_size as usize).min(self.scan_items.len());
        Ok(SearchPage {
            entries: self.scan_items[start..end].to_vec(),
            total_count: Some(self.scan_items.len() as u64),
        })
    }

    fn get_item(&self, item_id: u64, _log: &dyn LogSink) -> Result<CatalogEntry, ModfetchError> {
        self.record(format!("get_item:{item_id}"));
        self.items
            .iter()
            .chain(&self.scan_items)
            .chain(&self.hidden_items)
            .find(|item| item.id == item_id)
            .cloned()
            .ok_or_else(|| Self::exhausted("mods"))
    }

    fn list_files(
        &self,
        item_id: u64,
        _log: &dyn LogSink,
    ) -> Result<Vec<FileRecord>, ModfetchError> {
        self.record(format!("list_files:{item_id}"));
        self.files
            .get(&item_id)
            .cloned()
            .ok_or_else(|| Self::exhausted("files"))
    }
}

/// Writes `file_size_bytes` zero bytes under the declared name.
#[derive(Default)]
pub struct MockDownloader {
    pub downloads: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

impl Downloader for MockDownloader {
    fn download(
        &self,
        file: &FileRecord,
        output_dir: &Utf8Path,
        _log: &dyn LogSink,
    ) -> Result<Utf8PathBuf, ModfetchError> {
        std::fs::create_dir_all(output_dir.as_std_path()).unwrap();
        let path = output_dir.join(&file.file_name);
        std::fs::write(path.as_std_path(), vec![0u8; file.file_size_bytes as usize]).unwrap();
        self.downloads.lock().unwrap().push(file.file_name.clone());
        Ok(path)
    }
}

/// Replays canned answers, then gives up.
#[derive(Default)]
pub struct ScriptedFallback {
    pub answers: Mutex<VecDeque<ManualAnswer>>,
    pub asked: Mutex<usize>,
}

impl ScriptedFallback {
    pub fn new(answers: Vec<ManualAnswer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Mutex::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

impl ManualFallback for ScriptedFallback {
    fn ask_item_id(&self, _reference: &Reference) -> ManualAnswer {
        *self.asked.lock().unwrap() += 1;
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ManualAnswer::Abort)
    }
}

/// Loopback HTTP server that answers each connection with the next scripted
/// reply and closes. Once the script runs out the listener is dropped, so
/// further requests fail to connect.
pub struct FixtureServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn start(replies: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for (status, body) in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    head.push_str(&line);
                }
                seen.lock().unwrap().push(head);
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status} Fixture\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
            }
        });
        Self { base_url, requests }
    }

    /// Raw request heads, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}
