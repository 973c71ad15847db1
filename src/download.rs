use std::fs;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::catalog::{Attempt, RetryPolicy};
use crate::domain::FileRecord;
use crate::error::ModfetchError;
use crate::run_log::LogSink;

pub const FILES_HOST: &str = "https://edge.forgecdn.net/files";

/// CDN location for files the catalog lists without a download URL.
pub fn cdn_url(file: &FileRecord) -> Result<String, ModfetchError> {
    let id = file.id.to_string();
    let split = if id.len() == 6 { 3 } else { 4.min(id.len()) };
    let (head, tail) = id.split_at(split);
    let tail = match tail.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    let mut url = Url::parse(FILES_HOST).map_err(|err| ModfetchError::DownloadHttp(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ModfetchError::DownloadHttp(format!("cannot extend {FILES_HOST}")))?
        .push(head)
        .push(tail)
        .push(&file.file_name);
    Ok(url.to_string())
}

pub fn download_url(file: &FileRecord) -> Result<String, ModfetchError> {
    match &file.download_url {
        Some(url) => Ok(url.clone()),
        None => cdn_url(file),
    }
}

pub trait Downloader: Send + Sync {
    fn download(
        &self,
        file: &FileRecord,
        output_dir: &Utf8Path,
        log: &dyn LogSink,
    ) -> Result<Utf8PathBuf, ModfetchError>;
}

#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    retry: RetryPolicy,
}

impl HttpDownloader {
    pub fn new(retry: RetryPolicy) -> Result<Self, ModfetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("modfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ModfetchError::DownloadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| ModfetchError::DownloadHttp(err.to_string()))?;
        Ok(Self { client, retry })
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        file: &FileRecord,
        output_dir: &Utf8Path,
        log: &dyn LogSink,
    ) -> Result<Utf8PathBuf, ModfetchError> {
        let url = download_url(file)?;
        log.info(format!("(Download) Downloading {}", file.file_name));

        let exhausted = |attempts: u32| {
            ModfetchError::DownloadHttp(format!("{url}: gave up after {attempts} attempts"))
        };
        let mut response = self.retry.run(&url, log, exhausted, |_| {
            match self.client.get(&url).send() {
                Ok(response) if response.status().is_success() => Attempt::Done(response),
                Ok(response) if response.status().is_client_error() => {
                    Attempt::Fatal(ModfetchError::DownloadStatus {
                        status: response.status().as_u16(),
                        url: url.clone(),
                    })
                }
                Ok(response) => Attempt::Retry(format!("status {}", response.status().as_u16())),
                Err(err) => Attempt::Retry(err.to_string()),
            }
        })?;

        fs::create_dir_all(output_dir.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".modfetch-download")
            .tempfile_in(output_dir.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| ModfetchError::DownloadHttp(format!("{url}: {err}")))?;

        let destination = output_dir.join(&file.file_name);
        if destination.as_std_path().exists() {
            fs::remove_file(destination.as_std_path())
                .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        }
        temp.persist(destination.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        log.info(format!(
            "(Download) Successfully finished download of file {}",
            file.file_name
        ));
        Ok(destination)
    }
}
