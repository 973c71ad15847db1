use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ModfetchError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("missing config file modfetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog request to {url} failed after {attempts} attempts")]
    CatalogExhausted { url: String, attempts: u32 },

    #[error("catalog returned malformed data for {url}: {message}")]
    CatalogDecode { url: String, message: String },

    #[error("could not resolve {kind} \"{slug}\"")]
    Unresolved { kind: &'static str, slug: String },

    #[error("no compatible file found for {0}")]
    NoCompatibleFile(String),

    #[error("download failed: {0}")]
    DownloadHttp(String),

    #[error("download returned status {status}: {url}")]
    DownloadStatus { status: u16, url: String },

    #[error("cache store error: {0}")]
    Cache(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
