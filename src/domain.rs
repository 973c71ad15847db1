use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModfetchError;

pub const HOST_MARKER: &str = "curseforge.com";
pub const CANONICAL_HOST: &str = "https://www.curseforge.com";

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap());

pub fn trim_reference(url: &str) -> String {
    let trimmed = url.trim();
    let without_scheme = SCHEME.replace(trimmed, "");
    without_scheme
        .trim()
        .trim_start_matches("www.")
        .trim_end_matches('/')
        .to_string()
}

pub fn is_reference_line(line: &str) -> bool {
    line.contains(HOST_MARKER)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub url: String,
    pub site_slug: String,
    pub category_slug: String,
    pub item_slug: String,
}

impl Reference {
    pub fn canonical(site_slug: &str, category_slug: &str, item_slug: &str) -> Self {
        Self {
            url: format!("{CANONICAL_HOST}/{site_slug}/{category_slug}/{item_slug}"),
            site_slug: site_slug.to_string(),
            category_slug: category_slug.to_string(),
            item_slug: item_slug.to_string(),
        }
    }

    pub fn trimmed(&self) -> String {
        trim_reference(&self.url)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl FromStr for Reference {
    type Err = ModfetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let url = value.trim();
        let trimmed = trim_reference(url);
        if !is_reference_line(&trimmed) {
            return Err(ModfetchError::InvalidReference(url.to_string()));
        }
        let segments = trimmed.split('/').map(str::trim).collect::<Vec<_>>();
        if segments.len() < 4 {
            return Err(ModfetchError::InvalidReference(url.to_string()));
        }
        let (site_slug, category_slug, item_slug) = (segments[1], segments[2], segments[3]);
        if site_slug.is_empty() || category_slug.is_empty() || item_slug.is_empty() {
            return Err(ModfetchError::InvalidReference(url.to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            site_slug: site_slug.to_string(),
            category_slug: category_slug.to_string(),
            item_slug: item_slug.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogTable {
    Sites,
    Categories,
    Items,
}

impl CatalogTable {
    pub fn kind(self) -> &'static str {
        match self {
            CatalogTable::Sites => "site",
            CatalogTable::Categories => "category",
            CatalogTable::Items => "item",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    pub reference: Reference,
    pub site_id: u64,
    pub category_id: u64,
    pub item_id: u64,
    pub item_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Release,
    Beta,
    Alpha,
}

impl ReleaseType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ReleaseType::Release),
            2 => Some(ReleaseType::Beta),
            3 => Some(ReleaseType::Alpha),
            _ => None,
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseType::Release => write!(f, "release"),
            ReleaseType::Beta => write!(f, "beta"),
            ReleaseType::Alpha => write!(f, "alpha"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationKind {
    EmbeddedLibrary,
    OptionalDependency,
    RequiredDependency,
    Tool,
    Incompatible,
    Include,
}

impl RelationKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(RelationKind::EmbeddedLibrary),
            2 => Some(RelationKind::OptionalDependency),
            3 => Some(RelationKind::RequiredDependency),
            4 => Some(RelationKind::Tool),
            5 => Some(RelationKind::Incompatible),
            6 => Some(RelationKind::Include),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DependencyDescriptor {
    pub dependent_item_id: u64,
    pub relation_kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: u64,
    pub display_name: String,
    pub file_name: String,
    pub file_date: DateTime<Utc>,
    pub file_size_bytes: u64,
    pub compatible_versions: Vec<String>,
    pub release_type: ReleaseType,
    pub download_url: Option<String>,
    pub dependencies: Vec<DependencyDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalFileObservation {
    pub file_name: String,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}
