use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{CatalogEntry, CatalogTable};
use crate::error::ModfetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
    Conflict,
}

pub trait CacheRepository {
    fn find_by_slug(
        &self,
        table: CatalogTable,
        slug: &str,
    ) -> Result<Option<CatalogEntry>, ModfetchError>;
    fn find_by_id(&self, table: CatalogTable, id: u64)
    -> Result<Option<CatalogEntry>, ModfetchError>;
    fn insert(
        &mut self,
        table: CatalogTable,
        entry: CatalogEntry,
    ) -> Result<InsertOutcome, ModfetchError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    sites: Vec<CatalogEntry>,
    #[serde(default)]
    categories: Vec<CatalogEntry>,
    #[serde(default)]
    items: Vec<CatalogEntry>,
}

impl CacheDocument {
    fn table(&self, table: CatalogTable) -> &[CatalogEntry] {
        match table {
            CatalogTable::Sites => &self.sites,
            CatalogTable::Categories => &self.categories,
            CatalogTable::Items => &self.items,
        }
    }

    fn table_mut(&mut self, table: CatalogTable) -> &mut Vec<CatalogEntry> {
        match table {
            CatalogTable::Sites => &mut self.sites,
            CatalogTable::Categories => &mut self.categories,
            CatalogTable::Items => &mut self.items,
        }
    }
}

/// Cache store kept as one JSON document; every insert is written through
/// with a temp-file rename.
#[derive(Debug)]
pub struct JsonCacheStore {
    path: Utf8PathBuf,
    document: CacheDocument,
}

impl JsonCacheStore {
    pub fn open(path: &Utf8Path) -> Result<Self, ModfetchError> {
        let document = if path.as_std_path().exists() {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|err| ModfetchError::Cache(format!("read {path}: {err}")))?;
            serde_json::from_str(&content)
                .map_err(|err| ModfetchError::Cache(format!("parse {path}: {err}")))?
        } else {
            CacheDocument::default()
        };
        tracing::debug!(path = %path, "opened catalog cache");
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    pub fn len(&self, table: CatalogTable) -> usize {
        self.document.table(table).len()
    }

    fn persist(&self) -> Result<(), ModfetchError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&self.document)
            .map_err(|err| ModfetchError::Cache(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), self.path.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl CacheRepository for JsonCacheStore {
    fn find_by_slug(
        &self,
        table: CatalogTable,
        slug: &str,
    ) -> Result<Option<CatalogEntry>, ModfetchError> {
        Ok(self
            .document
            .table(table)
            .iter()
            .find(|entry| entry.slug == slug)
            .cloned())
    }

    fn find_by_id(
        &self,
        table: CatalogTable,
        id: u64,
    ) -> Result<Option<CatalogEntry>, ModfetchError> {
        Ok(self
            .document
            .table(table)
            .iter()
            .find(|entry| entry.id == id)
            .cloned())
    }

    fn insert(
        &mut self,
        table: CatalogTable,
        entry: CatalogEntry,
    ) -> Result<InsertOutcome, ModfetchError> {
        let rows = self.document.table(table);
        if rows.contains(&entry) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let clashes = rows.iter().any(|row| {
            row.id == entry.id || row.slug == entry.slug || row.name == entry.name
        });
        if clashes {
            return Ok(InsertOutcome::Conflict);
        }
        tracing::debug!(table = ?table, id = entry.id, slug = %entry.slug, "caching catalog entry");
        self.document.table_mut(table).push(entry);
        self.persist()?;
        Ok(InsertOutcome::Inserted)
    }
}
