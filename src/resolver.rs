use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::cache::{CacheRepository, InsertOutcome};
use crate::catalog::{CatalogClient, ItemSearch, SEARCH_SCAN_LIMIT};
use crate::domain::{CatalogEntry, CatalogTable, Reference, ResolvedItem};
use crate::error::ModfetchError;
use crate::run_log::LogSink;

pub const EXIT_KEYWORD: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAnswer {
    ItemId(u64),
    Abort,
}

pub trait ManualFallback {
    fn ask_item_id(&self, reference: &Reference) -> ManualAnswer;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl ManualFallback for NoFallback {
    fn ask_item_id(&self, _reference: &Reference) -> ManualAnswer {
        ManualAnswer::Abort
    }
}

pub struct PromptFallback<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl PromptFallback<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptFallback<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    pub fn into_output(self) -> Option<W> {
        self.output.into_inner().ok()
    }
}

impl<R: BufRead, W: Write> ManualFallback for PromptFallback<R, W> {
    fn ask_item_id(&self, reference: &Reference) -> ManualAnswer {
        let (Ok(mut input), Ok(mut output)) = (self.input.lock(), self.output.lock()) else {
            return ManualAnswer::Abort;
        };
        loop {
            let prompted = write!(
                output,
                "Enter the numeric project id for {reference} (or '{EXIT_KEYWORD}' to skip): "
            )
            .and_then(|()| output.flush());
            if prompted.is_err() {
                return ManualAnswer::Abort;
            }

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) | Err(_) => return ManualAnswer::Abort,
                Ok(_) => {}
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case(EXIT_KEYWORD) {
                return ManualAnswer::Abort;
            }
            match answer.parse::<u64>() {
                Ok(id) => return ManualAnswer::ItemId(id),
                Err(_) => {
                    if writeln!(output, "'{answer}' is not a numeric id").is_err() {
                        return ManualAnswer::Abort;
                    }
                }
            }
        }
    }
}

pub struct IdentifierResolver<'a, C, M> {
    catalog: &'a C,
    fallback: &'a M,
    memo: HashMap<(CatalogTable, String), CatalogEntry>,
}

impl<'a, C: CatalogClient, M: ManualFallback> IdentifierResolver<'a, C, M> {
    pub fn new(catalog: &'a C, fallback: &'a M) -> Self {
        Self {
            catalog,
            fallback,
            memo: HashMap::new(),
        }
    }

    pub fn resolve<S: CacheRepository>(
        &mut self,
        reference: &Reference,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<ResolvedItem, ModfetchError> {
        let site = self.resolve_site(&reference.site_slug, cache, log)?;
        let category = self.resolve_category(&reference.category_slug, site.id, cache, log)?;
        let item = self.resolve_item(reference, site.id, category.id, cache, log)?;
        Ok(ResolvedItem {
            reference: reference.clone(),
            site_id: site.id,
            category_id: category.id,
            item_id: item.id,
            item_name: item.name,
        })
    }

    pub fn resolve_site<S: CacheRepository>(
        &mut self,
        slug: &str,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<CatalogEntry, ModfetchError> {
        if let Some(entry) = self.remembered(CatalogTable::Sites, slug, cache, log)? {
            return Ok(entry);
        }
        let found = match self.catalog.list_sites(log) {
            Ok(sites) => sites.into_iter().find(|site| site.slug == slug),
            Err(err) => {
                log.warn(format!("(Resolver) site listing failed: {err}"));
                None
            }
        };
        self.settle(CatalogTable::Sites, slug, found, cache, log)
    }

    pub fn resolve_category<S: CacheRepository>(
        &mut self,
        slug: &str,
        site_id: u64,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<CatalogEntry, ModfetchError> {
        if let Some(entry) = self.remembered(CatalogTable::Categories, slug, cache, log)? {
            return Ok(entry);
        }
        let found = match self.catalog.list_categories(site_id, log) {
            Ok(categories) => categories.into_iter().find(|category| category.slug == slug),
            Err(err) => {
                log.warn(format!("(Resolver) category listing failed: {err}"));
                None
            }
        };
        self.settle(CatalogTable::Categories, slug, found, cache, log)
    }

    pub fn resolve_item<S: CacheRepository>(
        &mut self,
        reference: &Reference,
        site_id: u64,
        category_id: u64,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<CatalogEntry, ModfetchError> {
        let slug = reference.item_slug.as_str();
        if let Some(entry) = self.remembered(CatalogTable::Items, slug, cache, log)? {
            return Ok(entry);
        }

        let found = self
            .search_by_slug(slug, site_id, category_id, log)
            .or_else(|| {
                log.warn(format!(
                    "(Resolver) slug search missed \"{slug}\", scanning search results"
                ));
                self.scan_search(slug, site_id, category_id, log)
            })
            .or_else(|| {
                log.warn(format!(
                    "(Resolver) no catalog match for \"{slug}\", asking for the id"
                ));
                self.ask_manually(reference, log)
            });
        self.settle(CatalogTable::Items, slug, found, cache, log)
    }

    pub fn item_by_id<S: CacheRepository>(
        &mut self,
        item_id: u64,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<CatalogEntry, ModfetchError> {
        if let Some(entry) = self
            .memo
            .iter()
            .find(|((table, _), entry)| *table == CatalogTable::Items && entry.id == item_id)
            .map(|(_, entry)| entry.clone())
        {
            return Ok(entry);
        }
        if let Some(entry) = cache.find_by_id(CatalogTable::Items, item_id)? {
            log.info(format!(
                "(Cache) Retrieved item slug of {item_id} via cache: {}",
                entry.slug
            ));
            self.memo
                .insert((CatalogTable::Items, entry.slug.clone()), entry.clone());
            return Ok(entry);
        }
        let entry = self.catalog.get_item(item_id, log)?;
        self.remember(CatalogTable::Items, entry.clone(), cache, log)?;
        Ok(entry)
    }

    fn search_by_slug(
        &self,
        slug: &str,
        site_id: u64,
        category_id: u64,
        log: &dyn LogSink,
    ) -> Option<CatalogEntry> {
        let query = ItemSearch::by_slug(site_id, category_id, slug);
        match self.catalog.search_items(&query, log) {
            Ok(page) => page.entries.into_iter().find(|entry| entry.slug == slug),
            Err(err) => {
                log.warn(format!("(Resolver) slug search for \"{slug}\" failed: {err}"));
                None
            }
        }
    }

    fn scan_search(
        &self,
        slug: &str,
        site_id: u64,
        category_id: u64,
        log: &dyn LogSink,
    ) -> Option<CatalogEntry> {
        let mut index = 0u64;
        while index < SEARCH_SCAN_LIMIT {
            let query = ItemSearch::by_filter(site_id, category_id, slug, index);
            let page = match self.catalog.search_items(&query, log) {
                Ok(page) => page,
                Err(err) => {
                    log.warn(format!("(Resolver) search scan for \"{slug}\" failed: {err}"));
                    return None;
                }
            };
            let fetched = page.entries.len() as u64;
            if let Some(entry) = page.entries.into_iter().find(|entry| entry.slug == slug) {
                return Some(entry);
            }
            index += fetched;
            let exhausted = page.total_count.map(|total| index >= total).unwrap_or(false);
            if fetched == 0 || exhausted {
                break;
            }
        }
        None
    }

    fn ask_manually(&self, reference: &Reference, log: &dyn LogSink) -> Option<CatalogEntry> {
        loop {
            let item_id = match self.fallback.ask_item_id(reference) {
                ManualAnswer::ItemId(id) => id,
                ManualAnswer::Abort => {
                    log.warn(format!("(Resolver) manual lookup skipped for {reference}"));
                    return None;
                }
            };
            match self.catalog.get_item(item_id, log) {
                Ok(entry) if entry.slug == reference.item_slug => return Some(entry),
                Ok(entry) => log.warn(format!(
                    "(Resolver) project {item_id} is \"{}\", expected \"{}\"",
                    entry.slug, reference.item_slug
                )),
                Err(err) => log.warn(format!("(Resolver) project {item_id} lookup failed: {err}")),
            }
        }
    }

    fn remembered<S: CacheRepository>(
        &mut self,
        table: CatalogTable,
        slug: &str,
        cache: &S,
        log: &dyn LogSink,
    ) -> Result<Option<CatalogEntry>, ModfetchError> {
        let key = (table, slug.to_string());
        if let Some(entry) = self.memo.get(&key) {
            return Ok(Some(entry.clone()));
        }
        let Some(entry) = cache.find_by_slug(table, slug)? else {
            return Ok(None);
        };
        log.info(format!(
            "(Cache) Retrieved {} id of \"{slug}\" via cache: {}",
            table.kind(),
            entry.id
        ));
        self.memo.insert(key, entry.clone());
        Ok(Some(entry))
    }

    fn settle<S: CacheRepository>(
        &mut self,
        table: CatalogTable,
        slug: &str,
        found: Option<CatalogEntry>,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<CatalogEntry, ModfetchError> {
        match found {
            Some(entry) => {
                self.remember(table, entry.clone(), cache, log)?;
                Ok(entry)
            }
            None => {
                log.warn(format!("(Resolver) No {} found for: {slug}", table.kind()));
                Err(ModfetchError::Unresolved {
                    kind: table.kind(),
                    slug: slug.to_string(),
                })
            }
        }
    }

    fn remember<S: CacheRepository>(
        &mut self,
        table: CatalogTable,
        entry: CatalogEntry,
        cache: &mut S,
        log: &dyn LogSink,
    ) -> Result<(), ModfetchError> {
        self.memo
            .insert((table, entry.slug.clone()), entry.clone());
        match cache.insert(table, entry.clone())? {
            InsertOutcome::Inserted => log.info(format!(
                "(Cache) Saved {}, {} into {} table",
                entry.id,
                entry.slug,
                table.kind()
            )),
            InsertOutcome::AlreadyPresent => {}
            InsertOutcome::Conflict => log.warn(format!(
                "(Cache) {} {} \"{}\" clashes with a cached row; not saved",
                table.kind(),
                entry.id,
                entry.slug
            )),
        }
        Ok(())
    }
}
