use std::collections::HashSet;

use crate::cache::CacheRepository;
use crate::catalog::CatalogClient;
use crate::domain::{FileRecord, Reference, RelationKind, ResolvedItem, trim_reference};
use crate::resolver::{IdentifierResolver, ManualFallback};
use crate::run_log::LogSink;

#[derive(Debug, Clone, Default)]
pub struct WorkList {
    entries: Vec<String>,
    known: HashSet<String>,
}

impl WorkList {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for line in lines {
            let line: String = line.into();
            list.push(&line);
        }
        list
    }

    pub fn contains(&self, url: &str) -> bool {
        self.known.contains(&trim_reference(url))
    }

    pub fn push(&mut self, url: &str) -> bool {
        if !self.known.insert(trim_reference(url)) {
            return false;
        }
        self.entries.push(url.to_string());
        true
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn discover_required<C, M, S>(
    resolver: &mut IdentifierResolver<'_, C, M>,
    item: &ResolvedItem,
    file: &FileRecord,
    work: &WorkList,
    cache: &mut S,
    log: &dyn LogSink,
) -> Vec<Reference>
where
    C: CatalogClient,
    M: ManualFallback,
    S: CacheRepository,
{
    let mut discovered: Vec<Reference> = Vec::new();
    let required = file
        .dependencies
        .iter()
        .filter(|dep| dep.relation_kind == RelationKind::RequiredDependency)
        .filter(|dep| dep.dependent_item_id != item.item_id);

    for dependency in required {
        let entry = match resolver.item_by_id(dependency.dependent_item_id, cache, log) {
            Ok(entry) => entry,
            Err(err) => {
                log.warn(format!(
                    "(Dependencies) could not resolve dependency {} of {}: {err}",
                    dependency.dependent_item_id, item.reference
                ));
                continue;
            }
        };
        let reference = Reference::canonical(
            &item.reference.site_slug,
            &item.reference.category_slug,
            &entry.slug,
        );
        let trimmed = reference.trimmed();
        let already_found = discovered.iter().any(|other| other.trimmed() == trimmed);
        if work.contains(&reference.url) || already_found {
            continue;
        }
        log.info(format!(
            "(Dependencies) {} requires {}, queueing {}",
            item.item_name, entry.name, reference.url
        ));
        discovered.push(reference);
    }
    discovered
}
