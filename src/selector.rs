use std::collections::BTreeSet;

use crate::domain::{FileRecord, ReleaseType};
use crate::error::ModfetchError;
use crate::run_log::LogSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub included_versions: BTreeSet<String>,
    pub excluded_versions: BTreeSet<String>,
    pub release_types: Vec<ReleaseType>,
}

impl Constraints {
    pub fn new(
        included: impl IntoIterator<Item = String>,
        excluded: impl IntoIterator<Item = String>,
        release_types: Vec<ReleaseType>,
    ) -> Self {
        Self {
            included_versions: included.into_iter().map(|tag| normalize_tag(&tag)).collect(),
            excluded_versions: excluded.into_iter().map(|tag| normalize_tag(&tag)).collect(),
            release_types,
        }
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

pub fn versions_compatible(
    tags: &[String],
    included: &BTreeSet<String>,
    excluded: &BTreeSet<String>,
) -> bool {
    let tags = tags.iter().map(|tag| normalize_tag(tag)).collect::<Vec<_>>();
    if tags.iter().any(|tag| excluded.contains(tag)) {
        return false;
    }
    included.is_empty() || tags.iter().any(|tag| included.contains(tag))
}

pub fn is_compatible(file: &FileRecord, allowed: &[ReleaseType], constraints: &Constraints) -> bool {
    allowed.contains(&file.release_type)
        && versions_compatible(
            &file.compatible_versions,
            &constraints.included_versions,
            &constraints.excluded_versions,
        )
}

/// Most recent compatible file under `allowed`. On equal dates the later
/// file in iteration order wins.
pub fn latest_compatible<'a>(
    files: &'a [FileRecord],
    allowed: &[ReleaseType],
    constraints: &Constraints,
) -> Option<&'a FileRecord> {
    let mut latest: Option<&FileRecord> = None;
    for file in files {
        if !is_compatible(file, allowed, constraints) {
            continue;
        }
        if latest.is_none_or(|current| file.file_date >= current.file_date) {
            latest = Some(file);
        }
    }
    latest
}

pub fn select_with_relaxation<'a>(
    files: &'a [FileRecord],
    constraints: &Constraints,
) -> Option<&'a FileRecord> {
    constraints
        .release_types
        .iter()
        .find_map(|release_type| latest_compatible(files, &[*release_type], constraints))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub selected: FileRecord,
    pub all_names: Vec<String>,
    pub compatible_names: Vec<String>,
}

pub fn select_file(
    item_label: &str,
    files: &[FileRecord],
    constraints: &Constraints,
    log: &dyn LogSink,
) -> Result<FileSelection, ModfetchError> {
    let Some(selected) = select_with_relaxation(files, constraints) else {
        log.severe(format!(
            "(Selector) no compatible file for {item_label} among {} files",
            files.len()
        ));
        return Err(ModfetchError::NoCompatibleFile(item_label.to_string()));
    };
    if constraints.release_types.first() != Some(&selected.release_type) {
        log.info(format!(
            "(Selector) {item_label}: falling back to {} file {}",
            selected.release_type, selected.file_name
        ));
    }

    let compatible_names = files
        .iter()
        .filter(|file| is_compatible(file, &constraints.release_types, constraints))
        .map(|file| file.file_name.clone())
        .collect();
    Ok(FileSelection {
        selected: selected.clone(),
        all_names: files.iter().map(|file| file.file_name.clone()).collect(),
        compatible_names,
    })
}
