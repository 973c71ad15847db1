use std::collections::{BTreeMap, HashSet};
use std::fs;

use camino::Utf8Path;
use chrono::{DateTime, Utc};

use crate::domain::LocalFileObservation;
use crate::error::ModfetchError;
use crate::run_log::LogSink;

/// Lowercases and drops spaces, hyphens and periods, so that
/// `Just Enough Items-1.2.jar` and `justenoughitems12jar` compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn common_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let mut normalized = names.iter().map(|name| normalize_name(name.as_ref()));
    let Some(first) = normalized.next() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.chars().collect();
    for name in normalized {
        let shared = prefix
            .iter()
            .zip(name.chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.into_iter().collect()
}

pub fn scan_output_dir(dir: &Utf8Path) -> Result<Vec<LocalFileObservation>, ModfetchError> {
    if !dir.as_std_path().exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| ModfetchError::Filesystem(format!("list {dir}: {err}")))?;
    let mut observations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        let metadata = entry
            .metadata()
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        if !metadata.is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|err| ModfetchError::Filesystem(err.to_string()))?;
        observations.push(LocalFileObservation {
            file_name,
            modified,
            size_bytes: metadata.len(),
        });
    }
    observations.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(observations)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallMatch {
    pub fingerprint: String,
    pub matched: BTreeMap<String, LocalFileObservation>,
}

impl InstallMatch {
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.matched.keys().cloned().collect()
    }
}

pub fn match_installed(
    local: &[LocalFileObservation],
    all_remote_names: &[String],
    compatible_names: &[String],
) -> InstallMatch {
    let fingerprint = common_prefix(all_remote_names);
    let compatible: HashSet<&str> = compatible_names.iter().map(String::as_str).collect();
    let matched = local
        .iter()
        .filter(|observation| {
            fingerprint.is_empty() || normalize_name(&observation.file_name).starts_with(&fingerprint)
        })
        .filter(|observation| compatible.contains(observation.file_name.as_str()))
        .map(|observation| (observation.file_name.clone(), observation.clone()))
        .collect();
    InstallMatch {
        fingerprint,
        matched,
    }
}

pub fn remove_installed(
    dir: &Utf8Path,
    names: &[String],
    log: &dyn LogSink,
) -> Result<(), ModfetchError> {
    for name in names {
        let path = dir.join(name);
        fs::remove_file(path.as_std_path())
            .map_err(|err| ModfetchError::Filesystem(format!("remove {path}: {err}")))?;
        log.info(format!("(Install) Removed outdated file {name}"));
    }
    Ok(())
}
