use std::collections::HashSet;

use serde::Serialize;

use crate::domain::FileRecord;
use crate::install::InstallMatch;
use crate::run_log::LogSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    NotInstalled,
    Ambiguous,
    NameDiffers,
    Outdated,
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDecision {
    pub needs_update: bool,
    pub reason: DecisionReason,
    pub replaces: Vec<String>,
}

impl UpdateDecision {
    fn new(needs_update: bool, reason: DecisionReason, install: &InstallMatch) -> Self {
        Self {
            needs_update,
            reason,
            replaces: if needs_update {
                install.file_names()
            } else {
                Vec::new()
            },
        }
    }
}

pub fn has_duplicate_names(names: &[String]) -> bool {
    let mut seen = HashSet::with_capacity(names.len());
    names.iter().any(|name| !seen.insert(name.as_str()))
}

pub fn decide(
    selected: &FileRecord,
    install: &InstallMatch,
    compatible_names: &[String],
    log: &dyn LogSink,
) -> UpdateDecision {
    match install.len() {
        0 => UpdateDecision::new(true, DecisionReason::NotInstalled, install),
        1 => {
            let Some(local) = install.matched.values().next() else {
                return UpdateDecision::new(true, DecisionReason::NotInstalled, install);
            };
            if has_duplicate_names(compatible_names) {
                let outdated = local.modified < selected.file_date
                    || local.size_bytes != selected.file_size_bytes;
                let reason = if outdated {
                    DecisionReason::Outdated
                } else {
                    DecisionReason::UpToDate
                };
                return UpdateDecision::new(outdated, reason, install);
            }
            if local.file_name == selected.file_name {
                UpdateDecision::new(false, DecisionReason::UpToDate, install)
            } else {
                UpdateDecision::new(true, DecisionReason::NameDiffers, install)
            }
        }
        _ => {
            log.warn(format!(
                "(Decision) several installed files match {}: {}",
                selected.file_name,
                install.file_names().join(", ")
            ));
            UpdateDecision::new(true, DecisionReason::Ambiguous, install)
        }
    }
}
