use std::time::Instant;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::cache::CacheRepository;
use crate::catalog::CatalogClient;
use crate::decision::decide;
use crate::dependencies::{WorkList, discover_required};
use crate::domain::Reference;
use crate::download::Downloader;
use crate::error::ModfetchError;
use crate::install::{match_installed, remove_installed, scan_output_dir};
use crate::references::ReferenceFile;
use crate::resolver::{IdentifierResolver, ManualFallback};
use crate::run_log::{LogEntry, LogSink, RunLog};
use crate::selector::{Constraints, select_file};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    Ignored,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Received,
    Parsed,
    Resolved,
    FileSelected,
    DependenciesChecked,
    DecisionMade,
    Downloaded,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub reference_url: String,
    pub status: OutcomeStatus,
    pub stage: Stage,
    pub file_name: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub success: usize,
    pub ignored: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub outcomes: Vec<ProcessOutcome>,
    pub counts: OutcomeCounts,
    pub problems: Vec<LogEntry>,
    pub elapsed_ms: u128,
}

struct Processed {
    status: OutcomeStatus,
    file_name: Option<String>,
    detail: Option<String>,
}

pub struct App<C: CatalogClient, D: Downloader, M: ManualFallback> {
    catalog: C,
    downloader: D,
    fallback: M,
    output_dir: Utf8PathBuf,
    constraints: Constraints,
}

impl<C: CatalogClient, D: Downloader, M: ManualFallback> App<C, D, M> {
    pub fn new(
        catalog: C,
        downloader: D,
        fallback: M,
        output_dir: Utf8PathBuf,
        constraints: Constraints,
    ) -> Self {
        Self {
            catalog,
            downloader,
            fallback,
            output_dir,
            constraints,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn run<S: CacheRepository>(
        &self,
        mut work: WorkList,
        references: Option<&ReferenceFile>,
        cache: &mut S,
        options: RunOptions,
        log: &RunLog,
    ) -> RunReport {
        let start = Instant::now();
        let mut resolver = IdentifierResolver::new(&self.catalog, &self.fallback);
        let mut outcomes = Vec::new();

        let mut index = 0;
        while let Some(url) = work.get(index).map(str::to_string) {
            index += 1;
            log.info(format!("Initializing processing for {url}"));
            let mut stage = Stage::Received;
            let outcome = match self.process(
                &url,
                &mut stage,
                &mut resolver,
                &mut work,
                references,
                cache,
                options,
                log,
            ) {
                Ok(processed) => ProcessOutcome {
                    reference_url: url,
                    status: processed.status,
                    stage,
                    file_name: processed.file_name,
                    detail: processed.detail,
                },
                Err(err) => {
                    log.severe(format!("Failed to process {url}: {err}"));
                    ProcessOutcome {
                        reference_url: url,
                        status: OutcomeStatus::Error,
                        stage,
                        file_name: None,
                        detail: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let counts = count_outcomes(&outcomes);
        RunReport {
            dry_run: options.dry_run,
            outcomes,
            counts,
            problems: log.problems(),
            elapsed_ms: start.elapsed().as_millis(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process<S: CacheRepository>(
        &self,
        url: &str,
        stage: &mut Stage,
        resolver: &mut IdentifierResolver<'_, C, M>,
        work: &mut WorkList,
        references: Option<&ReferenceFile>,
        cache: &mut S,
        options: RunOptions,
        log: &dyn LogSink,
    ) -> Result<Processed, ModfetchError> {
        let reference: Reference = url.parse().inspect_err(|_| {
            log.warn(format!("URL could not be validated as CurseForge: {url}"));
        })?;
        *stage = Stage::Parsed;

        let item = resolver.resolve(&reference, cache, log)?;
        *stage = Stage::Resolved;

        let files = self.catalog.list_files(item.item_id, log)?;
        let selection = select_file(&item.item_name, &files, &self.constraints, log)?;
        log.info(format!(
            "Selected {} ({}) for {}",
            selection.selected.file_name, selection.selected.release_type, item.item_name
        ));
        *stage = Stage::FileSelected;

        let discovered = discover_required(resolver, &item, &selection.selected, work, cache, log);
        for dependency in discovered {
            work.push(&dependency.url);
            if options.dry_run {
                continue;
            }
            if let Some(references) = references {
                if let Err(err) = references.append(&dependency.url) {
                    log.warn(format!(
                        "could not remember {} in {}: {err}",
                        dependency.url,
                        references.path()
                    ));
                }
            }
        }
        *stage = Stage::DependenciesChecked;

        let local = scan_output_dir(&self.output_dir)?;
        let install = match_installed(&local, &selection.all_names, &selection.compatible_names);
        let decision = decide(&selection.selected, &install, &selection.compatible_names, log);
        *stage = Stage::DecisionMade;

        let file_name = Some(selection.selected.file_name.clone());
        if !decision.needs_update {
            log.info(format!("{} is up to date", item.item_name));
            *stage = Stage::Skipped;
            return Ok(Processed {
                status: OutcomeStatus::Ignored,
                file_name,
                detail: Some("up to date".to_string()),
            });
        }

        if options.dry_run {
            *stage = Stage::Skipped;
            return Ok(Processed {
                status: OutcomeStatus::Success,
                file_name,
                detail: Some("update available".to_string()),
            });
        }

        self.downloader
            .download(&selection.selected, &self.output_dir, log)?;
        let stale = decision
            .replaces
            .iter()
            .filter(|name| **name != selection.selected.file_name)
            .cloned()
            .collect::<Vec<_>>();
        remove_installed(&self.output_dir, &stale, log)?;
        *stage = Stage::Downloaded;

        Ok(Processed {
            status: OutcomeStatus::Success,
            file_name,
            detail: (!stale.is_empty()).then(|| format!("replaced {}", stale.join(", "))),
        })
    }
}

fn count_outcomes(outcomes: &[ProcessOutcome]) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Success => counts.success += 1,
            OutcomeStatus::Ignored => counts.ignored += 1,
            OutcomeStatus::Error => counts.error += 1,
        }
    }
    counts
}
