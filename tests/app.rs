mod common;

use std::fs;

use modfetch::app::{App, OutcomeStatus, RunOptions, Stage};
use modfetch::cache::JsonCacheStore;
use modfetch::dependencies::WorkList;
use modfetch::domain::{ReleaseType, RelationKind};
use modfetch::references::ReferenceFile;
use modfetch::resolver::NoFallback;
use modfetch::run_log::RunLog;
use modfetch::selector::Constraints;

use common::{MockCatalog, MockDownloader, day, entry, file, requires, utf8_dir};

const JEI_URL: &str = "https://www.curseforge.com/minecraft/mc-mods/jei";

fn constraints() -> Constraints {
    Constraints::new(
        vec!["1.20.1".to_string()],
        vec!["Fabric".to_string()],
        vec![ReleaseType::Release, ReleaseType::Beta],
    )
}

fn jei_catalog() -> MockCatalog {
    let mut catalog = MockCatalog::minecraft();
    catalog.items = vec![entry(238222, "jei", "Just Enough Items")];
    catalog.files.insert(
        238222,
        vec![
            file(1, "X-1.0.jar", day(1), 10, &["1.20.1", "Forge"]),
            file(2, "X-2.0.jar", day(2), 20, &["1.20.1", "Forge"]),
            file(3, "X-3.0.jar", day(3), 30, &["1.21", "Forge"]),
        ],
    );
    catalog
}

fn dir_listing(dir: &std::path::Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn outdated_install_is_replaced() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("mods");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("X-1.0.jar"), vec![0u8; 10]).unwrap();
    let mut cache = JsonCacheStore::open(&utf8_dir(temp.path()).join("catalog.json")).unwrap();

    let app = App::new(
        jei_catalog(),
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&output),
        constraints(),
    );
    let log = RunLog::new();
    let report = app.run(
        WorkList::new([JEI_URL]),
        None,
        &mut cache,
        RunOptions::default(),
        &log,
    );

    assert_eq!(report.outcomes.len(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.stage, Stage::Downloaded);
    assert_eq!(outcome.file_name.as_deref(), Some("X-2.0.jar"));
    assert_eq!(app.downloader().downloads(), vec!["X-2.0.jar"]);
    assert_eq!(dir_listing(&output), vec!["X-2.0.jar"]);
    assert_eq!(report.counts.success, 1);
}

#[test]
fn current_install_is_left_alone() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("mods");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("X-2.0.jar"), vec![0u8; 20]).unwrap();
    let mut cache = JsonCacheStore::open(&utf8_dir(temp.path()).join("catalog.json")).unwrap();

    let app = App::new(
        jei_catalog(),
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&output),
        constraints(),
    );
    let log = RunLog::new();
    let report = app.run(
        WorkList::new([JEI_URL]),
        None,
        &mut cache,
        RunOptions::default(),
        &log,
    );

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Ignored);
    assert_eq!(report.outcomes[0].stage, Stage::Skipped);
    assert!(app.downloader().downloads().is_empty());
    assert_eq!(dir_listing(&output), vec!["X-2.0.jar"]);
    assert_eq!(report.counts.ignored, 1);
}

#[test]
fn malformed_references_never_reach_the_catalog() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = JsonCacheStore::open(&utf8_dir(temp.path()).join("catalog.json")).unwrap();
    let app = App::new(
        jei_catalog(),
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&temp.path().join("mods")),
        constraints(),
    );
    let log = RunLog::new();
    let report = app.run(
        WorkList::new([
            "https://www.curseforge.com/minecraft",
            "https://example.org/minecraft/mc-mods/jei",
        ]),
        None,
        &mut cache,
        RunOptions::default(),
        &log,
    );

    assert_eq!(report.counts.error, 2);
    assert!(report.outcomes.iter().all(|o| o.stage == Stage::Received));
    assert!(app.catalog().calls().is_empty());
    assert!(!report.problems.is_empty());
}

#[test]
fn failures_do_not_stop_the_batch() {
    let temp = tempfile::tempdir().unwrap();
    let mut cache = JsonCacheStore::open(&utf8_dir(temp.path()).join("catalog.json")).unwrap();
    let app = App::new(
        jei_catalog(),
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&temp.path().join("mods")),
        constraints(),
    );
    let log = RunLog::new();
    let report = app.run(
        WorkList::new([
            "https://www.curseforge.com/minecraft/mc-mods/does-not-exist",
            JEI_URL,
        ]),
        None,
        &mut cache,
        RunOptions::default(),
        &log,
    );

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Error);
    assert_eq!(report.outcomes[0].stage, Stage::Parsed);
    assert_eq!(report.outcomes[1].status, OutcomeStatus::Success);
}

#[test]
fn required_dependencies_are_queued_once() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("mods");
    let list_path = utf8_dir(temp.path()).join("mods.txt");
    fs::write(list_path.as_std_path(), format!("{JEI_URL}\n")).unwrap();
    let references = ReferenceFile::new(list_path.clone());

    let mut catalog = jei_catalog();
    catalog.hidden_items = vec![
        entry(419699, "architectury-api", "Architectury API"),
        entry(306612, "fabric-api", "Fabric API"),
    ];
    let jei_files = catalog.files.get_mut(&238222).unwrap();
    jei_files[1] = requires(
        jei_files[1].clone(),
        &[
            (419699, RelationKind::RequiredDependency),
            (306612, RelationKind::OptionalDependency),
        ],
    );
    catalog.files.insert(
        419699,
        vec![file(50, "architectury-9.2.jar", day(4), 5, &["1.20.1"])],
    );

    let app = App::new(
        catalog,
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&output),
        constraints(),
    );
    let cache_path = utf8_dir(temp.path()).join("catalog.json");

    for _ in 0..2 {
        let mut cache = JsonCacheStore::open(&cache_path).unwrap();
        let log = RunLog::new();
        let work = WorkList::new(references.read().unwrap());
        let report = app.run(work, Some(&references), &mut cache, RunOptions::default(), &log);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(
            report.outcomes[1].reference_url,
            "https://www.curseforge.com/minecraft/mc-mods/architectury-api"
        );
    }

    let lines = references.read().unwrap();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with("/architectury-api"));
    assert!(!app.catalog().calls().contains(&"get_item:306612".to_string()));
    assert_eq!(dir_listing(&output), vec!["X-2.0.jar", "architectury-9.2.jar"]);
}

#[test]
fn check_mode_changes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let output = temp.path().join("mods");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("X-1.0.jar"), vec![0u8; 10]).unwrap();
    let list_path = utf8_dir(temp.path()).join("mods.txt");
    fs::write(list_path.as_std_path(), format!("{JEI_URL}\n")).unwrap();
    let references = ReferenceFile::new(list_path);

    let mut catalog = jei_catalog();
    catalog.hidden_items = vec![entry(419699, "architectury-api", "Architectury API")];
    let jei_files = catalog.files.get_mut(&238222).unwrap();
    jei_files[1] = requires(
        jei_files[1].clone(),
        &[(419699, RelationKind::RequiredDependency)],
    );

    let mut cache = JsonCacheStore::open(&utf8_dir(temp.path()).join("catalog.json")).unwrap();
    let app = App::new(
        catalog,
        MockDownloader::default(),
        NoFallback,
        utf8_dir(&output),
        constraints(),
    );
    let log = RunLog::new();
    let report = app.run(
        WorkList::new(references.read().unwrap()),
        Some(&references),
        &mut cache,
        RunOptions { dry_run: true },
        &log,
    );

    assert!(report.dry_run);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(report.outcomes[0].detail.as_deref(), Some("update available"));
    assert!(app.downloader().downloads().is_empty());
    assert_eq!(dir_listing(&output), vec!["X-1.0.jar"]);
    assert_eq!(references.read().unwrap().len(), 1);
}
