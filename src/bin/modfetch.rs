use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use modfetch::app::{App, RunOptions, RunReport};
use modfetch::cache::JsonCacheStore;
use modfetch::catalog::CatalogHttpClient;
use modfetch::config::{ConfigLoader, ResolvedConfig};
use modfetch::dependencies::WorkList;
use modfetch::download::HttpDownloader;
use modfetch::error::ModfetchError;
use modfetch::output::{JsonOutput, OutputMode, TextOutput};
use modfetch::references::ReferenceFile;
use modfetch::resolver::{ManualFallback, NoFallback, PromptFallback};
use modfetch::run_log::RunLog;
use modfetch::selector::Constraints;

#[derive(Parser)]
#[command(name = "modfetch")]
#[command(about = "Download and update CurseForge project files listed in a reference file")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// Never prompt for project ids; unresolved references fail instead.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Print the final report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download missing files and replace outdated ones")]
    Run(RunArgs),
    #[command(about = "Report which references need an update without changing anything")]
    Check(RunArgs),
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[arg(long)]
    references: Option<String>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long, value_delimiter = ',')]
    versions: Vec<String>,

    #[arg(long = "exclude", value_delimiter = ',')]
    excluded_versions: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ModfetchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ModfetchError) -> u8 {
    match error {
        ModfetchError::MissingConfig
        | ModfetchError::ConfigRead(_)
        | ModfetchError::ConfigParse(_)
        | ModfetchError::ConfigValue(_) => 2,
        ModfetchError::CatalogHttp(_)
        | ModfetchError::CatalogExhausted { .. }
        | ModfetchError::DownloadHttp(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let (args, options) = match cli.command {
        Some(Commands::Run(args)) => (args, RunOptions { dry_run: false }),
        Some(Commands::Check(args)) => (args, RunOptions { dry_run: true }),
        None => (RunArgs::default(), RunOptions { dry_run: false }),
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    apply_overrides(&mut config, args);

    let report = if cli.non_interactive {
        execute(&config, NoFallback, options)?
    } else {
        execute(&config, PromptFallback::stdio(), options)?
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_report(&report).into_diagnostic()?,
    }
    Ok(())
}

fn apply_overrides(config: &mut ResolvedConfig, args: RunArgs) {
    if let Some(references) = args.references {
        config.references_file = Utf8PathBuf::from(references);
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = Utf8PathBuf::from(output_dir);
    }
    if !args.versions.is_empty() || !args.excluded_versions.is_empty() {
        let included = if args.versions.is_empty() {
            config.constraints.included_versions.iter().cloned().collect()
        } else {
            args.versions
        };
        let excluded = if args.excluded_versions.is_empty() {
            config.constraints.excluded_versions.iter().cloned().collect()
        } else {
            args.excluded_versions
        };
        config.constraints = Constraints::new(
            included,
            excluded,
            config.constraints.release_types.clone(),
        );
    }
}

fn execute<M: ManualFallback>(
    config: &ResolvedConfig,
    fallback: M,
    options: RunOptions,
) -> miette::Result<RunReport> {
    if config.api_key.is_none() {
        tracing::warn!("no API key configured; set CURSEFORGE_API_KEY or api_key in the config");
    }

    let references = ReferenceFile::new(config.references_file.clone());
    let work = WorkList::new(references.read()?);
    tracing::info!(
        references = work.len(),
        file = %references.path(),
        "loaded reference list"
    );

    let catalog = CatalogHttpClient::new(&config.api_base, config.api_key.as_deref(), config.retry)?;
    let downloader = HttpDownloader::new(config.retry)?;
    let mut cache = JsonCacheStore::open(&config.cache_file)?;

    let app = App::new(
        catalog,
        downloader,
        fallback,
        config.output_dir.clone(),
        config.constraints.clone(),
    );
    let log = RunLog::new();
    Ok(app.run(work, Some(&references), &mut cache, options, &log))
}
