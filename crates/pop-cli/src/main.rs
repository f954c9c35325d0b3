mod logging;
mod report;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use pop_generate::{
    ConsoleOutput, EntityCache, EntityCreator, FakerValueGenerator, MemoryBackend, RunContext,
    ValueGenerator, backend::catalog_json_schema,
};
use pop_plan::{DefinitionBuilder, EntityDefaults, MAX_DEPTH, SpecError, load_instructions};
use thiserror::Error;
use uuid::Uuid;

use logging::init_logging;
use report::{RunReport, write_bytes_atomic, write_json_atomic};
use settings::{PopSettings, load_settings};

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Spec(#[from] SpecError),
    #[error("backend error: {0}")]
    Backend(#[from] pop_core::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn instruction(&self) -> Option<&str> {
        match self {
            CliError::Spec(err) => err.instruction(),
            _ => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pop", version, about = "Populate an entity backend with synthetic records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create every entity a specification file asks for.
    Run(RunArgs),
    /// Validate a specification file without creating anything.
    Check(CheckArgs),
    /// Print the JSON Schema of sandbox catalog files.
    CatalogSchema,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Sandbox catalog (YAML or JSON) describing entity types and existing rows.
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,
    /// Settings file; defaults to ./pop.toml when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Directory with default.yml and <Entity>.yml default files.
    #[arg(long, value_name = "DIR")]
    defaults_dir: Option<PathBuf>,
    /// Structured log output.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Specification file: a YAML sequence of instructions.
    spec: PathBuf,
    #[command(flatten)]
    backend: BackendArgs,
    /// Seed for every random choice of the run.
    #[arg(long)]
    seed: Option<u64>,
    /// Suppress console progress output.
    #[arg(long, short, default_value_t = false)]
    quiet: bool,
    /// Write the run summary as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Write the records created in the sandbox as JSON.
    #[arg(long, value_name = "PATH")]
    records: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Specification file: a YAML sequence of instructions.
    spec: PathBuf,
    #[command(flatten)]
    backend: BackendArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Check(args) => check(args),
        Command::CatalogSchema => print_catalog_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.instruction() {
                Some(instruction) => {
                    tracing::error!(event = "fatal", error = %err, instruction = %instruction);
                    eprintln!("error: {err}\n{instruction}");
                }
                None => {
                    tracing::error!(event = "fatal", error = %err);
                    eprintln!("error: {err}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Settings with command-line overrides applied, plus everything loaded from them.
struct Session {
    settings: PopSettings,
    backend: MemoryBackend,
    defaults: EntityDefaults,
}

fn open_session(args: &BackendArgs) -> Result<Session, CliError> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(path) = &args.catalog {
        settings.catalog = Some(path.clone());
    }
    if let Some(dir) = &args.defaults_dir {
        settings.defaults_dir = Some(dir.clone());
    }
    if let Some(path) = &args.log_file {
        settings.log_file = path.clone();
    }

    init_logging(&settings.log_file)?;

    let catalog = settings.catalog.clone().ok_or_else(|| {
        CliError::InvalidConfig("a sandbox catalog is required (--catalog)".to_string())
    })?;
    let backend = MemoryBackend::from_path(&catalog)?;
    tracing::info!(event = "catalog_loaded", path = %catalog.display());

    let defaults_dir = settings.defaults_dir();
    let defaults = if defaults_dir.is_dir() {
        tracing::info!(event = "defaults_loaded", dir = %defaults_dir.display());
        EntityDefaults::from_dir(&defaults_dir)?
    } else {
        tracing::info!(event = "defaults_missing", dir = %defaults_dir.display());
        EntityDefaults::empty()
    };

    Ok(Session {
        settings,
        backend,
        defaults,
    })
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let RunArgs {
        spec,
        backend,
        seed,
        quiet,
        report,
        records,
    } = args;

    let Session {
        mut settings,
        backend: mut api,
        defaults,
    } = open_session(&backend)?;
    if seed.is_some() {
        settings.seed = seed;
    }
    if quiet {
        settings.interactive = false;
    }
    if report.is_some() {
        settings.report = report;
    }

    let run_id = Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now();
    let timer = Instant::now();
    let seed = settings.seed.unwrap_or_else(rand::random);
    tracing::info!(event = "run_started", run_id = %run_id, spec = %spec.display(), seed);

    let instructions = load_instructions(&spec)?;
    let builder = DefinitionBuilder::new(&api, defaults)?;

    let mut entities = EntityCache::new(settings.fetch_limit);
    for (entity, filter) in &settings.entity_filters {
        entities = entities.with_default_filter(entity.clone(), filter.clone());
    }
    let generator = FakerValueGenerator::new();
    let mut output = ConsoleOutput::stdout(settings.interactive);
    let mut creator = EntityCreator::new(
        &mut api,
        &generator,
        &mut output,
        builder,
        RunContext::new(seed, entities),
    );
    creator.run(&instructions)?;
    let summary = creator.into_context().summary;

    let duration_ms = timer.elapsed().as_millis();
    tracing::info!(
        event = "run_finished",
        run_id = %run_id,
        created = summary.total_created(),
        failed = summary.total_failed(),
        duration_ms = duration_ms
    );

    if let Some(path) = &settings.report {
        let report = RunReport::new(run_id, seed, started_at, duration_ms, &summary);
        write_json_atomic(path, &report)?;
        tracing::info!(event = "report_written", path = %path.display());
    }
    if let Some(path) = &records {
        write_records(path, &api)?;
    }
    Ok(())
}

fn write_records(path: &Path, api: &MemoryBackend) -> Result<(), CliError> {
    write_bytes_atomic(path, api.created_json()?.as_bytes())?;
    tracing::info!(event = "records_written", path = %path.display());
    Ok(())
}

fn check(args: CheckArgs) -> Result<(), CliError> {
    let Session {
        backend: api,
        defaults,
        ..
    } = open_session(&args.backend)?;

    let instructions = load_instructions(&args.spec)?;
    let mut builder = DefinitionBuilder::new(&api, defaults)?;
    let generator = FakerValueGenerator::new();
    let visited = builder.check_tree(&api, &instructions, MAX_DEPTH, &|name: &str| {
        generator.supports(name)
    })?;
    tracing::info!(event = "spec_checked", spec = %args.spec.display(), definitions = visited);
    println!("{}: {visited} definitions OK", args.spec.display());
    Ok(())
}

fn print_catalog_schema() -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&catalog_json_schema())?);
    Ok(())
}
