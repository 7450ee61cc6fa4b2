use clap::{Parser, Subcommand};
use slr_sweep::config::{EnrichmentStrategy, ExperimentConfig, TopicStrategy};
use slr_sweep::metrics::MetricsCollector;
use slr_sweep::models::BuiltinModels;
use slr_sweep::notify::LogNotifier;
use slr_sweep::retrieval::{load_evaluator, Retriever, RetryPolicy, ScopusClient};
use slr_sweep::store::{SlrImport, Store};
use slr_sweep::sweep::{SweepContext, SweepController};
use slr_sweep::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "slr-sweep")]
#[command(about = "Search string sweeps for systematic literature reviews")]
struct Args {
    /// SQLite database file
    #[arg(long, env = "SLR_SWEEP_DATABASE", default_value = "./slr-sweep.db", global = true)]
    database: PathBuf,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write a daily log file to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Experiment config files
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Systematic literature reviews
    Slr {
        #[command(subcommand)]
        action: SlrCommand,
    },
    /// Generate search strings
    Experiment {
        #[command(subcommand)]
        action: ExperimentCommand,
    },
    /// Run search strings against Scopus
    Search {
        #[command(subcommand)]
        action: SearchCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file
    Init {
        #[arg(default_value = "config.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SlrCommand {
    /// Import a review and its gold set from JSON
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ExperimentCommand {
    /// Create (or resume) an experiment and sweep the configured parameters
    Start {
        slr: String,
        name: String,
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        #[arg(short = 't', long = "topic-strategy", value_enum, default_values = ["bertopic", "lda"])]
        topic_strategies: Vec<TopicStrategy>,
        #[arg(short = 'e', long = "enrichment-strategy", value_enum, default_values = ["bert", "ollama"])]
        enrichment_strategies: Vec<EnrichmentStrategy>,
    },
    /// Units, strings and scoring progress of an experiment
    Status { name: String },
}

#[derive(Subcommand, Debug)]
enum SearchCommand {
    /// Score the experiment's strings that lack a performance record
    Run {
        experiment: String,
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Re-check zero-result strings and mark malformed ones
    Recheck {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "slr-sweep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry.with(fmt::layer().with_ansi(false).with_writer(writer)).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_tracing(args.verbose, args.log_dir.as_deref());

    info!("🚀 slr-sweep {}", env!("CARGO_PKG_VERSION"));
    info!("📁 Database: {}", args.database.display());

    // Every unit of work commits atomically, so an interrupt loses nothing.
    let result = tokio::select! {
        r = run(args) => r,
        _ = tokio::signal::ctrl_c() => {
            warn!("⚠️  Interrupted; re-run the same command to resume");
            return ExitCode::from(130);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Config { action: ConfigCommand::Init { path, force } } => config_init(&path, force),
        Command::Slr { action: SlrCommand::Import { file } } => slr_import(&args.database, &file),
        Command::Experiment { action } => match action {
            ExperimentCommand::Start { slr, name, config, topic_strategies, enrichment_strategies } => {
                experiment_start(&args.database, &slr, &name, &config, &topic_strategies, &enrichment_strategies).await
            }
            ExperimentCommand::Status { name } => experiment_status(&args.database, &name),
        },
        Command::Search { action } => match action {
            SearchCommand::Run { experiment, config } => search_run(&args.database, &experiment, &config).await,
            SearchCommand::Recheck { config } => search_recheck(&args.database, &config).await,
        },
    }
}

fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!("{} already exists (use --force)", path.display())));
    }
    ExperimentConfig::create_default().to_toml(path)?;
    info!("📝 Wrote default config to {}", path.display());
    Ok(())
}

fn slr_import(database: &Path, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let import: SlrImport = serde_json::from_str(&content)?;
    let store = Store::open(database)?;
    let summary = store.import_slr(&import)?;
    info!(
        "✅ Imported SLR '{}' (#{}) with {} studies and {} citations",
        import.name, summary.slr_id, summary.studies, summary.citations
    );
    if summary.dangling_references > 0 {
        warn!("⚠️  {} references point outside the gold set and were skipped", summary.dangling_references);
    }
    Ok(())
}

async fn experiment_start(
    database: &Path,
    slr_name: &str,
    name: &str,
    config_path: &Path,
    topic_strategies: &[TopicStrategy],
    enrichment_strategies: &[EnrichmentStrategy],
) -> Result<()> {
    let config = ExperimentConfig::from_toml(config_path)?;
    info!("⚙️  Config: {}", config_path.display());

    let store = Arc::new(Store::open(database)?);
    let slr = store.slr_by_name(slr_name)?;
    info!("📚 Found GS with size {}", store.studies_for_slr(slr.id)?.len());

    let (experiment, created) = store.get_or_create_experiment(name, slr.id, &mut rand::thread_rng())?;
    let qgs = store.qgs_for_experiment(experiment.id)?;
    if created {
        info!("🆕 Created experiment '{}' with a QGS of {} studies", experiment.name, qgs.len());
    } else {
        info!("♻️  Resuming experiment '{}' (QGS of {} studies)", experiment.name, qgs.len());
    }
    for study in &qgs {
        info!("   Study(id={}, title=\"{}\")", study.id, study.title);
    }

    let topic_names: Vec<&str> = topic_strategies.iter().map(|s| s.as_str()).collect();
    let enrichment_names: Vec<&str> = enrichment_strategies.iter().map(|s| s.as_str()).collect();
    info!("🧪 Topic strategies: {:?}, enrichment strategies: {:?}", topic_names, enrichment_names);

    let ctx = SweepContext::load(&store, experiment)?;
    let metrics = Arc::new(MetricsCollector::new());
    let provider = Arc::new(BuiltinModels::new(config.models.clone())?);
    let controller = SweepController::new(
        store.clone(),
        provider,
        Arc::new(LogNotifier),
        metrics.clone(),
        RetryPolicy::from(&config.models),
    );

    let report = controller.run(&ctx, &config, topic_strategies, enrichment_strategies).await?;
    metrics.log_summary();

    if !report.failed_pairs.is_empty() {
        for failed in &report.failed_pairs {
            error!(
                "   {} with {}: {}",
                failed.topic_strategy.as_str(),
                failed.enrichment_strategy.as_str(),
                failed.message
            );
        }
        return Err(Error::model(
            "sweep",
            format!("{} strategy pairs did not finish; re-run to resume", report.failed_pairs.len()),
        ));
    }
    Ok(())
}

fn experiment_status(database: &Path, name: &str) -> Result<()> {
    let store = Store::open(database)?;
    let experiment = store.experiment_by_name(name)?;
    let status = store.experiment_status(experiment.id)?;
    info!(
        "📊 '{}': {} units, {} strings, {} scored ({} invalid), {} pending",
        experiment.name, status.units, status.strings, status.scored, status.invalid, status.pending
    );
    Ok(())
}

async fn search_run(database: &Path, experiment_name: &str, config_path: &Path) -> Result<()> {
    let config = ExperimentConfig::from_toml(config_path)?;
    let store = Arc::new(Store::open(database)?);
    let experiment = store.experiment_by_name(experiment_name)?;
    let evaluator = load_evaluator(&store, &experiment, config.evaluation.snowball_max_hops)?;

    let client = Arc::new(ScopusClient::new(config.scopus_api_keys.clone(), &config.retrieval)?);
    let metrics = Arc::new(MetricsCollector::new());
    let retriever = Retriever::new(
        store,
        client,
        Arc::new(LogNotifier),
        metrics.clone(),
        RetryPolicy::from(&config.retrieval),
    );

    let report = retriever.run(experiment.id, &evaluator).await?;
    metrics.log_summary();
    info!("✅ Scored {} strings ({} invalid)", report.scored + report.invalid, report.invalid);
    Ok(())
}

async fn search_recheck(database: &Path, config_path: &Path) -> Result<()> {
    let config = ExperimentConfig::from_toml(config_path)?;
    let store = Arc::new(Store::open(database)?);
    let client = Arc::new(ScopusClient::new(config.scopus_api_keys.clone(), &config.retrieval)?);
    let retriever = Retriever::new(
        store,
        client,
        Arc::new(LogNotifier),
        Arc::new(MetricsCollector::new()),
        RetryPolicy::from(&config.retrieval),
    );

    let fixed = retriever.recheck_zero_results().await?;
    info!("✅ Marked {} strings as invalid", fixed);
    Ok(())
}
