use clap::Parser;
use soil_fetcher::adapters::earth_engine::{
    DisabledExporter, EarthEngineClient, EarthEngineExporter, EarthEngineSource, Exporter,
};
use soil_fetcher::adapters::email::EmailSink;
use soil_fetcher::adapters::postgres::PostgresRepository;
use soil_fetcher::adapters::webhook::WebhookSink;
use soil_fetcher::config::job_file::JobFile;
use soil_fetcher::domain::ports::{ImageSource, Repository};
use soil_fetcher::utils::{logger, validation::Validate};
use soil_fetcher::{
    Cli, DailyJob, DateWindow, FetcherError, IngestionRunner, JobConfig, LocalStorage, Notifier,
};

const INIT_FAILURE_EXIT_CODE: i32 = 3;

type Runner = IngestionRunner<EarthEngineSource, PostgresRepository, Exporter>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_loaded = match &cli.env_file {
        Some(path) => dotenvy::from_path(path).map(|_| ()),
        None => match dotenvy::dotenv() {
            Err(e) if e.not_found() => Ok(()),
            other => other.map(|_| ()),
        },
    };

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting soil-fetcher");
    if let Err(e) = env_loaded {
        fail_init(FetcherError::ConfigError {
            message: format!("cannot load env file: {}", e),
        });
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fail_init(e),
    };
    if cli.verbose {
        tracing::debug!(zone = config.zone.name(), dataset = ?config.dataset.kind, "configuration loaded");
    }

    let window = match config.end_date {
        Some(end) => DateWindow::ending_at(end, config.window_days),
        None => DateWindow::rolling(config.window_days),
    };
    let window = match window {
        Ok(window) => window,
        Err(e) => fail_init(e),
    };

    let runner = match build_runner(&config).await {
        Ok(runner) => runner,
        Err(e) => fail_init(e),
    };

    if cli.dry_run {
        return dry_run(&runner, &window).await;
    }

    let storage = LocalStorage::new(config.report_dir.clone());
    let job = DailyJob::new(runner, storage);
    let result = job.run(&window, &config.zone).await;
    let summary = &result.summary;

    println!(
        "{} {} → {}: inserted {}, already present {}, no data {}, failed {}",
        summary.zone,
        summary.start,
        summary.end,
        summary.inserted,
        summary.already_present,
        summary.no_data_available,
        summary.failed
    );
    if let Some(path) = &result.report_path {
        println!("📁 Report saved to: {}", path);
    }

    let exit_code = summary.exit_code();
    if exit_code > 0 {
        tracing::warn!(exit_code, failed = summary.failed, "run finished with failures");
        std::process::exit(exit_code);
    }

    tracing::info!("✅ Run completed successfully");
    Ok(())
}

fn load_config(cli: &Cli) -> soil_fetcher::Result<JobConfig> {
    let job_file = cli.config.as_deref().map(JobFile::from_file).transpose()?;
    let mut config = JobConfig::from_env(job_file)?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Connects every collaborator and proves the remote ends are usable.
async fn build_runner(config: &JobConfig) -> soil_fetcher::Result<Runner> {
    let client = EarthEngineClient::new(&config.earth_engine)?;
    let source = EarthEngineSource::new(
        client.clone(),
        config.dataset.clone(),
        config.classification.clone(),
    );
    source.verify(&config.zone).await.map_err(|e| FetcherError::InitializationError {
        message: format!("Earth Engine check failed: {}", e),
    })?;

    let exporter = if config.export.enabled {
        Exporter::EarthEngine(EarthEngineExporter::new(
            client,
            config.dataset.clone(),
            config.export.clone(),
        ))
    } else {
        Exporter::Disabled(DisabledExporter)
    };

    let repository = PostgresRepository::connect(&config.database, config.zone.name()).await?;
    repository.ensure_schema().await.map_err(|e| FetcherError::InitializationError {
        message: format!("cannot prepare database schema: {}", e),
    })?;

    let mut notifier = Notifier::empty();
    if let Some(webhook) = &config.webhook {
        notifier = notifier.with_sink(Box::new(WebhookSink::new(webhook)?));
    }
    if let Some(email) = &config.email {
        notifier = notifier.with_sink(Box::new(EmailSink::from_config(email)?));
    }
    if notifier.is_empty() {
        tracing::info!("no notification sinks configured");
    } else {
        tracing::info!(sinks = ?notifier.sink_names(), "notification sinks ready");
    }

    Ok(IngestionRunner::new(source, repository, exporter, notifier))
}

async fn dry_run(runner: &Runner, window: &DateWindow) -> Result<(), Box<dyn std::error::Error>> {
    match runner.plan(window).await {
        Ok(planned) => {
            for date in planned {
                let action = if date.already_present { "skip (stored)" } else { "fetch" };
                println!("{}  {}", date.date, action);
            }
            Ok(())
        }
        Err(e) => fail_init(e),
    }
}

fn fail_init(e: FetcherError) -> ! {
    tracing::error!(
        "❌ Initialization failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(INIT_FAILURE_EXIT_CODE);
}
