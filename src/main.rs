mod capture;
mod cli;
mod error;
mod watch;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use futures::TryStreamExt;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tagdrop_config::Config;
use tagdrop_intake::report::{Tally, TracingHistory};
use tagdrop_intake::template::NameTemplate;
use tagdrop_intake::{ContextStore, Pipeline, SweepEvent, SystemClock, sweep};
use tagdrop_storage::BackendHandle;
use tagdrop_storage::backend::{LocalBackend, ReadOnlyBackend};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The local offset can only be read while the process is single-threaded.
    let clock = SystemClock::local();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "{}", ErrorKind::Runtime);
            return ExitCode::FAILURE;
        },
    };
    let result = runtime.block_on(run(cli, clock));
    // Reading stdin blocks a worker thread that never comes back on its own.
    runtime.shutdown_timeout(Duration::from_secs(1));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "{}", &*e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli, clock: SystemClock) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let command = cli.command.unwrap_or_default();
    if command == Command::Check {
        return check(&config);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, shutting down");
            }
            cancel.cancel();
        }
    });

    let context = Arc::new(ContextStore::new(Arc::new(clock), config.fallback_label.clone()));
    let tally = config.statistics.then(|| Arc::new(Tally::new()));
    let pipeline = Arc::new(build_pipeline(config, context.clone(), cli.dry_run, tally.clone())?);

    match command {
        Command::Watch => {
            let config = pipeline.config();
            let capture = tokio::spawn(capture::capture(
                tokio::io::BufReader::new(tokio::io::stdin()),
                context,
                config.capture.strip_suffixes.clone(),
                config.max_name_length,
                cancel.clone(),
            ));
            let watched = watch::watch(pipeline.clone(), cancel.clone()).await;
            cancel.cancel();
            _ = capture.await;
            watched?;
        },
        Command::Sweep => run_sweep(&pipeline, &cancel).await?,
        Command::Check => {},
    }

    if let Some(tally) = tally {
        tally.log_summary();
    }
    Ok(())
}

fn build_pipeline(
    config: Config,
    context: Arc<ContextStore>,
    dry_run: bool,
    tally: Option<Arc<Tally>>,
) -> Result<Pipeline> {
    let local: BackendHandle =
        Arc::new(LocalBackend::new("output", &config.output_dir).or_raise(|| ErrorKind::Storage("output"))?);
    let backend: BackendHandle = match dry_run {
        true => {
            tracing::info!("Dry run: nothing will be moved");
            Arc::new(ReadOnlyBackend::new(local))
        },
        false => local,
    };
    let history = config.history;
    let mut pipeline = Pipeline::new(config, context, backend).or_raise(|| ErrorKind::Config)?;
    if let Some(tally) = tally {
        pipeline = pipeline.with_statistics(tally);
    }
    if history {
        pipeline = pipeline.with_history(Arc::new(TracingHistory));
    }
    Ok(pipeline)
}

async fn run_sweep(pipeline: &Pipeline, cancel: &CancellationToken) -> Result<()> {
    let intake: BackendHandle = Arc::new(
        LocalBackend::new("intake", &pipeline.config().intake_dir).or_raise(|| ErrorKind::Storage("intake"))?,
    );
    // Cancellation is handled inside the stream so in-flight files finish.
    let mut events = pin!(sweep(pipeline, &intake, cancel.clone()));
    let (mut moved, mut skipped, mut failed) = (0u64, 0u64, 0u64);
    while let Some(event) = events.try_next().await.or_raise(|| ErrorKind::Sweep)? {
        match event {
            SweepEvent::Started => tracing::debug!("Sweep started"),
            SweepEvent::DiscoveryComplete(files) => tracing::info!(files, "Sweeping intake directory"),
            SweepEvent::Processed(outcome) if outcome.is_moved() => moved += 1,
            SweepEvent::Processed(outcome) if outcome.is_skipped() => skipped += 1,
            SweepEvent::Processed(_) => failed += 1,
            SweepEvent::Complete => break,
        }
    }
    tracing::info!(moved, skipped, failed, "Sweep finished");
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let template: NameTemplate = config.template.parse::<NameTemplate>().or_raise(|| ErrorKind::Config)?;
    println!("intake_dir      = {}", config.intake_dir.display());
    println!("output_dir      = {}", config.output_dir.display());
    println!("context_ttl     = {}s", config.context_ttl);
    println!("template        = {}", template.as_str());
    println!("duplicates      = {:?}", config.duplicates);
    for category in &config.categories {
        println!("category        = {} [{}]", category.name, category.extensions.join(", "));
    }
    println!("default         = {}", config.default_category);
    println!("fallback_label  = {}", config.fallback_label);
    println!("ignored         = [{}]", config.ignored_extensions.join(", "));
    println!("excluded        = [{}]", config.excluded_extensions.join(", "));
    if let Some(path) = tagdrop_config::default_config_path() {
        println!("user config     = {}", path.display());
    }
    Ok(())
}
