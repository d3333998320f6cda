//! arrayflow command line runner
//!
//! Loads a pipeline file, preflights it against an empty registry and, unless
//! asked to stop after preflight, executes it and prints the report. With
//! `--preflight-only --describe` the declared (unallocated) arrays are listed.

use anyhow::Context;
use arrayflow::{
    config::{EngineSettings, PipelineFile},
    pipeline::{Pipeline, PipelineBridge, PipelineMessage, PipelineReport},
    store::Registry,
};
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "arrayflow", version, about = "Run an arrayflow pipeline file")]
struct Cli {
    /// Pipeline file (.json or .toml)
    pipeline: PathBuf,

    /// Stop after the preflight pass
    #[arg(long)]
    preflight_only: bool,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// List every array in the registry after the run
    #[arg(long)]
    describe: bool,

    /// Override the log filter from the pipeline file
    #[arg(long)]
    log_filter: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = PipelineFile::load(&cli.pipeline)
        .with_context(|| format!("Failed to load pipeline {:?}", cli.pipeline))?;
    let log_guard = init_logging(&file.settings, cli.log_filter.as_deref())?;

    tracing::info!(
        name = %file.name,
        stages = file.stages.len(),
        "Loaded pipeline {:?}",
        cli.pipeline
    );

    let (bridge, msg_tx) = PipelineBridge::new();
    let mut pipeline = Pipeline::from_file(&file)
        .context("Failed to build pipeline")?
        .with_sender(msg_tx);

    // The pipeline runs on its own thread; this one relays its messages.
    // The channel closes when the worker drops the pipeline.
    let preflight_only = cli.preflight_only;
    let worker = std::thread::spawn(move || {
        let mut registry = Registry::new();
        if preflight_only {
            return pipeline.preflight_structure(&registry);
        }
        let report = pipeline.run(&mut registry);
        (report, registry)
    });

    for msg in bridge.msg_rx.iter() {
        log_message(&msg);
    }

    let (report, registry) = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Pipeline thread panicked"))?;

    print_report(&report, cli.json)?;
    if cli.describe {
        for description in registry.describe() {
            println!("{}", description);
        }
    }

    if !report.is_success() {
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

/// Install the fmt subscriber and, when configured, a non-blocking file writer.
///
/// `RUST_LOG` wins over the command line, which wins over the pipeline file.
fn init_logging(
    settings: &EngineSettings,
    override_filter: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(override_filter.unwrap_or(&settings.log_filter))
    })?;

    let (file_layer, guard) = match &settings.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file {:?} has no file name", path))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn log_message(msg: &PipelineMessage) {
    match msg {
        PipelineMessage::PassStarted { phase, stage_count } => {
            tracing::debug!(%phase, stage_count, "Pass started");
        }
        PipelineMessage::StageStarted { index, label } => {
            tracing::info!(index, "{}", label);
        }
        PipelineMessage::Status { index, text } => tracing::info!(index, "{}", text),
        PipelineMessage::Progress { index, percent } => tracing::debug!(index, percent, "Progress"),
        PipelineMessage::Warning { index, code, text } => tracing::warn!(index, code, "{}", text),
        PipelineMessage::Error { index, code, text } => tracing::error!(index, code, "{}", text),
        PipelineMessage::StageFinished { .. } | PipelineMessage::Finished { .. } => {}
        PipelineMessage::Halted { index, cancelled } => {
            tracing::warn!(index, cancelled, "Pipeline halted");
        }
    }
}

fn print_report(report: &PipelineReport, json: bool) -> anyhow::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", text);
        return Ok(());
    }

    for outcome in &report.outcomes {
        println!(
            "[{:>2}] {:<32} {:?}{}",
            outcome.index,
            outcome.label,
            outcome.state,
            if outcome.error_code < 0 {
                format!(" ({})", outcome.error_code)
            } else {
                String::new()
            }
        );
        for message in &outcome.messages {
            println!("       {:?} {}: {}", message.level, message.code, message.text);
        }
    }
    println!("{}", report.summary());
    Ok(())
}
