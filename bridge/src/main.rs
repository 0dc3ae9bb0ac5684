//! gstlaunch: run a GStreamer launch description and report its bus events.

use anyhow::Context;
use clap::Parser;
use gstlaunch::config::Config;
use gstlaunch::gst::engine;
use gstlaunch::{GstLaunch, LaunchEvent, LaunchError};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run a GStreamer pipeline from a launch description
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "GSTLAUNCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Stop the pipeline after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Launch description, e.g. `audiotestsrc num-buffers=100 ! fakesink`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    description: Vec<String>,
}

/// Why the pipeline stopped running.
#[derive(Debug)]
enum Outcome {
    Eos,
    Error(String),
    Interrupted,
    TimedOut,
    Closed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(
        args.config.clone(),
        args.log_level.clone(),
        args.log_file.clone(),
    )?;
    let _log_guard = init_logging(&config)?;

    let grace_period = config.grace_period;
    engine::init_with(config).context("Failed to initialize GStreamer")?;

    let description = args.description.join(" ");
    let launch = GstLaunch::new(&description)?;

    // Subscribe before starting so no event is missed
    let events = launch.events();
    tokio::pin!(events);

    launch.start()?;
    info!("Pipeline {} started", launch.id());

    let deadline = args
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Outcome::Interrupted,
            _ = sleep_until(deadline) => break Outcome::TimedOut,
            event = events.next() => {
                let Some(event) = event else {
                    break Outcome::Closed;
                };
                report(&event, args.json)?;
                match event {
                    LaunchEvent::Eos { .. } => break Outcome::Eos,
                    LaunchEvent::Error { message, .. } => break Outcome::Error(message),
                    LaunchEvent::Closed { .. } => break Outcome::Closed,
                    LaunchEvent::StateChanged { .. } => {}
                }
            }
        }
    };
    info!("Stopping pipeline {}: {:?}", launch.id(), outcome);

    match launch.kill() {
        Ok(()) | Err(LaunchError::Closed) => {}
        Err(e) => warn!("Failed to kill pipeline: {}", e),
    }
    // Unref delay plus drain, with headroom
    if let Err(e) = launch.wait_closed(grace_period * 2 + Duration::from_secs(1)).await {
        warn!("Pipeline teardown did not finish: {}", e);
    }

    match outcome {
        Outcome::Error(message) => anyhow::bail!("Pipeline error: {}", message),
        _ => Ok(()),
    }
}

/// Install the global subscriber. The returned guard flushes the log file on
/// drop and must live until exit.
fn init_logging(
    config: &Config,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = match config.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: {}", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn report(event: &LaunchEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let LaunchEvent::Error { .. } = event {
        error!("{}", event.description());
    } else {
        info!("{}", event.description());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_collect_launch_words() {
        let args = Args::parse_from([
            "gstlaunch",
            "--timeout-secs",
            "3",
            "audiotestsrc",
            "num-buffers=5",
            "!",
            "fakesink",
        ]);
        assert_eq!(args.timeout_secs, Some(3));
        assert!(!args.json);
        assert_eq!(args.description.join(" "), "audiotestsrc num-buffers=5 ! fakesink");
    }

    #[test]
    fn test_args_require_description() {
        assert!(Args::try_parse_from(["gstlaunch", "--json"]).is_err());
    }
}
