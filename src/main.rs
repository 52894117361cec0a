//! Strategy Sync CLI
//!
//! Runs a scripted strategy session against simulated collaborators and prints
//! what happened.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use strategy_engine::OverlapPolicy;
use strategy_sync::config::AppConfig;
use strategy_sync::demo::run_demo;
use strategy_sync_core::Network;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network the wallet starts on (mainnet, polygon, arbitrum, avalanche)
    #[arg(short, long)]
    network: Option<Network>,

    /// Overlapping submission policy (allow, reject)
    #[arg(long, value_parser = parse_overlap_policy)]
    overlap_policy: Option<OverlapPolicy>,

    /// Log level (debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Include a diagnostics snapshot of the session in the report
    #[arg(long)]
    debug_strategy: bool,

    /// Milliseconds between sending and confirming the simulated transaction
    #[arg(long, default_value_t = 250)]
    confirm_delay_ms: u64,

    /// Print the Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,
}

fn parse_overlap_policy(value: &str) -> Result<OverlapPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "allow" => Ok(OverlapPolicy::Allow),
        "reject" => Ok(OverlapPolicy::Reject),
        other => Err(format!("unknown overlap policy '{other}', expected allow or reject")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(network) = args.network {
        config.network = network;
    }
    if let Some(policy) = args.overlap_policy {
        config.submission.overlap_policy = policy;
    }
    if let Some(level) = args.log_level.clone() {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;
    config.diagnostics.expose_strategy |= args.debug_strategy;

    init_tracing(&config.logging.level, config.logging.json)?;
    info!("Starting {}", strategy_sync::BUILD_INFO);

    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let metrics_handle = recorder.handle();
    metrics::set_boxed_recorder(Box::new(recorder))
        .map_err(|err| anyhow!("failed to install metrics recorder: {err}"))?;
    info!("Prometheus metrics recorder initialized");

    let report = run_demo(&config, Duration::from_millis(args.confirm_delay_ms)).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        println!("{}", metrics_handle.render());
    }

    info!("Strategy session finished");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level_filter = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let filter = EnvFilter::from_default_env().add_directive(level_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()?;
    }

    Ok(())
}
