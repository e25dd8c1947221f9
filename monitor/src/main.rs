use anyhow::Context;
use clap::Parser;
use config::MonitorConfig;
use ingest::IngestRunner;
use jarcore::telemetry::IngestMetrics;
use jarcore::MonitorState;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use web::WebBridge;

mod config;
mod ingest;
mod source;
mod web;

#[derive(Parser)]
#[command(author, version, about = "Ultrasonic jar monitor: serial ingest and web dashboard")]
struct Args {
    /// Load monitor settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial device of the sensor board
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    /// Address for the HTTP dashboard
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Synthesize readings instead of opening the serial device
    #[arg(long, default_value_t = false)]
    mock: bool,
    /// Seed for the synthetic generator
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<MonitorConfig> {
        let mut config = match self.config {
            Some(path) => MonitorConfig::load(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(port) = self.port {
            config.serial_port = port;
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if self.mock {
            config.mock = true;
        }
        if self.seed.is_some() {
            config.mock_seed = self.seed;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Arc::new(Args::parse().into_config()?);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating monitor runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Arc<MonitorConfig>) -> anyhow::Result<()> {
    let state = Arc::new(MonitorState::new(config.catalog.clone(), config.log_retention));
    let metrics = Arc::new(IngestMetrics::new());
    let cancel = CancellationToken::new();

    let reading_source = tokio::task::spawn_blocking({
        let config = config.clone();
        move || source::select_source(&config)
    })
    .await
    .context("selecting reading source")?;
    let mode = reading_source.mode();
    let description = reading_source.describe();

    let runner = IngestRunner::new(
        reading_source,
        state.clone(),
        metrics.clone(),
        config.thresholds,
        config.error_backoff(),
    );
    let ingest = tokio::spawn(runner.run(cancel.clone()));

    let bridge = WebBridge::new(state, metrics, config.clone(), mode, description, cancel.clone());
    let mut server = tokio::spawn(bridge.serve());

    let served = tokio::select! {
        result = signal::ctrl_c() => {
            result.context("awaiting Ctrl+C to exit")?;
            info!("Shutdown requested");
            None
        }
        joined = &mut server => Some(joined),
    };
    cancel.cancel();

    if let Err(err) = ingest.await {
        error!("Ingest task ended abnormally: {}", err);
    }
    let joined = match served {
        Some(joined) => joined,
        None => server.await,
    };
    joined.context("joining HTTP server task")?
}
