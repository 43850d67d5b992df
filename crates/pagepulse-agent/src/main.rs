//! # pagepulse
//!
//! Replays a recorded page load through the agent and delivers its reports
//! over real HTTP.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pagepulse_agent::simulated::{PageLoadFixture, SimulatedHost};
use pagepulse_agent::Agent;
use pagepulse_core::config_manager::ConfigManager;
use pagepulse_core::ports::host::PageEvent;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// PAGEPULSE page-load replay
#[derive(Parser, Debug)]
#[command(name = "pagepulse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (JSON). Platform config dir when absent
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Recorded page load (JSON)
    #[arg(long, short = 'f')]
    fixture: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Report the recorded marks to this endpoint after load
    #[arg(long)]
    marks_endpoint: Option<String>,
}

fn load_fixture(path: &Path) -> Result<PageLoadFixture> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("malformed fixture {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "pagepulse={},pagepulse_agent={},pagepulse_core={},pagepulse_monitor={},pagepulse_network={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .map_err(|e| anyhow!("config load failed: {e}"))?;
    let config = manager.get();
    info!("config: {}", manager.config_path().display());

    let fixture = load_fixture(&args.fixture)?;
    let host = SimulatedHost::from_fixture(&fixture);

    let mut builder = Agent::builder(config, host.capabilities());
    if let Some(address) = fixture.navigation.as_ref().map(|entry| entry.name.as_str()) {
        match Url::parse(address) {
            Ok(page) => builder = builder.base_url(page),
            Err(e) => warn!("recorded page address {address} is not a URL: {e}"),
        }
    }
    let agent = builder.build();

    let tasks = agent
        .start()
        .ok_or_else(|| anyhow!("recorded host has no performance instrumentation"))?;

    host.play_page_load().await;
    let record = tasks.pipeline.await?;
    match &record {
        Some(record) => info!("base record: {}", serde_json::to_string(record)?),
        None => warn!("page view ended without a base record"),
    }

    host.play_late_resources(&fixture.late_resources);

    if let Some(endpoint) = &args.marks_endpoint {
        if let Some(outcome) = agent.report_marks(endpoint).await {
            info!("marks: {outcome:?}");
        }
    }

    host.fire(PageEvent::Hidden);
    host.disconnect_observers();
    let legacy = tasks.legacy.await?;
    let navigation = tasks.navigation.await?;
    if let Some(observer) = tasks.observer {
        observer.await?;
    }
    if let Some(buffer) = &tasks.buffer {
        info!("resource buffer cleared {} times", buffer.evictions());
    }
    info!("recorders finished: legacy {legacy:?}, navigation {navigation:?}");

    Ok(())
}
