//! mqtt-scripts server
//!
//! Usage: `mqtt-scripts [config.yaml]`

use anyhow::Result;
use ms_bus::{LoopbackBroker, SharedBroker};
use ms_config::EngineConfig;
use ms_server::Engine;
use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.as_filter()));
    let writer = match config.log_file() {
        Some(path) => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(config.logdir.is_none())
        .with_writer(writer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "mqtt-scripts starting");

    let broker: SharedBroker = Arc::new(LoopbackBroker::new());
    info!(url = %config.url, "Using the in-process broker");

    let engine = Engine::new(config, broker);
    engine.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    engine.shutdown().await;

    Ok(())
}
