// Main

mod amf;
mod config;
mod connection;
mod error;
mod log;
mod relay;
mod rtmp;
mod server;
mod status;

use config::RelayConfiguration;
use log::{LogConfig, Logger};
use relay::RelaySupervisor;

use crate::log_info;

/// Main function
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: rtmp-relay <config.yaml>");
            std::process::exit(1);
        }
    };

    // A plain info-level logger bootstraps config loading; once the
    // config's `log.level` is known the real logger replaces it.
    let bootstrap_logger = Logger::new(LogConfig::from_level(2, ""));

    let config = match RelayConfiguration::load_from_file(&config_path, &bootstrap_logger) {
        Ok(c) => c,
        Err(_) => {
            std::process::exit(1);
        }
    };

    let logger = Logger::new(LogConfig::from_level(config.log_level, ""));

    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log_info!(logger, format!("RTMP Relay (Rust Implementation) ({VERSION})"));

    let supervisor = RelaySupervisor::new(config, logger.make_child_logger("[RELAY] "));
    supervisor.run().await;

    Ok(())
}
