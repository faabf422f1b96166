//! Go-ETL-Pipeline HTTP service
//!
//! Entry point for the pipeline's HTTP surface, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                   ETL PIPELINE                        │
//!                   │                                                       │
//!   Client Request  │  ┌──────────┐   ┌────────────────┐   ┌────────────┐  │
//!   ────────────────┼─▶│  http    │──▶│  middleware    │──▶│  routing   │  │
//!                   │  │  server  │   │ recover / id / │   │ / /healthz │  │
//!                   │  └──────────┘   │ logger / access│   │   /panic   │  │
//!                   │       ▲         └────────────────┘   └────────────┘  │
//!                   │       │ start / shutdown                             │
//!                   │  ┌────┴───────────────────────────────────────────┐  │
//!                   │  │ lifecycle: signals ─┐                          │  │
//!                   │  │                     ├─▶ first wins ─▶ shutdown │  │
//!                   │  │ server errors ──────┘        ─▶ background tasks│  │
//!                   │  └────────────────────────────────────────────────┘  │
//!                   │  ┌─────────┐ ┌───────────────┐                       │
//!                   │  │ config  │ │ observability │                       │
//!                   │  └─────────┘ └───────────────┘                       │
//!                   └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Startup Order
//! 1. Logging (`APP_ENV`, `APP_LOG_LEVEL`)
//! 2. Configuration (`CONFIG_PATH`), fatal on failure
//! 3. Signal registration
//! 4. Server start, then wait, shutdown and exit

use std::process;

use etl_pipeline::config;
use etl_pipeline::lifecycle::{self, signals, EXIT_FAILURE};
use etl_pipeline::observability::LogSettings;

#[tokio::main]
async fn main() {
    let settings = LogSettings::from_env();
    if let Err(e) = settings.init() {
        eprintln!("failed to initialize logger: {e}");
    }

    let config = match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration data");
            process::exit(EXIT_FAILURE);
        }
    };

    tracing::info!(
        address = %config.server.bind_address(),
        shutdown_timeout = %config.server.shutdown_timeout,
        "Configuration loaded"
    );

    let signals = match signals::listen() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register signal handlers");
            process::exit(EXIT_FAILURE);
        }
    };

    let code = lifecycle::run(config, signals).await;
    process::exit(code);
}
