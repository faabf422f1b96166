//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize optional subsystems (metrics exposition)
//! - Start the HTTP server and hand back its fatal-error channel
//!
//! # Design Decisions
//! - Optional subsystems never block startup; their failures are logged
//! - Configuration is loaded and validated before this point (see `main.rs`)

use crate::config::{ObservabilityConfig, ServerConfig};
use crate::http::{HttpServer, ServerError, ServerErrors};
use crate::observability::metrics;

/// Install the Prometheus exporter if enabled. Failures are logged only.
pub fn init_metrics(config: &ObservabilityConfig) {
    if !config.metrics_enabled {
        return;
    }

    match config.metrics_address.parse() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr) {
                tracing::error!(error = %e, "Failed to install metrics exporter");
            }
        }
        Err(_) => tracing::error!(
            metrics_address = %config.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

/// Build the application server and start it in the background.
pub fn start_server(config: &ServerConfig) -> (HttpServer, Result<ServerErrors, ServerError>) {
    let mut server = HttpServer::new(config);
    let errors = server.start();
    (server, errors)
}
