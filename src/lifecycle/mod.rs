//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Initialize metrics → Start server → fatal-error channel
//!
//! Wait:
//!     first of { fatal server error, SIGINT/SIGTERM }
//!
//! Shutdown (shutdown.rs):
//!     Stop accepting → Drain in-flight requests (bounded) → Terminate background tasks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → one-slot channel
//!     Second signal → forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, background tasks
//! - Shutdown always gets its own full timeout budget
//! - Every failure after startup funnels into one exit code; cleanup always runs

pub mod shutdown;
pub mod signals;
pub mod startup;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::http::{HttpServer, ServerError, ServerErrors};

pub use shutdown::{BackgroundTasks, Shutdown};
pub use signals::ShutdownSignal;

/// Process exit status for a clean shutdown.
pub const EXIT_OK: i32 = 0;
/// Process exit status when the server failed or did not drain in time.
pub const EXIT_FAILURE: i32 = 1;

/// What ended the serving phase.
#[derive(Debug)]
pub enum LifecycleEvent {
    ServerFailed(ServerError),
    Signal(ShutdownSignal),
}

impl LifecycleEvent {
    /// Exit status implied by the event alone, before shutdown runs.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleEvent::ServerFailed(_) => EXIT_FAILURE,
            LifecycleEvent::Signal(_) => EXIT_OK,
        }
    }
}

/// Wait for whichever comes first: a fatal server error or a shutdown signal.
///
/// A closed signal channel is ignored. If the error channel closes without an
/// error the server task is gone, which is reported as a failure.
pub async fn wait_for_event(
    errors: &mut ServerErrors,
    signals: &mut mpsc::Receiver<ShutdownSignal>,
) -> LifecycleEvent {
    let mut signals_open = true;
    loop {
        tokio::select! {
            error = errors.recv() => {
                return LifecycleEvent::ServerFailed(error.unwrap_or(ServerError::Stopped));
            }
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => return LifecycleEvent::Signal(signal),
                None => signals_open = false,
            },
        }
    }
}

/// Run the server until a fatal error or a signal, then shut down.
///
/// `signals` must already be registered (see [`signals::listen`]) so a signal
/// arriving during startup is not lost. Returns the process exit code.
pub async fn run(config: AppConfig, signals: mpsc::Receiver<ShutdownSignal>) -> i32 {
    startup::init_metrics(&config.observability);

    let (server, errors) = startup::start_server(&config.server);
    supervise(server, errors, signals).await
}

/// Supervise a started server: wait for a fatal error or a signal, shut the
/// server down, then terminate background tasks. Returns the exit code.
///
/// `errors` is the result of starting `server`.
pub async fn supervise(
    mut server: HttpServer,
    errors: Result<ServerErrors, ServerError>,
    mut signals: mpsc::Receiver<ShutdownSignal>,
) -> i32 {
    let background = BackgroundTasks::new();

    let event = match errors {
        Ok(mut errors) => wait_for_event(&mut errors, &mut signals).await,
        Err(e) => LifecycleEvent::ServerFailed(e),
    };

    match &event {
        LifecycleEvent::ServerFailed(error) => {
            tracing::error!(error = %error, "Server failed unexpectedly");
        }
        LifecycleEvent::Signal(signal) => {
            tracing::info!(
                signal = %signal,
                "Received OS shutdown signal, initiating graceful shutdown"
            );
        }
    }

    let mut exit_code = event.exit_code();

    if let Err(e) = server.shutdown_gracefully().await {
        tracing::error!(error = %e, "Graceful shutdown failed");
        exit_code = EXIT_FAILURE;
    }

    background.terminate();

    tracing::info!(exit_code, "Shutdown complete");
    exit_code
}
