//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT / SIGTERM handlers before the server starts
//! - Forward the first signal into a one-slot channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Registration is eager, so a signal arriving before anyone waits on the
//!   channel is kept in the slot rather than lost
//! - A second SIGTERM/SIGINT forces an immediate exit

use std::fmt;

use tokio::sync::mpsc;

/// Exit status used when a second signal interrupts the graceful path.
const FORCED_EXIT_CODE: i32 = 1;

/// The OS signal that asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Register shutdown signal handlers and return the channel they report on.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn listen() -> std::io::Result<mpsc::Receiver<ShutdownSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let first = tokio::select! {
            _ = interrupt.recv() => ShutdownSignal::Interrupt,
            _ = terminate.recv() => ShutdownSignal::Terminate,
        };
        let _ = tx.try_send(first);

        let second = tokio::select! {
            _ = interrupt.recv() => ShutdownSignal::Interrupt,
            _ = terminate.recv() => ShutdownSignal::Terminate,
        };
        tracing::warn!(signal = %second, "Second shutdown signal received, forcing exit");
        std::process::exit(FORCED_EXIT_CODE);
    });

    Ok(rx)
}

/// Register shutdown signal handlers and return the channel they report on.
///
/// Must be called from within a Tokio runtime.
#[cfg(not(unix))]
pub fn listen() -> std::io::Result<mpsc::Receiver<ShutdownSignal>> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.try_send(ShutdownSignal::Interrupt);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second shutdown signal received, forcing exit");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    Ok(rx)
}
