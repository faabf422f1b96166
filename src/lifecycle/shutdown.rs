//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that long-running tasks subscribe to. The
/// signal fires at most once; later triggers are no-ops.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Set by the first trigger.
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    ///
    /// Subscribe before the trigger can fire; a receiver created afterwards
    /// only sees [`is_triggered`](Self::is_triggered).
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Returns `true` for the first call only.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for background work that must stop after the HTTP server.
///
/// Pipeline stages and connection pools subscribe here; [`terminate`] tells
/// all of them to stop. Termination is idempotent.
///
/// [`terminate`]: BackgroundTasks::terminate
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    shutdown: Shutdown,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a background task. The receiver fires on termination.
    pub fn register(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Signal every registered task to stop. Returns `true` for the first call only.
    pub fn terminate(&self) -> bool {
        let tasks = self.shutdown.receiver_count();
        if !self.shutdown.trigger() {
            tracing::debug!("Background tasks already terminated");
            return false;
        }

        tracing::info!(tasks, "All background tasks terminated");
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_fires_once() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let tasks = BackgroundTasks::new();
        let mut worker = tasks.register();

        assert!(tasks.terminate());
        assert!(!tasks.terminate());
        assert!(tasks.is_terminated());
        assert!(worker.recv().await.is_ok());
    }

    #[test]
    fn terminate_without_tasks() {
        let tasks = BackgroundTasks::new();
        assert!(tasks.terminate());
    }
}
