//! HTTP server lifecycle.
//!
//! # Responsibilities
//! - Own the listening socket and the router it serves
//! - Serve on a background task and report fatal errors on a one-slot channel
//! - Stop accepting on request and drain in-flight requests within a deadline
//!
//! # State Machine
//! ```text
//! Created --start--> Serving --shutdown_gracefully--> ShuttingDown --> Closed
//!                    Serving --fatal error--------------------------> Closed
//! ```
//! No state is re-entered; a closed server is never restarted.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::routing;

/// Receiving end of the fatal-error channel returned by [`HttpServer::start`].
///
/// Holds at most one error.
pub type ServerErrors = mpsc::Receiver<ServerError>;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("server cannot start from state {0}")]
    AlreadyStarted(ServerState),

    #[error("server stopped without reporting an error")]
    Stopped,
}

/// Errors raised by [`HttpServer::shutdown_gracefully`].
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("in-flight requests did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("server failed while draining: {0}")]
    Server(#[source] ServerError),

    #[error("server task ended abnormally: {0}")]
    Join(#[from] JoinError),
}

/// Lifecycle state of an [`HttpServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Serving,
    ShuttingDown,
    Closed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Created => "created",
            ServerState::Serving => "serving",
            ServerState::ShuttingDown => "shutting-down",
            ServerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The running listener plus its shutdown settings.
pub struct HttpServer {
    address: String,
    shutdown_timeout: Duration,
    router: Option<Router>,
    state: Arc<watch::Sender<ServerState>>,
    shutdown: Shutdown,
    task: Option<JoinHandle<Option<ServerError>>>,
}

impl HttpServer {
    /// Create a server for `config` serving the application router.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_router(config, routing::build_router_for(config))
    }

    /// Create a server for `config` serving `router`.
    pub fn with_router(config: &ServerConfig, router: Router) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            address: config.bind_address(),
            shutdown_timeout: config.shutdown_timeout.as_duration(),
            router: Some(router),
            state: Arc::new(state),
            shutdown: Shutdown::new(),
            task: None,
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind the configured address and serve on a background task.
    ///
    /// Returns immediately. Bind and serve failures are logged and delivered
    /// on the returned channel unless shutdown has already begun.
    pub fn start(&mut self) -> Result<ServerErrors, ServerError> {
        let router = self.begin()?;
        let (errors, task) = self.serve_task();
        let shutdown = self.shutdown.subscribe();
        let address = self.address.clone();

        self.task = Some(tokio::spawn(async move {
            match TcpListener::bind(&address).await {
                Ok(listener) => {
                    log_listening(&listener);
                    task.serve(listener, router, shutdown).await
                }
                Err(source) => task.fail(ServerError::Bind { address, source }),
            }
        }));

        Ok(errors)
    }

    /// Serve on an already bound listener.
    pub fn start_on(&mut self, listener: TcpListener) -> Result<ServerErrors, ServerError> {
        let router = self.begin()?;
        let (errors, task) = self.serve_task();
        let shutdown = self.shutdown.subscribe();

        log_listening(&listener);

        self.task = Some(tokio::spawn(task.serve(listener, router, shutdown)));

        Ok(errors)
    }

    fn begin(&mut self) -> Result<Router, ServerError> {
        let current = self.state();
        match (current, self.router.take()) {
            (ServerState::Created, Some(router)) => {
                self.state.send_replace(ServerState::Serving);
                Ok(router)
            }
            (_, router) => {
                self.router = router;
                Err(ServerError::AlreadyStarted(current))
            }
        }
    }

    fn serve_task(&self) -> (ServerErrors, ServeTask) {
        let (tx, rx) = mpsc::channel(1);
        let task = ServeTask {
            errors: tx,
            state: Arc::clone(&self.state),
        };
        (rx, task)
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    ///
    /// Waits at most the configured shutdown timeout. On expiry the error is
    /// returned and the remaining requests are left to finish on their own.
    /// A server that never started or already stopped is left closed.
    pub async fn shutdown_gracefully(&mut self) -> Result<(), ShutdownError> {
        if self.state() != ServerState::Serving {
            tracing::info!(state = %self.state(), "Server is not running, nothing to shut down");
            self.state.send_replace(ServerState::Closed);
            return Ok(());
        }

        tracing::info!(
            timeout = ?self.shutdown_timeout,
            "Starting graceful shutdown, waiting for in-flight requests to finish"
        );

        self.state.send_replace(ServerState::ShuttingDown);
        self.shutdown.trigger();

        let Some(task) = self.task.take() else {
            self.state.send_replace(ServerState::Closed);
            return Ok(());
        };

        let outcome = tokio::time::timeout(self.shutdown_timeout, task).await;
        self.state.send_replace(ServerState::Closed);

        let result = match outcome {
            Ok(Ok(None)) => Ok(()),
            Ok(Ok(Some(error))) => Err(ShutdownError::Server(error)),
            Ok(Err(join)) => Err(ShutdownError::Join(join)),
            Err(_) => Err(ShutdownError::DeadlineExceeded(self.shutdown_timeout)),
        };

        match &result {
            Ok(()) => tracing::info!("Server is successfully closed"),
            Err(error) => {
                tracing::error!(error = %error, "Failed to shut down the server gracefully")
            }
        }

        result
    }
}

fn log_listening(listener: &TcpListener) {
    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "Server listening");
    }
}

/// State the background serving task needs.
struct ServeTask {
    errors: mpsc::Sender<ServerError>,
    state: Arc<watch::Sender<ServerState>>,
}

impl ServeTask {
    /// Serve until shutdown is triggered. Returns an error only if it happened
    /// after shutdown began and so was not sent on the channel.
    async fn serve(
        self,
        listener: TcpListener,
        router: Router,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Option<ServerError> {
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await;

        match result {
            Ok(()) => {
                self.state.send_replace(ServerState::Closed);
                tracing::debug!("Server stopped accepting connections");
                None
            }
            Err(e) => self.fail(ServerError::Serve(e)),
        }
    }

    fn fail(self, error: ServerError) -> Option<ServerError> {
        // Shutdown moves the state off `Serving` before it triggers.
        let previous = self.state.send_replace(ServerState::Closed);
        if previous != ServerState::Serving {
            return Some(error);
        }

        tracing::error!(error = %error, "Failed to start server");
        let _ = self.errors.try_send(error);
        None
    }
}
