//! Web server lifecycle: serving, waiting for a termination signal and
//! draining connections within a deadline.

use std::{future::Future, io, sync::Arc, time::Duration};

use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{Error, Result, connection, web::ServerTimeouts};

/// Default time allowed for in-flight requests once shutdown begins.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Phases of the `run` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Publishes [`LifecycleState`] changes to any number of observers.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn set(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }
}

/// Where the server listens.
#[derive(Debug)]
pub enum Listen {
    /// Bind `<host>:<port>` when the server task starts.
    Address(String),
    /// An already bound listener.
    Listener(TcpListener),
}

impl Listen {
    async fn bind(self) -> io::Result<TcpListener> {
        match self {
            Listen::Address(address) => TcpListener::bind(address).await,
            Listen::Listener(listener) => Ok(listener),
        }
    }
}

/// A router ready to be served until a shutdown signal arrives.
pub struct WebServer {
    pub listen: Listen,
    pub router: Router,
    pub timeouts: ServerTimeouts,
    /// Base context; cancelling it starts the graceful shutdown.
    pub base: CancellationToken,
    pub shutdown_timeout: Duration,
    pub lifecycle: Lifecycle,
}

impl WebServer {
    /// Serves on a separate task until `signal` completes, then cancels the
    /// base context and waits at most `shutdown_timeout` for open
    /// connections to drain.
    ///
    /// A bind failure is logged and the state stays
    /// [`LifecycleState::Starting`]; the caller still waits for `signal`.
    /// Connections outliving the deadline are dropped together with the
    /// serving task and [`Error::ForcedShutdown`] is returned.
    pub async fn serve_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let WebServer {
            listen,
            router,
            timeouts,
            base,
            shutdown_timeout,
            lifecycle,
        } = self;

        lifecycle.set(LifecycleState::Starting);

        let serving = lifecycle.clone();
        let stop = base.clone();
        let mut server = tokio::spawn(async move {
            let listener = match listen.bind().await {
                Ok(listener) => listener,
                Err(err) => {
                    error!("web server failed to listen: {}", err);
                    warn!("web server not serving, waiting for shutdown signal");
                    return;
                }
            };

            serving.set(LifecycleState::Serving);
            connection::serve(listener, router, timeouts, stop).await;
        });

        signal.await;

        info!("Shutting down web server");
        lifecycle.set(LifecycleState::ShuttingDown);
        base.cancel();

        let drained = tokio::time::timeout(shutdown_timeout, &mut server).await;
        lifecycle.set(LifecycleState::Stopped);

        match drained {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Error::ServerTask(err.to_string())),
            Err(_) => {
                warn!("connections still open after {:?}, aborting", shutdown_timeout);
                server.abort();
                let _ = server.await;
                Err(Error::ForcedShutdown(shutdown_timeout))
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM (Ctrl+C outside unix).
///
/// SIGQUIT keeps its default behavior and terminates immediately.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(err), _) | (_, Err(err)) => {
                error!("cannot listen for termination signals: {}", err);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl+C: {}", err);
            return std::future::pending().await;
        }
        info!("received Ctrl+C");
    }
}
