//! Router assembly for the `run` command.

use std::{sync::Arc, time::Duration};

use axum::{Extension, Router, http::StatusCode, middleware as axum_middleware, routing::any};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

use crate::{
    api::{ApiRegistry, dispatch},
    middleware::log_requests,
};

/// Connection and request deadlines of the web server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeouts {
    /// Time allowed to read the request headers, and separately the body.
    pub read: Duration,
    /// Time allowed to produce the response; `408` once it elapses.
    pub write: Duration,
    /// A connection with no traffic for this long is closed.
    pub idle: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(20),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(60),
        }
    }
}

/// Routes of the web API, empty when the API is disabled.
pub fn api_router(registry: &ApiRegistry, base: CancellationToken) -> Router {
    if !registry.is_enabled() {
        return Router::new();
    }

    Router::new()
        .route(&format!("{}/{{*path}}", registry.prefix()), any(dispatch))
        .with_state(Arc::new(registry.state(base)))
}

/// Wraps `router` with the layers every served router gets: the base context
/// as an [`Extension`], read/write timeouts and optional request logging.
pub fn with_server_layers(
    router: Router,
    base: CancellationToken,
    timeouts: ServerTimeouts,
    log: bool,
) -> Router {
    let router = router
        .layer(Extension(base))
        .layer(RequestBodyTimeoutLayer::new(timeouts.read))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeouts.write,
        ));

    if log {
        router.layer(axum_middleware::from_fn(log_requests))
    } else {
        router
    }
}
