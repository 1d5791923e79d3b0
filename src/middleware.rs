//! Request logging middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use nanoid::nanoid;
use std::time::Instant;
use tracing::info;

use crate::colors::{colored_id, colored_status};

/// Middleware enabled by `run --log-requests`.
///
/// Assigns each request a short colored nanoid and logs one line when the
/// request arrives and one with status and latency when the response leaves.
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let id = nanoid!(5);
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    info!("{} → {} {}", colored_id(&id), method, path);
    let response = next.run(req).await;
    info!(
        "{} ← {} {} {} ({}ms)",
        colored_id(&id),
        colored_status(response.status()),
        method,
        path,
        started.elapsed().as_millis()
    );

    response
}
