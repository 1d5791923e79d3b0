//! JSON web API: handler registry and request dispatch.

use std::{collections::HashMap, future::Future, sync::Arc};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::ApiState;

/// What an API handler produces.
pub type ApiResult = Result<Value, ApiError>;

/// An async API handler.
///
/// Implemented for every `Fn(ApiRequest) -> impl Future<Output = ApiResult>`,
/// so plain `async fn`s can be registered directly.
pub trait ApiRequestHandler: Send + Sync + 'static {
    fn handle(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult>;
}

impl<F, Fut> ApiRequestHandler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult> + Send + 'static,
{
    fn handle(&self, request: ApiRequest) -> BoxFuture<'static, ApiResult> {
        Box::pin(self(request))
    }
}

/// A request routed to an API handler.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Handler path, without the API prefix and surrounding slashes.
    pub path: String,
    pub method: Method,
    pub query: HashMap<String, String>,
    /// JSON request body, `Value::Null` when the body was empty.
    pub body: Value,
    /// Application base context; cancelled once shutdown begins.
    pub base: CancellationToken,
}

impl ApiRequest {
    /// Looks `key` up in a JSON object body first, then in the query string.
    pub fn param(&self, key: &str) -> Option<String> {
        match self.body.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(Value::Null) | None => self.query.get(key).cloned(),
            Some(value) => Some(value.to_string()),
        }
    }

    /// Deserializes the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
    }
}

/// API failure reported to the client as `{"status":"error","message":...}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "status": "error", "message": self.message }));
        (self.status, body).into_response()
    }
}

/// Registered API handlers and their serving options.
#[derive(Clone, Default)]
pub struct ApiRegistry {
    prefix: String,
    enable_get: bool,
    handlers: HashMap<String, Arc<dyn ApiRequestHandler>>,
}

impl ApiRegistry {
    /// Sets the path prefix; an empty prefix disables the API.
    ///
    /// The prefix is normalized to a leading slash and no trailing slash.
    pub fn set_prefix(&mut self, prefix: &str) {
        let trimmed = prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_enable_get(&mut self, enable: bool) {
        self.enable_get = enable;
    }

    /// Registers `handler` under `path`, replacing any previous handler.
    pub fn insert(&mut self, path: &str, handler: Arc<dyn ApiRequestHandler>) {
        let key = normalize_path(path);
        if self.handlers.insert(key.clone(), handler).is_some() {
            warn!("API handler for '{}' replaced", key);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handlers.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        !self.prefix.is_empty()
    }

    pub(crate) fn state(&self, base: CancellationToken) -> ApiState {
        ApiState {
            handlers: Arc::new(self.handlers.clone()),
            enable_get: self.enable_get,
            base,
        }
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Routes `<prefix>/<path>` to the handler registered for `path`.
pub async fn dispatch(
    State(state): State<Arc<ApiState>>,
    Path(path): Path<String>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    match dispatch_inner(&state, path, method, query, body).await {
        Ok(data) => Json(json!({ "status": "ok", "data": data })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn dispatch_inner(
    state: &ApiState,
    path: String,
    method: Method,
    query: HashMap<String, String>,
    body: Bytes,
) -> ApiResult {
    let allowed = method == Method::POST || (state.enable_get && method == Method::GET);
    if !allowed {
        return Err(ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("method {method} not allowed"),
        ));
    }

    let path = normalize_path(&path);
    let handler = state
        .handlers
        .get(&path)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("unknown API path '{path}'")))?;

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?
    };

    handler
        .handle(ApiRequest {
            path,
            method,
            query,
            body,
            base: state.base.clone(),
        })
        .await
}
