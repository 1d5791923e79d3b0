//! Shared web API state.

use std::{collections::HashMap, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::api::ApiRequestHandler;

/// State handed to the web API dispatcher
#[derive(Clone)]
pub struct ApiState {
    /// Handlers keyed by path, without leading or trailing slashes
    pub handlers: Arc<HashMap<String, Arc<dyn ApiRequestHandler>>>,
    /// Serve GET requests too, not only POST
    pub enable_get: bool,
    /// Application base context, cancelled when shutdown begins
    pub base: CancellationToken,
}
