//! appbase - application skeleton combining a CLI, a web server with
//! graceful shutdown, a YAML settings file and a systemd service unit.

pub mod api;
pub mod app;
pub mod cli;
pub mod colors;
mod commands;
mod connection;
pub mod database;
mod error;
pub mod hooks;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod service;
pub mod settings;
pub mod state;
pub mod web;

pub use api::{ApiError, ApiRequest, ApiResult};
pub use app::{AppBase, BuildInfo, DEV_MODE_LABEL};
pub use error::Error;
pub use hooks::{AppHooks, NoHooks};
pub use settings::{AppSettings, AppSettingsBase};

pub type Result<T, E = Error> = std::result::Result<T, E>;
