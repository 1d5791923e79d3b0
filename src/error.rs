//! Crate-wide error type.

use std::{io, path::PathBuf, process::ExitStatus, time::Duration};

use crate::settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    SettingsNotFound(PathBuf),

    #[error("No {} file found. Please create one or use `{executable} init` command.", .path.display())]
    SettingsRequired { path: PathBuf, executable: String },

    #[error("Can not initialize existing file: {}", .0.display())]
    SettingsExist(PathBuf),

    #[error("Invalid settings file {}: {message}", .path.display())]
    SettingsFormat { path: PathBuf, message: String },

    #[error("Serializing settings: {0}")]
    SettingsSerialize(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(
        "Directory {} does not exist. Only systemd based services supported for now.",
        .0.display()
    )]
    SystemdUnavailable(PathBuf),

    #[error("Service name is empty, set service_name in settings")]
    ServiceNameMissing,

    #[error("Service {0} is not installed")]
    ServiceNotInstalled(String),

    #[error("`systemctl {command}` failed: {status}")]
    Systemctl { command: String, status: ExitStatus },

    #[error("Server forced to shutdown: connections still open after {0:?}")]
    ForcedShutdown(Duration),

    #[error("Web server task failed: {0}")]
    ServerTask(String),

    #[error("Migrating {model}: {source}")]
    Migration {
        model: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Hook(#[from] anyhow::Error),

    #[error("Io: {0}")]
    Io(#[from] io::Error),
}
