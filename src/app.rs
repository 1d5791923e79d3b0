//! The application object: identity, settings, hooks and command dispatch.

use std::{
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    Result,
    api::{ApiRegistry, ApiRequestHandler},
    cli::{Cli, Command, Parsed},
    hooks::AppHooks,
    lifecycle::{DEFAULT_SHUTDOWN_TIMEOUT, Lifecycle, LifecycleState},
    logging,
    service::SystemdInstaller,
    settings::{self, AppSettings, AppSettingsBase, DEFAULT_SETTINGS_FILE},
    web::{self, ServerTimeouts},
};

/// Version label of builds without release metadata.
pub const DEV_MODE_LABEL: &str = "DEV";

/// Release metadata of the running binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    /// Full commit hash.
    pub commit: String,
    pub time: String,
    /// Toolchain the binary was built with.
    pub built_with: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: DEV_MODE_LABEL.to_string(),
            commit: DEV_MODE_LABEL.to_string(),
            time: DEV_MODE_LABEL.to_string(),
            built_with: "rustc".to_string(),
        }
    }
}

impl BuildInfo {
    pub fn new(
        version: impl Into<String>,
        commit: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            commit: commit.into(),
            time: time.into(),
            ..Self::default()
        }
    }

    pub fn built_with(mut self, toolchain: impl Into<String>) -> Self {
        self.built_with = toolchain.into();
        self
    }

    /// First 7 characters of the commit hash.
    pub fn commit_short(&self) -> &str {
        match self.commit.char_indices().nth(7) {
            Some((end, _)) => &self.commit[..end],
            None => &self.commit,
        }
    }

    pub fn is_dev(&self) -> bool {
        self.version == DEV_MODE_LABEL
    }
}

type ShutdownTrigger = Pin<Box<dyn Future<Output = ()> + Send>>;

/// An application: CLI, settings file, web server and service unit.
///
/// ```ignore
/// AppBase::new(MySettings::default(), MyHooks::default())
///     .executable_name("myapp")
///     .app_name("My App")
///     .web_api_prefix("/api")
///     .api_handler("ping", ping)
///     .run()
///     .await;
/// ```
pub struct AppBase<S: AppSettings, H: AppHooks<S>> {
    pub(crate) executable_name: String,
    pub(crate) app_name: String,
    pub(crate) long_description: String,
    pub(crate) build: BuildInfo,
    pub(crate) started_at: Instant,

    pub(crate) settings_path: PathBuf,
    pub(crate) settings: S,

    pub(crate) base: CancellationToken,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) shutdown_trigger: Option<ShutdownTrigger>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) timeouts: ServerTimeouts,

    pub(crate) api: ApiRegistry,
    pub(crate) router: Option<Router>,
    pub(crate) log_requests: bool,

    pub(crate) installer: SystemdInstaller,
    pub(crate) hooks: H,
}

impl<S: AppSettings, H: AppHooks<S>> AppBase<S, H> {
    /// Creates the application around its default settings and hooks.
    pub fn new(default_settings: S, hooks: H) -> Self {
        Self {
            executable_name: "UNSET_ExecutableName".to_string(),
            app_name: "UNSET_AppName".to_string(),
            long_description: String::new(),
            build: BuildInfo::default(),
            started_at: Instant::now(),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_FILE),
            settings: default_settings,
            base: CancellationToken::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            shutdown_trigger: None,
            lifecycle: Lifecycle::new(),
            timeouts: ServerTimeouts::default(),
            api: ApiRegistry::default(),
            router: None,
            log_requests: false,
            installer: SystemdInstaller::default(),
            hooks,
        }
    }

    pub fn executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = name.into();
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn long_description(mut self, description: impl Into<String>) -> Self {
        self.long_description = description.into();
        self
    }

    pub fn build_info(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    /// Settings file used unless `--settings` overrides it.
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    /// Time allowed for in-flight requests after a shutdown signal.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Replaces waiting for SIGINT/SIGTERM in `run` with `signal`.
    pub fn shutdown_on<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shutdown_trigger = Some(Box::pin(signal));
        self
    }

    pub fn server_timeouts(mut self, timeouts: ServerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Enables the web API under `prefix`, e.g. `/api`. Empty disables it.
    pub fn web_api_prefix(mut self, prefix: &str) -> Self {
        self.api.set_prefix(prefix);
        self
    }

    /// Serve API handlers on GET as well as POST.
    pub fn web_api_enable_get(mut self, enable: bool) -> Self {
        self.api.set_enable_get(enable);
        self
    }

    /// Registers an API handler for `<prefix>/<path>`.
    pub fn api_handler(mut self, path: &str, handler: impl ApiRequestHandler) -> Self {
        self.api.insert(path, Arc::new(handler));
        self
    }

    /// Serves `router` instead of the default one built from hooks and the
    /// web API.
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn service_installer(mut self, installer: SystemdInstaller) -> Self {
        self.installer = installer;
        self
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn build(&self) -> &BuildInfo {
        &self.build
    }

    /// The base context, cancelled when the web server starts shutting down.
    pub fn base_context(&self) -> CancellationToken {
        self.base.clone()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn api(&self) -> &ApiRegistry {
        &self.api
    }

    pub fn is_dev_mode(&self) -> bool {
        self.build.is_dev()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn settings_file(&self) -> &Path {
        &self.settings_path
    }

    /// Router served by `run`, before the server layers are applied.
    pub fn web_handler(&self) -> Router {
        match &self.router {
            Some(router) => router.clone(),
            None => self
                .hooks
                .build_router(Router::new(), &self.settings)
                .merge(web::api_router(&self.api, self.base.clone())),
        }
    }

    pub(crate) fn served_router(&self) -> Router {
        web::with_server_layers(
            self.web_handler(),
            self.base.clone(),
            self.timeouts,
            self.log_requests,
        )
    }

    /// Parses the process arguments and runs the command.
    ///
    /// Any error is logged and terminates the process with status 1.
    pub async fn run(mut self) {
        logging::init();

        if let Err(err) = self.execute(std::env::args().skip(1)).await {
            error!("{}", err);
            std::process::exit(1);
        }
    }

    /// Runs the command given by `args` (without the executable name).
    pub async fn execute<I, T>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.fill_settings_defaults();

        let cli = match Cli::parse(&self.executable_name, args)? {
            Parsed::Cli(cli) => cli,
            Parsed::Help(help) => {
                println!("{}", help.trim_end());
                return Ok(());
            }
        };

        if let Some(path) = cli.settings {
            self.settings_path = path;
        }
        let Some(command) = cli.command else {
            println!("{}", self.about());
            println!("{}", Cli::help(&self.executable_name).trim_end());
            return Ok(());
        };

        self.load_settings(&command)?;

        let name = command.name();
        self.hooks.pre_cmd(name, &self.settings).await?;

        match command {
            Command::Version(_) => self.cmd_version(),
            Command::Info(_) => self.cmd_info(),
            Command::Init(_) => self.cmd_init().await?,
            Command::Install(args) => self.cmd_install(args.autostart)?,
            Command::Uninstall(_) => self.cmd_uninstall()?,
            Command::Run(args) => self.cmd_run(args).await?,
        }

        self.hooks.post_cmd(name, &self.settings).await?;
        Ok(())
    }

    fn about(&self) -> String {
        if self.long_description.is_empty() {
            self.app_name.clone()
        } else {
            format!("{} - {}", self.app_name, self.long_description)
        }
    }

    fn fill_settings_defaults(&mut self) {
        let defaults = AppSettingsBase::startup_defaults(&self.executable_name);
        self.settings.base_mut().fill_blanks(defaults);
    }

    /// Loads the settings file when present; commands that need settings
    /// fail when it is absent.
    fn load_settings(&mut self, command: &Command) -> Result<()> {
        if self.settings_path.exists() {
            settings::load(&self.settings_path, &mut self.settings)
        } else if command.requires_settings() {
            Err(crate::Error::SettingsRequired {
                path: self.settings_path.clone(),
                executable: self.executable_name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_short_takes_seven_characters() {
        let build = BuildInfo::new("1.2.0", "0123456789abcdef", "now");
        assert_eq!(build.commit_short(), "0123456");
        assert!(!build.is_dev());

        let dev = BuildInfo::default();
        assert_eq!(dev.commit_short(), DEV_MODE_LABEL);
        assert!(dev.is_dev());
    }
}
