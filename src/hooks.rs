//! Application callbacks invoked around the built-in commands.

use axum::Router;

use crate::settings::AppSettings;

/// Callbacks an application plugs into the command flow.
///
/// Every method has a no-op default, so implementors override only what they
/// need. An error returned from an async hook aborts the command.
#[async_trait::async_trait]
pub trait AppHooks<S: AppSettings>: Send + Sync + 'static {
    /// Called before any subcommand, after settings were loaded.
    async fn pre_cmd(&mut self, _command: &str, _settings: &S) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after any subcommand finished successfully.
    async fn post_cmd(&mut self, _command: &str, _settings: &S) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called before `run` starts the web server.
    async fn pre_run(&mut self, _settings: &S) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after `run` stopped the web server.
    async fn post_run(&mut self, _settings: &S) -> anyhow::Result<()> {
        Ok(())
    }

    /// Extra work for `init`, after the settings file was written.
    async fn init(&mut self, _settings: &S) -> anyhow::Result<()> {
        Ok(())
    }

    /// Prints additional lines for `info`.
    fn print_info(&self, _settings: &S) {}

    /// Adds the application's routes to the default router.
    fn build_router(&self, router: Router, _settings: &S) -> Router {
        router
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<S: AppSettings> AppHooks<S> for NoHooks {}
