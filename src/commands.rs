//! Built-in subcommands.

use std::{
    env,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    AppBase, Result,
    cli::RunCmd,
    hooks::AppHooks,
    lifecycle::{Listen, WebServer, shutdown_signal},
    service::ServiceUnit,
    settings::{self, AppSettings},
};

const SEPARATOR: &str = "================================";

impl<S: AppSettings, H: AppHooks<S>> AppBase<S, H> {
    pub(crate) fn cmd_version(&self) {
        println!("{}", self.build.version);
    }

    pub(crate) fn cmd_info(&self) {
        println!("{}", self.app_name);
        println!("{SEPARATOR}");
        println!("Version: {}", self.build.version);
        println!("Commit: {}", self.build.commit_short());
        println!("Built: at {} with {}", self.build.time, self.build.built_with);
        println!("Uptime: {:?}", self.uptime());

        println!();
        println!("{SEPARATOR}");
        println!("SETTINGS");
        println!("{SEPARATOR}");
        if self.settings.base().loaded_from_file {
            match settings::to_yaml(&self.settings) {
                Ok(yaml) => print!("{yaml}"),
                Err(err) => warn!("{}", err),
            }
        } else {
            println!("File {} not found.", self.settings_path.display());
        }

        self.hooks.print_info(&self.settings);
    }

    pub(crate) async fn cmd_init(&mut self) -> Result<()> {
        let comment = format!(
            "File was created automatically by '{} init' command. There are all\n\
             available options listed here with its default values. Recommendation is to edit options you\n\
             want to change and remove all others with default values to keep this as simple as possible.",
            self.executable_name
        );

        settings::save_new(&self.settings_path, &comment, &self.settings)?;
        println!(
            "Default app settings written to {}",
            self.settings_path.display()
        );

        self.hooks.init(&self.settings).await?;
        Ok(())
    }

    pub(crate) fn cmd_install(&self, autostart: bool) -> Result<()> {
        let base = self.settings.base();
        let exe = env::current_exe()?;
        let working_dir = env::current_dir()?;
        let settings_path = absolute(&working_dir, &self.settings_path);

        let unit = ServiceUnit {
            name: base.service_name.clone(),
            description: self.app_name.clone(),
            user: base.service_user.clone(),
            group: base.service_group.clone(),
            working_dir,
            exec_start: format!(
                "{} --settings {} run",
                exe.display(),
                settings_path.display()
            ),
            autostart,
        };

        let path = self.installer.install(&unit)?;
        println!("Service {} installed to {}", unit.name, path.display());
        Ok(())
    }

    pub(crate) fn cmd_uninstall(&self) -> Result<()> {
        let name = &self.settings.base().service_name;
        let path = self.installer.uninstall(name)?;
        println!("Service {} removed from {}", name, path.display());
        Ok(())
    }

    pub(crate) async fn cmd_run(&mut self, args: RunCmd) -> Result<()> {
        self.log_requests = args.log_requests;
        if args.log_sql {
            self.settings.base_mut().log_sql = true;
        }

        info!("{} version: {}", self.app_name, self.build.version);
        self.hooks.pre_run(&self.settings).await?;

        let address = self.settings.base().address();
        let server = WebServer {
            listen: Listen::Address(address.clone()),
            router: self.served_router(),
            timeouts: self.timeouts,
            base: self.base.clone(),
            shutdown_timeout: self.shutdown_timeout,
            lifecycle: self.lifecycle.clone(),
        };

        info!(
            "Starting up web server at http://{}. Press Ctrl + C to stop it.",
            address
        );
        match self.shutdown_trigger.take() {
            Some(trigger) => server.serve_until(trigger).await?,
            None => server.serve_until(shutdown_signal()).await?,
        }

        let finished = self.hooks.post_run(&self.settings).await;
        info!("Shutdown complete");
        finished?;

        Ok(())
    }
}

fn absolute(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}
