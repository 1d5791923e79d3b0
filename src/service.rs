//! systemd service unit installation.

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{info, warn};

use crate::{Error, Result};

/// Directory systemd reads administrator units from.
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

const UNIT_TEMPLATE: &str = r#"[Unit]
Description={{DESCRIPTION}}
After=network.target

[Service]
Type=simple
User={{USER}}
Group={{GROUP}}
WorkingDirectory={{WORK_DIR}}
ExecStart={{EXEC_START}}
Restart=on-failure
RestartSec=10
StandardOutput=journal
StandardError=journal

[Install]
WantedBy=multi-user.target
"#;

/// Values rendered into a unit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnit {
    pub name: String,
    pub description: String,
    pub user: String,
    pub group: String,
    pub working_dir: PathBuf,
    /// Full command line, executable first.
    pub exec_start: String,
    /// Enable the unit so it starts at boot.
    pub autostart: bool,
}

impl ServiceUnit {
    pub fn file_name(&self) -> String {
        unit_file_name(&self.name)
    }

    pub fn render(&self) -> String {
        UNIT_TEMPLATE
            .replace("{{DESCRIPTION}}", &self.description)
            .replace("{{USER}}", &self.user)
            .replace("{{GROUP}}", &self.group)
            .replace("{{WORK_DIR}}", &self.working_dir.display().to_string())
            .replace("{{EXEC_START}}", &self.exec_start)
    }
}

fn unit_file_name(name: &str) -> String {
    format!("{name}.service")
}

/// Installs and removes units in a systemd unit directory.
#[derive(Debug, Clone)]
pub struct SystemdInstaller {
    unit_dir: PathBuf,
    systemctl: bool,
}

impl Default for SystemdInstaller {
    fn default() -> Self {
        Self::new(SYSTEMD_UNIT_DIR)
    }
}

impl SystemdInstaller {
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            systemctl: true,
        }
    }

    /// Only write and remove unit files, never call `systemctl`.
    pub fn without_systemctl(mut self) -> Self {
        self.systemctl = false;
        self
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn is_available(&self) -> bool {
        self.unit_dir.is_dir()
    }

    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(unit_file_name(name))
    }

    pub fn install(&self, unit: &ServiceUnit) -> Result<PathBuf> {
        self.ensure_available()?;
        if unit.name.is_empty() {
            return Err(Error::ServiceNameMissing);
        }

        let path = self.unit_path(&unit.name);
        if path.exists() {
            warn!("overwriting existing unit {}", path.display());
        }
        fs::write(&path, unit.render())?;
        info!("Service unit written to {}", path.display());

        self.systemctl(&["daemon-reload"])?;
        if unit.autostart {
            self.systemctl(&["enable", &unit.file_name()])?;
        }

        Ok(path)
    }

    pub fn uninstall(&self, name: &str) -> Result<PathBuf> {
        self.ensure_available()?;
        if name.is_empty() {
            return Err(Error::ServiceNameMissing);
        }

        let path = self.unit_path(name);
        if !path.exists() {
            return Err(Error::ServiceNotInstalled(name.to_string()));
        }

        let file_name = unit_file_name(name);
        for action in ["stop", "disable"] {
            if let Err(err) = self.systemctl(&[action, &file_name]) {
                warn!("{}", err);
            }
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!("Service unit {} removed", path.display());

        self.systemctl(&["daemon-reload"])?;

        Ok(path)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::SystemdUnavailable(self.unit_dir.clone()))
        }
    }

    fn systemctl(&self, args: &[&str]) -> Result<()> {
        if !self.systemctl {
            return Ok(());
        }

        let status = Command::new("systemctl").args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Systemctl {
                command: args.join(" "),
                status,
            })
        }
    }
}
