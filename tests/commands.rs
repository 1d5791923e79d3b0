//! Integration tests for the built-in commands driven through `AppBase::execute`

use appbase::{
    AppBase, AppHooks, AppSettingsBase, Error, NoHooks,
    lifecycle::LifecycleState,
    service::SystemdInstaller,
};
use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;

/// Hooks that record every call, optionally failing `pre_run`.
#[derive(Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
    fail_pre_run: bool,
}

impl Recorder {
    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl AppHooks<AppSettingsBase> for Recorder {
    async fn pre_cmd(&mut self, command: &str, _settings: &AppSettingsBase) -> anyhow::Result<()> {
        self.push(format!("pre_cmd:{command}"));
        Ok(())
    }

    async fn post_cmd(&mut self, command: &str, _settings: &AppSettingsBase) -> anyhow::Result<()> {
        self.push(format!("post_cmd:{command}"));
        Ok(())
    }

    async fn pre_run(&mut self, _settings: &AppSettingsBase) -> anyhow::Result<()> {
        self.push("pre_run".to_string());
        if self.fail_pre_run {
            anyhow::bail!("database unavailable");
        }
        Ok(())
    }

    async fn post_run(&mut self, _settings: &AppSettingsBase) -> anyhow::Result<()> {
        self.push("post_run".to_string());
        Ok(())
    }

    async fn init(&mut self, _settings: &AppSettingsBase) -> anyhow::Result<()> {
        self.push("init".to_string());
        Ok(())
    }
}

fn settings_arg(path: &Path) -> [String; 2] {
    ["--settings".to_string(), path.display().to_string()]
}

fn local_settings(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("app.yml");
    fs::write(&path, "webserver_hostname: 127.0.0.1\nwebserver_port: 0\n").unwrap();
    path
}

#[tokio::test]
async fn test_init_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.yml");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let hooks = Recorder {
        calls: calls.clone(),
        ..Default::default()
    };

    let mut app = AppBase::new(AppSettingsBase::default(), hooks).executable_name("demo");
    let [flag, value] = settings_arg(&path);
    app.execute([flag, value, "init".to_string()]).await.unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# File was created automatically by 'demo init' command."));
    assert!(text.contains("webserver_port: 15115"));
    assert!(text.contains("service_name: demo"));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["pre_cmd:init", "init", "post_cmd:init"]
    );
}

#[tokio::test]
async fn test_init_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("existing.yml");
    fs::write(&path, "webserver_port: 4321\n").unwrap();

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks).executable_name("demo");
    let [flag, value] = settings_arg(&path);
    let err = app
        .execute([flag, value, "init".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SettingsExist(_)));
    assert_eq!(fs::read_to_string(&path).unwrap(), "webserver_port: 4321\n");
}

#[tokio::test]
async fn test_run_requires_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.yml");

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks).executable_name("demo");
    let [flag, value] = settings_arg(&path);
    let err = app
        .execute([flag, value, "run".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SettingsRequired { .. }));
    assert!(err.to_string().contains("`demo init`"));
}

#[tokio::test]
async fn test_version_and_info_need_no_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.yml");

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks).executable_name("demo");
    for command in ["version", "info"] {
        let [flag, value] = settings_arg(&path);
        app.execute([flag, value, command.to_string()]).await.unwrap();
    }
    assert!(!app.settings().loaded_from_file);
}

#[tokio::test]
async fn test_invalid_settings_abort_command() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prod.yml");
    fs::write(&path, "production: true\n").unwrap();

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks).executable_name("demo");
    let [flag, value] = settings_arg(&path);
    let err = app
        .execute([flag, value, "info".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Settings(_)));
}

#[tokio::test]
async fn test_failing_pre_run_prevents_server_start() {
    let dir = TempDir::new().unwrap();
    let path = local_settings(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let hooks = Recorder {
        calls: calls.clone(),
        fail_pre_run: true,
    };

    let mut app = AppBase::new(AppSettingsBase::default(), hooks)
        .executable_name("demo")
        .shutdown_on(async {});
    let [flag, value] = settings_arg(&path);
    let err = app
        .execute([flag, value, "run".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Hook(_)));
    assert_eq!(app.lifecycle_state(), LifecycleState::Idle);
    assert!(!app.base_context().is_cancelled());
    assert_eq!(*calls.lock().unwrap(), vec!["pre_cmd:run", "pre_run"]);
}

#[tokio::test]
async fn test_run_calls_hooks_around_shutdown() {
    let dir = TempDir::new().unwrap();
    let path = local_settings(&dir);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let hooks = Recorder {
        calls: calls.clone(),
        ..Default::default()
    };

    let mut app = AppBase::new(AppSettingsBase::default(), hooks)
        .executable_name("demo")
        .shutdown_on(tokio::time::sleep(std::time::Duration::from_millis(50)));
    let [flag, value] = settings_arg(&path);
    app.execute([flag, value, "run".to_string(), "--log-sql".to_string()])
        .await
        .unwrap();

    assert_eq!(app.lifecycle_state(), LifecycleState::Stopped);
    assert!(app.base_context().is_cancelled());
    assert!(app.settings().log_sql);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["pre_cmd:run", "pre_run", "post_run", "post_cmd:run"]
    );
}

#[tokio::test]
async fn test_install_and_uninstall_service_unit() {
    let dir = TempDir::new().unwrap();
    let path = local_settings(&dir);
    let units = TempDir::new().unwrap();
    let installer = SystemdInstaller::new(units.path()).without_systemctl();

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks)
        .executable_name("demo")
        .app_name("Demo App")
        .service_installer(installer);

    let [flag, value] = settings_arg(&path);
    app.execute([flag, value, "install".to_string(), "--autostart=false".to_string()])
        .await
        .unwrap();

    let unit_path = units.path().join("demo.service");
    let unit = fs::read_to_string(&unit_path).unwrap();
    assert!(unit.contains("Description=Demo App"));
    assert!(unit.contains("User=www-data"));
    assert!(unit.contains(&format!("--settings {} run", path.display())));

    let [flag, value] = settings_arg(&path);
    app.execute([flag, value, "uninstall".to_string()])
        .await
        .unwrap();
    assert!(!unit_path.exists());
}

#[tokio::test]
async fn test_install_without_systemd_fails() {
    let dir = TempDir::new().unwrap();
    let path = local_settings(&dir);
    let installer = SystemdInstaller::new(dir.path().join("no-systemd"));

    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks)
        .executable_name("demo")
        .service_installer(installer);
    let [flag, value] = settings_arg(&path);
    let err = app
        .execute([flag, value, "install".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SystemdUnavailable(_)));
}

#[tokio::test]
async fn test_unknown_command_is_usage_error() {
    let mut app = AppBase::new(AppSettingsBase::default(), NoHooks).executable_name("demo");

    let err = app.execute(["frobnicate"]).await.unwrap_err();

    assert!(matches!(err, Error::Usage(_)));
}
