//! YAML settings file: the base section every application embeds, loading,
//! saving and validation.

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
};

use nanoid::nanoid;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, DeserializeOwned, IgnoredAny, Visitor},
};
use serde_json::Value;

use crate::{Error, Result};

/// Settings file used when `--settings` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = ".settings.yml";

/// Cookie secret substituted outside production when none is configured.
pub const DEV_COOKIE_SECRET: &str = "DEFAULT_DEV_SECRET";

/// Shortest cookie secret accepted in production.
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 15115;
pub const DEFAULT_SERVICE_ACCOUNT: &str = "www-data";

/// Settings shared by every application.
///
/// Application settings embed this struct (usually with `#[serde(flatten)]`)
/// and expose it through [`AppSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettingsBase {
    /// Production mode tightens validation on load.
    pub production: bool,
    /// Public URL of the application, derived from host and port outside production.
    #[serde(deserialize_with = "scalar_string")]
    pub base_url: String,
    #[serde(deserialize_with = "scalar_string")]
    pub webserver_hostname: String,
    pub webserver_port: u16,
    #[serde(deserialize_with = "scalar_string")]
    pub webserver_cookie_secret: String,
    #[serde(deserialize_with = "scalar_string")]
    pub service_name: String,
    #[serde(deserialize_with = "scalar_string")]
    pub service_user: String,
    #[serde(deserialize_with = "scalar_string")]
    pub service_group: String,
    #[serde(deserialize_with = "scalar_string")]
    pub initial_root_password: String,
    pub log_sql: bool,

    /// Set once the values were read from a settings file.
    #[serde(skip)]
    pub loaded_from_file: bool,
}

/// Access to the base section of an application settings type.
///
/// Settings types need `#[serde(default)]`: a settings file may name only
/// some of the keys.
///
/// ```ignore
/// #[derive(Default, Serialize, Deserialize)]
/// #[serde(default)]
/// struct MySettings {
///     #[serde(flatten)]
///     base: AppSettingsBase,
///     greeting: String,
/// }
///
/// impl AppSettings for MySettings {
///     fn base(&self) -> &AppSettingsBase { &self.base }
///     fn base_mut(&mut self) -> &mut AppSettingsBase { &mut self.base }
/// }
/// ```
pub trait AppSettings: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn base(&self) -> &AppSettingsBase;
    fn base_mut(&mut self) -> &mut AppSettingsBase;
}

impl AppSettings for AppSettingsBase {
    fn base(&self) -> &AppSettingsBase {
        self
    }

    fn base_mut(&mut self) -> &mut AppSettingsBase {
        self
    }
}

/// Validation failures of a loaded settings file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("base_url required in production")]
    BaseUrlRequired,
    #[error("webserver_cookie_secret required in production")]
    CookieSecretRequired,
    #[error(
        "webserver_cookie_secret should be at least 32 characters long in production. You have {0}."
    )]
    CookieSecretTooShort(usize),
}

impl AppSettingsBase {
    /// Values used for blank fields at startup.
    pub fn startup_defaults(executable_name: &str) -> Self {
        Self {
            webserver_hostname: DEFAULT_HOSTNAME.to_string(),
            webserver_port: DEFAULT_PORT,
            service_name: executable_name.to_string(),
            service_user: DEFAULT_SERVICE_ACCOUNT.to_string(),
            service_group: DEFAULT_SERVICE_ACCOUNT.to_string(),
            initial_root_password: nanoid!(20),
            ..Self::default()
        }
    }

    /// Copies `defaults` into every field that is still blank.
    pub fn fill_blanks(&mut self, defaults: Self) {
        fn fill(field: &mut String, default: String) {
            if field.is_empty() {
                *field = default;
            }
        }

        fill(&mut self.webserver_hostname, defaults.webserver_hostname);
        fill(&mut self.base_url, defaults.base_url);
        fill(&mut self.webserver_cookie_secret, defaults.webserver_cookie_secret);
        fill(&mut self.service_name, defaults.service_name);
        fill(&mut self.service_user, defaults.service_user);
        fill(&mut self.service_group, defaults.service_group);
        fill(&mut self.initial_root_password, defaults.initial_root_password);

        if self.webserver_port == 0 {
            self.webserver_port = defaults.webserver_port;
        }
    }

    /// Post-processing after a load: validate in production, derive
    /// development defaults otherwise.
    pub fn finish_load(&mut self) -> Result<(), SettingsError> {
        self.loaded_from_file = true;

        if self.production {
            if self.base_url.is_empty() {
                return Err(SettingsError::BaseUrlRequired);
            }

            let secret_len = self.webserver_cookie_secret.chars().count();
            if secret_len == 0 {
                return Err(SettingsError::CookieSecretRequired);
            }
            if secret_len < MIN_COOKIE_SECRET_LEN {
                return Err(SettingsError::CookieSecretTooShort(secret_len));
            }
        } else {
            if self.base_url.is_empty() {
                self.base_url = format!("http://{}", self.address());
            }
            if self.webserver_cookie_secret.is_empty() {
                self.webserver_cookie_secret = DEV_COOKIE_SECRET.to_string();
            }
        }

        Ok(())
    }

    /// `<hostname>:<port>` the web server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.webserver_hostname, self.webserver_port)
    }
}

/// Loads `path` over the current values of `settings`.
///
/// The file is parsed into `S` so scalars resolve against the field types,
/// then only the keys present in the file (and not null) replace in-memory
/// values.
pub fn load<S: AppSettings>(path: &Path, settings: &mut S) -> Result<()> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Error::SettingsNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };

    let format_error = |message: String| Error::SettingsFormat {
        path: path.to_path_buf(),
        message,
    };

    if !text.trim().is_empty() {
        let keys: BTreeMap<String, Option<IgnoredAny>> =
            serde_saphyr::from_str(&text).map_err(|e| format_error(e.to_string()))?;
        let file: S = serde_saphyr::from_str(&text).map_err(|e| format_error(e.to_string()))?;

        let mut merged =
            serde_json::to_value(&*settings).map_err(|e| format_error(e.to_string()))?;
        let file = serde_json::to_value(&file).map_err(|e| format_error(e.to_string()))?;
        let present = keys
            .into_iter()
            .filter_map(|(key, value)| value.map(|_| key));
        overlay(&mut merged, &file, present);

        *settings = serde_json::from_value(merged).map_err(|e| format_error(e.to_string()))?;
    }
    settings.base_mut().finish_load()?;

    Ok(())
}

/// Writes `settings` to a new file at `path`, prefixed by `comment` as YAML
/// comment lines.
///
/// Never overwrites: an existing file yields [`Error::SettingsExist`].
pub fn save_new<S: AppSettings>(path: &Path, comment: &str, settings: &S) -> Result<()> {
    let yaml = to_yaml(settings)?;

    let mut contents = String::new();
    for line in comment.lines() {
        contents.push_str(format!("# {line}").trim_end());
        contents.push('\n');
    }
    if !contents.is_empty() {
        contents.push('\n');
    }
    contents.push_str(&yaml);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::SettingsExist(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    file.write_all(contents.as_bytes())?;

    Ok(())
}

/// Renders settings as YAML, the way they are written by `init`.
pub fn to_yaml<S: Serialize>(settings: &S) -> Result<String> {
    serde_saphyr::to_string(settings).map_err(|e| Error::SettingsSerialize(e.to_string()))
}

fn overlay(target: &mut Value, file: &Value, keys: impl IntoIterator<Item = String>) {
    let (Value::Object(target), Value::Object(file)) = (target, file) else {
        return;
    };
    for key in keys {
        if let Some(value) = file.get(&key) {
            target.insert(key, value.clone());
        }
    }
}

/// Accepts any scalar for a string field, so `service_user: 1000` reads as
/// `"1000"` even when the field sits behind `#[serde(flatten)]`.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct ScalarString;

    impl Visitor<'_> for ScalarString {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(ScalarString)
}
