//! Configuration for the hablink CLI.
//!
//! One TOML table per device, secret resolution (env + keyring +
//! plaintext), and translation to `hablink_core::DeviceConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use hablink_api::{PanelKind, TvCredentials};
use hablink_core::{DeviceConfig, DeviceKind, TlsVerification, VendorSettings};

/// Keyring service name; entries are keyed `<device>/<secret>`.
pub const KEYRING_SERVICE: &str = "hablink";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {secret} configured for device '{device}'")]
    NoCredentials { device: String, secret: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Configured devices, keyed by device id.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Polling period in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            refresh: default_refresh(),
            timeout: default_timeout(),
            output: default_output(),
        }
    }
}

fn default_refresh() -> u64 {
    60
}
fn default_timeout() -> u64 {
    10
}
fn default_output() -> String {
    "table".into()
}

/// One `[devices.<id>]` table. Which fields matter depends on `kind`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub kind: DeviceKind,

    /// Display name; defaults to the device id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    // ── Jablotron ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plaintext password (prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// Stored panel user code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_env: Option<String>,

    // ── Efergy ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    /// Minutes east of UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<i32>,

    // ── Smarwi / Philips TV ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<u8>,

    // ── Shared ──
    /// Cloud or device root URL, overriding the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<u64>,
}

impl DeviceEntry {
    /// An entry with only `kind` set.
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            label: None,
            username: None,
            password: None,
            password_env: None,
            service_id: None,
            service_url: None,
            code: None,
            code_env: None,
            token: None,
            token_env: None,
            utc_offset: None,
            host: None,
            websocket: None,
            api_version: None,
            base_url: None,
            insecure: None,
            ca_cert: None,
            timeout: None,
            refresh: None,
        }
    }
}

// ── Secrets ─────────────────────────────────────────────────────────

/// Secrets a device entry can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum SecretKind {
    Password,
    Code,
    Token,
}

impl SecretKind {
    /// The secret a device of `kind` logs in with.
    pub fn primary_for(kind: DeviceKind) -> Option<Self> {
        match kind {
            DeviceKind::Oasis | DeviceKind::Ja100 | DeviceKind::PhilipsTv => Some(Self::Password),
            DeviceKind::Efergy => Some(Self::Token),
            DeviceKind::Smarwi => None,
        }
    }

    fn fields(self, entry: &DeviceEntry) -> (Option<&str>, Option<&str>) {
        match self {
            Self::Password => (entry.password_env.as_deref(), entry.password.as_deref()),
            Self::Code => (entry.code_env.as_deref(), entry.code.as_deref()),
            Self::Token => (entry.token_env.as_deref(), entry.token.as_deref()),
        }
    }
}

fn keyring_entry(device: &str, secret: SecretKind) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{device}/{secret}"))
}

/// Resolve one secret: the `*_env` variable, then the keyring, then the
/// plaintext value in the file.
pub fn resolve_secret(entry: &DeviceEntry, device: &str, secret: SecretKind) -> Option<SecretString> {
    let (env_name, plaintext) = secret.fields(entry);

    // 1. Named env var
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Some(val) = keyring_entry(device, secret)
        .ok()
        .and_then(|e| e.get_password().ok())
    {
        return Some(SecretString::from(val));
    }

    // 3. Plaintext in config
    plaintext.map(|val| SecretString::from(val.to_owned()))
}

fn require_secret(
    entry: &DeviceEntry,
    device: &str,
    secret: SecretKind,
) -> Result<SecretString, ConfigError> {
    resolve_secret(entry, device, secret).ok_or_else(|| ConfigError::NoCredentials {
        device: device.into(),
        secret: secret.to_string(),
    })
}

/// Store a secret in the system keyring.
pub fn store_secret(device: &str, secret: SecretKind, value: &str) -> Result<(), ConfigError> {
    keyring_entry(device, secret)
        .and_then(|e| e.set_password(value))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "hablink", "hablink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hablink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from `path`, layered over defaults and under
/// `HABLINK_` environment variables (`HABLINK_DEFAULTS__REFRESH=30`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HABLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load the Config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// A commented starter config for `config init`.
pub fn sample_config() -> &'static str {
    SAMPLE_CONFIG
}

const SAMPLE_CONFIG: &str = r#"[defaults]
refresh = 60        # seconds
timeout = 10        # seconds

# [devices.house]
# kind = "oasis"          # oasis | ja100 | efergy | smarwi | philips-tv
# username = "me@example.com"
# password_env = "JABLOTRON_PASSWORD"
# service_id = "123456"

# [devices.meter]
# kind = "efergy"
# token_env = "EFERGY_TOKEN"
# utc_offset = 60

# [devices.window]
# kind = "smarwi"
# host = "192.168.1.50"
# websocket = true

# [devices.tv]
# kind = "philips-tv"
# host = "192.168.1.20"
"#;

// ── Translation to DeviceConfig ─────────────────────────────────────

fn required<'a>(value: Option<&'a str>, field: &str, device: &str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: format!("devices.{device}.{field}"),
            reason: "required for this device kind".into(),
        })
}

fn parse_url(raw: &str, field: &str, device: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: format!("devices.{device}.{field}"),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn base_url_or(entry: &DeviceEntry, device: &str, default: &str) -> Result<Url, ConfigError> {
    parse_url(entry.base_url.as_deref().unwrap_or(default), "base_url", device)
}

fn vendor_settings(entry: &DeviceEntry, device: &str) -> Result<VendorSettings, ConfigError> {
    let settings = match entry.kind {
        DeviceKind::Oasis | DeviceKind::Ja100 => {
            let panel = if entry.kind == DeviceKind::Oasis {
                PanelKind::Oasis
            } else {
                PanelKind::Ja100
            };
            let username = required(entry.username.as_deref(), "username", device)?.to_owned();
            let service_id = required(entry.service_id.as_deref(), "service_id", device)?.to_owned();
            let service_url = entry
                .service_url
                .as_deref()
                .map(|raw| parse_url(raw, "service_url", device))
                .transpose()?;
            VendorSettings::Jablotron {
                panel,
                base_url: base_url_or(entry, device, hablink_api::jablotron::DEFAULT_BASE_URL)?,
                username,
                password: require_secret(entry, device, SecretKind::Password)?,
                service_id,
                service_url,
                code: resolve_secret(entry, device, SecretKind::Code),
            }
        }
        DeviceKind::Efergy => VendorSettings::Efergy {
            base_url: base_url_or(entry, device, hablink_api::efergy::DEFAULT_BASE_URL)?,
            token: require_secret(entry, device, SecretKind::Token)?,
            utc_offset: entry.utc_offset.unwrap_or(0),
        },
        DeviceKind::Smarwi => VendorSettings::Smarwi {
            host: required(entry.host.as_deref(), "host", device)?.to_owned(),
            websocket: entry.websocket.unwrap_or(false),
        },
        DeviceKind::PhilipsTv => {
            let base_url = match (&entry.base_url, &entry.host) {
                (Some(raw), _) => parse_url(raw, "base_url", device)?,
                (None, Some(host)) => parse_url(
                    &format!("https://{host}:{}/", hablink_api::philips::DEFAULT_PORT),
                    "host",
                    device,
                )?,
                (None, None) => {
                    return Err(ConfigError::Validation {
                        field: format!("devices.{device}.host"),
                        reason: "either host or base_url is required".into(),
                    });
                }
            };
            // Paired TVs need digest credentials; older ones answer anonymously.
            let credentials = entry.username.as_ref().map(|username| TvCredentials {
                username: username.clone(),
                password: resolve_secret(entry, device, SecretKind::Password)
                    .unwrap_or_else(|| SecretString::from(String::new())),
            });
            VendorSettings::PhilipsTv {
                base_url,
                api_version: entry
                    .api_version
                    .unwrap_or(hablink_api::philips::DEFAULT_API_VERSION),
                credentials,
            }
        }
    };
    Ok(settings)
}

/// Longest accepted refresh or timeout, one day.
pub const MAX_INTERVAL_SECS: u64 = 86_400;

fn seconds_in_range(id: &str, field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_INTERVAL_SECS).contains(&secs) {
        return Err(ConfigError::Validation {
            field: format!("devices.{id}.{field}"),
            reason: format!("must be between 1 and {MAX_INTERVAL_SECS} seconds, got {secs}"),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Build a `DeviceConfig` for device `id` from its entry and the global
/// defaults.
pub fn to_device_config(
    id: &str,
    entry: &DeviceEntry,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let refresh = seconds_in_range(id, "refresh", entry.refresh.unwrap_or(defaults.refresh))?;
    let timeout = seconds_in_range(id, "timeout", entry.timeout.unwrap_or(defaults.timeout))?;

    let mut config = DeviceConfig::new(id, vendor_settings(entry, id)?);
    config.label.clone_from(&entry.label);
    config.refresh = refresh;
    config.timeout = timeout;

    if entry.insecure.unwrap_or(false) {
        config.tls = TlsVerification::DangerAcceptInvalid;
    } else if let Some(ref ca_path) = entry.ca_cert {
        config.tls = TlsVerification::CustomCa(ca_path.clone());
    }
    Ok(config)
}

impl Config {
    /// Device configs for every entry, in id order.
    pub fn device_configs(&self) -> Result<Vec<DeviceConfig>, ConfigError> {
        self.devices
            .iter()
            .map(|(id, entry)| to_device_config(id, entry, &self.defaults))
            .collect()
    }

    /// Device config for one entry.
    pub fn device_config(&self, id: &str) -> Result<DeviceConfig, ConfigError> {
        let entry = self.devices.get(id).ok_or_else(|| ConfigError::Validation {
            field: "device".into(),
            reason: format!("no device named '{id}' in the config"),
        })?;
        to_device_config(id, entry, &self.defaults)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_devices_and_defaults() {
        let (_dir, path) = write_config(
            r#"
            [defaults]
            refresh = 30

            [devices.house]
            kind = "oasis"
            username = "me@example.com"
            password = "hunter2"
            service_id = "123456"
            code = "1234"

            [devices.window]
            kind = "smarwi"
            host = "192.168.1.50"
            websocket = true
            "#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.defaults.refresh, 30);
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(
            cfg.devices.keys().collect::<Vec<_>>(),
            vec!["house", "window"]
        );
        assert_eq!(cfg.devices["window"].kind, DeviceKind::Smarwi);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.defaults.refresh, 60);
        assert_eq!(cfg.defaults.output, "table");
    }

    #[test]
    fn unknown_kind_fails_to_load() {
        let (_dir, path) = write_config("[devices.x]\nkind = \"toaster\"\n");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn smarwi_entry_translates() {
        let mut entry = DeviceEntry::new(DeviceKind::Smarwi);
        entry.host = Some("192.168.1.50".into());
        entry.websocket = Some(true);
        entry.refresh = Some(5);
        entry.label = Some("Kitchen window".into());

        let config = to_device_config("window", &entry, &Defaults::default()).unwrap();
        assert_eq!(config.kind(), DeviceKind::Smarwi);
        assert_eq!(config.refresh, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.display_name(), "Kitchen window");
        assert!(matches!(
            config.settings,
            VendorSettings::Smarwi {
                websocket: true,
                ..
            }
        ));
    }

    #[test]
    fn jablotron_requires_service_id() {
        let mut entry = DeviceEntry::new(DeviceKind::Ja100);
        entry.username = Some("me@example.com".into());
        entry.password = Some("hunter2".into());

        let err = to_device_config("house", &entry, &Defaults::default()).unwrap_err();
        let ConfigError::Validation { field, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(field, "devices.house.service_id");
    }

    #[test]
    fn jablotron_uses_plaintext_secrets_as_last_resort() {
        let mut entry = DeviceEntry::new(DeviceKind::Oasis);
        entry.username = Some("me@example.com".into());
        entry.password = Some("hunter2".into());
        entry.service_id = Some("4242".into());
        entry.code = Some("1234".into());

        let config = to_device_config("hablink-test-plain", &entry, &Defaults::default()).unwrap();
        let VendorSettings::Jablotron {
            panel,
            password,
            code,
            base_url,
            ..
        } = config.settings
        else {
            panic!("expected Jablotron settings");
        };
        assert_eq!(panel, PanelKind::Oasis);
        assert_eq!(password.expose_secret(), "hunter2");
        assert_eq!(code.unwrap().expose_secret(), "1234");
        assert_eq!(base_url.as_str(), hablink_api::jablotron::DEFAULT_BASE_URL);
    }

    #[test]
    fn env_variable_wins_over_plaintext() {
        let mut entry = DeviceEntry::new(DeviceKind::Efergy);
        entry.token = Some("from-file".into());
        entry.token_env = Some("PATH".into());

        let token = resolve_secret(&entry, "hablink-test-env", SecretKind::Token).unwrap();
        assert_eq!(token.expose_secret(), std::env::var("PATH").unwrap());
    }

    #[test]
    fn efergy_without_token_has_no_credentials() {
        let entry = DeviceEntry::new(DeviceKind::Efergy);
        let err = to_device_config("hablink-test-none", &entry, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn tv_host_builds_default_url_and_trusts_self_signed() {
        let mut entry = DeviceEntry::new(DeviceKind::PhilipsTv);
        entry.host = Some("192.168.1.20".into());

        let config = to_device_config("tv", &entry, &Defaults::default()).unwrap();
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        let VendorSettings::PhilipsTv {
            base_url,
            api_version,
            credentials,
        } = config.settings
        else {
            panic!("expected Philips settings");
        };
        assert_eq!(base_url.as_str(), "https://192.168.1.20:1925/");
        assert_eq!(api_version, 6);
        assert!(credentials.is_none());
    }

    #[test]
    fn zero_refresh_is_rejected() {
        let mut entry = DeviceEntry::new(DeviceKind::Smarwi);
        entry.host = Some("w".into());
        entry.refresh = Some(0);
        assert!(matches!(
            to_device_config("w", &entry, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut entry = DeviceEntry::new(DeviceKind::Smarwi);
        entry.host = Some("w".into());
        entry.timeout = Some(0);
        let Err(ConfigError::Validation { field, .. }) =
            to_device_config("w", &entry, &Defaults::default())
        else {
            panic!("expected a validation error");
        };
        assert_eq!(field, "devices.w.timeout");
    }

    #[test]
    fn huge_refresh_from_defaults_is_rejected() {
        let mut entry = DeviceEntry::new(DeviceKind::Smarwi);
        entry.host = Some("w".into());
        let defaults = Defaults {
            refresh: u64::MAX,
            ..Defaults::default()
        };
        let Err(ConfigError::Validation { field, .. }) = to_device_config("w", &entry, &defaults)
        else {
            panic!("expected a validation error");
        };
        assert_eq!(field, "devices.w.refresh");

        entry.refresh = Some(MAX_INTERVAL_SECS);
        let config = to_device_config("w", &entry, &defaults).unwrap();
        assert_eq!(config.refresh, Duration::from_secs(MAX_INTERVAL_SECS));
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut entry = DeviceEntry::new(DeviceKind::Smarwi);
        entry.host = Some("192.168.1.50".into());
        cfg.devices.insert("window".into(), entry);
        save_config_to(&cfg, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[devices.window]"));
        assert!(!written.contains("password"));

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.devices["window"].host.as_deref(), Some("192.168.1.50"));
    }

    #[test]
    fn sample_config_parses() {
        let (_dir, path) = write_config(sample_config());
        let cfg = load_config_from(&path).unwrap();
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn secret_names_match_keyring_layout() {
        assert_eq!(SecretKind::Password.to_string(), "password");
        assert_eq!("token".parse::<SecretKind>().unwrap(), SecretKind::Token);
        assert_eq!(
            SecretKind::primary_for(DeviceKind::Efergy),
            Some(SecretKind::Token)
        );
        assert_eq!(SecretKind::primary_for(DeviceKind::Smarwi), None);
    }
}
