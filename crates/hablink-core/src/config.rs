// ── Runtime device configuration ──
//
// These types describe *how* to reach one device. They carry credential
// data and polling tuning, but never touch disk. The CLI builds a
// `DeviceConfig` per configured device and hands it to the hub.

use std::time::Duration;

use hablink_api::transport::{TlsMode, TransportConfig};
use hablink_api::{PanelKind, TvCredentials};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default polling period.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(60);

/// Delay before the first poll after start.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// How many one-second re-polls a command waits for control to be enabled.
pub const DEFAULT_CONTROL_WAIT_ATTEMPTS: u32 = 30;

/// Supported device families, as written in the config file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceKind {
    Oasis,
    Ja100,
    Efergy,
    Smarwi,
    PhilipsTv,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for cloud services.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs on LAN devices).
    DangerAcceptInvalid,
}

/// Vendor-specific connection settings.
#[derive(Debug, Clone)]
pub enum VendorSettings {
    Jablotron {
        panel: PanelKind,
        base_url: Url,
        username: String,
        password: SecretString,
        service_id: String,
        /// Explicit service page; derived from `service_id` when absent.
        service_url: Option<Url>,
        /// User code sent when a command carries none.
        code: Option<SecretString>,
    },
    Efergy {
        base_url: Url,
        token: SecretString,
        /// Minutes east of UTC.
        utc_offset: i32,
    },
    Smarwi {
        host: String,
        websocket: bool,
    },
    PhilipsTv {
        base_url: Url,
        api_version: u8,
        credentials: Option<TvCredentials>,
    },
}

impl VendorSettings {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Jablotron {
                panel: PanelKind::Oasis,
                ..
            } => DeviceKind::Oasis,
            Self::Jablotron {
                panel: PanelKind::Ja100,
                ..
            } => DeviceKind::Ja100,
            Self::Efergy { .. } => DeviceKind::Efergy,
            Self::Smarwi { .. } => DeviceKind::Smarwi,
            Self::PhilipsTv { .. } => DeviceKind::PhilipsTv,
        }
    }
}

/// Configuration for one managed device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Stable identifier (the config table key).
    pub id: String,
    /// Human-readable name.
    pub label: Option<String>,
    pub settings: VendorSettings,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Polling period (fixed delay between polls).
    pub refresh: Duration,
    pub initial_delay: Duration,
    pub control_wait_attempts: u32,
}

impl DeviceConfig {
    /// A config with default tuning for `settings`.
    pub fn new(id: impl Into<String>, settings: VendorSettings) -> Self {
        let tls = match settings {
            VendorSettings::PhilipsTv { .. } => TlsVerification::DangerAcceptInvalid,
            _ => TlsVerification::SystemDefaults,
        };
        Self {
            id: id.into(),
            label: None,
            settings,
            tls,
            timeout: hablink_api::transport::DEFAULT_TIMEOUT,
            refresh: DEFAULT_REFRESH,
            initial_delay: DEFAULT_INITIAL_DELAY,
            control_wait_attempts: DEFAULT_CONTROL_WAIT_ATTEMPTS,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.settings.kind()
    }

    /// Label if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Build a [`TransportConfig`] from the device configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
