//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hablink_config::ConfigError;
use hablink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach {target}: {reason}")]
    #[diagnostic(
        code(hablink::connection_failed),
        help("Check that the device or cloud service is reachable from this machine.")
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Device '{device}' is unavailable: {reason}")]
    #[diagnostic(
        code(hablink::unavailable),
        help("Run: hablink poll {device} -v to see what the device reports")
    )]
    Unavailable { device: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(hablink::auth_failed),
        help(
            "Verify the credentials in your config.\n\
             Store a new secret with: hablink config set-password <device>"
        )
    )]
    AuthFailed { message: String },

    #[error("No {secret} configured for device '{device}'")]
    #[diagnostic(
        code(hablink::no_credentials),
        help(
            "Run: hablink config set-password {device} --secret {secret}\n\
             Or set {secret}_env in the device's config table."
        )
    )]
    NoCredentials { device: String, secret: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(hablink::not_found),
        help("Run: hablink {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Command rejected: {message}")]
    #[diagnostic(code(hablink::rejected))]
    Rejected { message: String },

    #[error("Channel '{channel}' does not accept {command}")]
    #[diagnostic(
        code(hablink::unsupported),
        help("Run: hablink poll <device> to list the device's channels")
    )]
    Unsupported { channel: String, command: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(hablink::api_error))]
    ApiError { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hablink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No devices configured")]
    #[diagnostic(
        code(hablink::no_devices),
        help(
            "Create a config with: hablink config init\n\
             Expected at: {path}"
        )
    )]
    NoDevices { path: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(hablink::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(hablink::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(hablink::timeout),
        help("Increase timeout in the [defaults] table or check the device.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(hablink::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Unavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Unsupported { .. } | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotLoggedIn { device } => CliError::Unavailable {
                device,
                reason: "not logged in".into(),
            },

            CoreError::DeviceUnavailable { device, reason } => {
                CliError::Unavailable { device, reason }
            }

            CoreError::DeviceDisposed { device } => CliError::Unavailable {
                device,
                reason: "device was shut down".into(),
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::CommandRejected { code, reason } => CliError::Rejected {
                message: match code {
                    Some(code) => format!("{reason} (code {code})"),
                    None => reason,
                },
            },

            CoreError::UnsupportedCommand { channel, command } => {
                CliError::Unsupported { channel, command }
            }

            CoreError::Api { message, status } => CliError::ApiError { status, message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { device, secret } => {
                CliError::NoCredentials { device, secret }
            }
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Serialization(e) => CliError::Toml(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
