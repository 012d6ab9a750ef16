// ── Core error types ──
//
// User-facing errors from hablink-core. Consumers never see HTTP status
// codes or JSON parse failures directly. The `From<hablink_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Not logged in to {device}")]
    NotLoggedIn { device: String },

    #[error("Device {device} is unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Device {device} has been disposed")]
    DeviceDisposed { device: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Command rejected{}: {reason}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    CommandRejected { code: Option<i64>, reason: String },

    #[error("Unsupported command {command} on channel {channel}")]
    UnsupportedCommand { channel: String, command: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors caused by bad credentials or settings rather than the network.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::Config { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hablink_api::Error> for CoreError {
    fn from(err: hablink_api::Error) -> Self {
        match err {
            hablink_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            hablink_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            hablink_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            hablink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            hablink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            hablink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            hablink_api::Error::UnexpectedStatus { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            hablink_api::Error::Vendor { code, message } => CoreError::CommandRejected {
                code: Some(code),
                reason: message,
            },
            hablink_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            hablink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
