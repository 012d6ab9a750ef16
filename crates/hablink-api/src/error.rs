use thiserror::Error;

/// Top-level error type for the `hablink-api` crate.
///
/// Covers every failure mode across the vendor clients: authentication,
/// transport, vendor result codes, WebSocket push and payload decoding.
/// `hablink-core` classifies these into poll outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, missing token, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Session cookie or token is no longer accepted by the vendor.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status where the vendor has no error envelope.
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // ── Vendor ──────────────────────────────────────────────────────
    /// Vendor-level failure reported inside an otherwise valid response.
    #[error("Vendor error ({code}): {message}")]
    Vendor { code: i64, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Payload decoding failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the remote host could not be reached at all.
    ///
    /// Distinguishes a device that is switched off (connection refused)
    /// from one that answered with garbage.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Build a `Deserialization` error from a serde failure, keeping the body.
    pub(crate) fn decode(err: &serde_json::Error, body: &str) -> Self {
        let preview = &body[..floor_char_boundary(body, 200)];
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    }

    /// Map a reqwest send error, surfacing timeouts with the configured budget.
    pub(crate) fn from_send(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

/// Largest char boundary `<= max` so previews never split a UTF-8 sequence.
pub(crate) fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
