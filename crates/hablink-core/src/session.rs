//! Per-device vendor session.
//!
//! Holds the opaque token (cookie or application token) together with the
//! hour it was created in. The token is only handed out while the session
//! is valid; once invalidated it is dropped, so a stale cookie can never
//! reach the vendor without a fresh login in between.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Session state for one device. Owned by that device's poll machine.
#[derive(Debug, Default)]
pub struct SessionStore {
    token: Option<SecretString>,
    created_at_hour: Option<u32>,
    valid: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly obtained token, created during `hour`.
    pub fn establish(&mut self, token: impl Into<String>, hour: u32) {
        self.token = Some(SecretString::from(token.into()));
        self.created_at_hour = Some(hour);
        self.valid = true;
    }

    /// Drop the token. Idempotent.
    pub fn invalidate(&mut self, reason: &str) {
        if self.valid {
            debug!(reason, "session invalidated");
        }
        self.token = None;
        self.valid = false;
    }

    /// The token, only while the session is valid.
    pub fn token(&self) -> Option<&str> {
        if !self.valid {
            return None;
        }
        self.token.as_ref().map(|t| t.expose_secret())
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Hour the current (or last) session was created in.
    pub fn created_at_hour(&self) -> Option<u32> {
        self.created_at_hour
    }

    /// Invalidate a session created in an earlier hour than `hour`.
    ///
    /// Returns `true` when the session was dropped.
    pub fn roll_hour(&mut self, hour: u32) -> bool {
        if self.valid && self.created_at_hour != Some(hour) {
            self.invalidate("hour boundary");
            return true;
        }
        false
    }
}
