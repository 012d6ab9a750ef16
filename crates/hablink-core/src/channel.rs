//! Channel model and publisher.
//!
//! Devices expose their state as named channels. After every successful
//! poll the machine publishes each channel of the new snapshot, and it
//! publishes availability changes as they happen. Publishing is
//! fire-and-forget: a publisher never blocks the poll loop.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tokio::sync::broadcast;

const UPDATE_CHANNEL_SIZE: usize = 512;

// ── Channel values ───────────────────────────────────────────────────

/// The value of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ChannelState {
    OnOff(bool),
    /// `true` means open.
    OpenClosed(bool),
    Decimal(f64),
    Percent(u8),
    Text(String),
    DateTime(DateTime<FixedOffset>),
}

impl ChannelState {
    pub fn on_off(stav: i64) -> Self {
        Self::OnOff(stav == 1)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnOff(true) => f.write_str("ON"),
            Self::OnOff(false) => f.write_str("OFF"),
            Self::OpenClosed(true) => f.write_str("OPEN"),
            Self::OpenClosed(false) => f.write_str("CLOSED"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

// ── Availability ─────────────────────────────────────────────────────

/// Why a device is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StatusDetail {
    CommunicationError,
    ConfigurationError,
    Unavailable,
    None,
}

/// Device availability as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Availability {
    Online,
    Offline { detail: StatusDetail, message: String },
}

impl Availability {
    pub fn offline(detail: StatusDetail, message: impl Into<String>) -> Self {
        Self::Offline {
            detail,
            message: message.into(),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline { detail, message } if message.is_empty() => {
                write!(f, "offline ({detail})")
            }
            Self::Offline { detail, message } => write!(f, "offline ({detail}): {message}"),
        }
    }
}

// ── Snapshots ────────────────────────────────────────────────────────

/// A typed, immutable device snapshot.
pub trait DeviceStatus: fmt::Debug + Send + Sync + 'static {
    /// Every channel of the snapshot, in display order.
    fn channels(&self) -> Vec<(String, ChannelState)>;
}

// ── Publishing ───────────────────────────────────────────────────────

/// One change delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Update {
    State {
        device: String,
        channel: String,
        value: ChannelState,
    },
    Status {
        device: String,
        availability: Availability,
    },
}

impl Update {
    pub fn device(&self) -> &str {
        match self {
            Self::State { device, .. } | Self::Status { device, .. } => device,
        }
    }
}

/// Sink for channel values and device availability.
pub trait Publisher: Send + Sync + 'static {
    fn publish_state(&self, device: &str, channel: &str, value: ChannelState);
    fn publish_status(&self, device: &str, availability: Availability);
}

/// Publisher fanning updates out to any number of subscribers.
///
/// Updates sent while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Update>,
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.tx.subscribe()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish_state(&self, device: &str, channel: &str, value: ChannelState) {
        let _ = self.tx.send(Update::State {
            device: device.to_owned(),
            channel: channel.to_owned(),
            value,
        });
    }

    fn publish_status(&self, device: &str, availability: Availability) {
        let _ = self.tx.send(Update::Status {
            device: device.to_owned(),
            availability,
        });
    }
}
