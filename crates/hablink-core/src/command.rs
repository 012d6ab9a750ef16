// ── Host commands ──
//
// Commands arrive from the host as a channel name plus a generic value.
// Each vendor translates the pair into its own command type; anything it
// does not recognise is rejected as unsupported.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A generic command value, independent of any vendor.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Re-read the device now.
    Refresh,
    OnOff(bool),
    Up,
    Down,
    Stop,
    Percent(u8),
    Decimal(f64),
    Text(String),
}

impl FromStr for HostCommand {
    type Err = Infallible;

    /// Parse command-line text: keywords first, then integers 0-100 as
    /// percent, other numbers as decimal, anything else as text.
    ///
    /// Digit strings with a leading zero stay text so codes like `0042`
    /// survive intact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() > 1 && trimmed.starts_with('0') && !trimmed.starts_with("0.") {
            return Ok(Self::Text(s.to_owned()));
        }
        let cmd = match trimmed.to_ascii_uppercase().as_str() {
            "REFRESH" => Self::Refresh,
            "ON" => Self::OnOff(true),
            "OFF" => Self::OnOff(false),
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "STOP" => Self::Stop,
            _ => {
                if let Ok(n) = trimmed.parse::<u8>() {
                    if n <= 100 {
                        return Ok(Self::Percent(n));
                    }
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => Self::Decimal(v),
                    _ => Self::Text(s.to_owned()),
                }
            }
        };
        Ok(cmd)
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refresh => f.write_str("REFRESH"),
            Self::OnOff(true) => f.write_str("ON"),
            Self::OnOff(false) => f.write_str("OFF"),
            Self::Up => f.write_str("UP"),
            Self::Down => f.write_str("DOWN"),
            Self::Stop => f.write_str("STOP"),
            Self::Percent(p) => write!(f, "{p}"),
            Self::Decimal(v) => write!(f, "{v}"),
            // Text may be a user code
            Self::Text(_) => f.write_str("<text>"),
        }
    }
}

/// A command addressed to one channel of a device.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub channel: String,
    pub command: HostCommand,
}

impl PendingCommand {
    pub fn new(channel: impl Into<String>, command: HostCommand) -> Self {
        Self {
            channel: channel.into(),
            command,
        }
    }

    pub fn is_refresh(&self) -> bool {
        self.command == HostCommand::Refresh
    }
}
