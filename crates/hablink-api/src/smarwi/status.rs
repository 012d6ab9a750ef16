// Smarwi `key:value` status format
//
// Both `/statusn` and the `/ws` push channel deliver the same text: one
// `key:value` pair per line. Lines that are not exactly one pair are ignored.

use std::collections::BTreeMap;

use serde::Serialize;

/// Placeholder for properties the device did not report.
pub const NOT_AVAILABLE: &str = "N/A";

/// Decoded status lines of a Smarwi unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusLines(BTreeMap<String, String>);

impl StatusLines {
    pub fn parse(text: &str) -> Self {
        let map = text
            .lines()
            .filter_map(|line| {
                let mut parts = line.trim_end_matches('\r').split(':');
                let key = parts.next()?;
                let value = parts.next()?;
                if parts.next().is_some() || key.is_empty() {
                    return None;
                }
                Some((key.to_owned(), value.to_owned()))
            })
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, or [`NOT_AVAILABLE`].
    pub fn property(&self, key: &str) -> &str {
        self.get(key).unwrap_or(NOT_AVAILABLE)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Window reported as open (`pos:o`).
    pub fn is_open(&self) -> bool {
        self.get("pos") == Some("o")
    }

    /// Online but not ready to move (`ro:1`).
    pub fn is_not_ready(&self) -> bool {
        self.get("ro") == Some("1")
    }

    pub fn device_type(&self) -> &str {
        self.property("t")
    }

    pub fn firmware(&self) -> &str {
        self.property("fw")
    }

    pub fn rssi(&self) -> &str {
        self.property("rssi")
    }

    /// User-assigned name (`cid`).
    pub fn name(&self) -> &str {
        self.property("cid")
    }

    pub fn state_code(&self) -> &str {
        self.property("s")
    }

    pub fn error_code(&self) -> &str {
        self.property("e")
    }
}
