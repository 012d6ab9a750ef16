// Jablotron cloud wire models
//
// The cloud is inconsistent: the same collection may come back as a JSON
// array or as an object keyed by stringified index, integers sometimes
// arrive as strings and flags as 0/1. Everything here decodes leniently and
// missing fields default instead of failing.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Cloud status code for a successful call.
pub const STATUS_OK: i64 = 200;
/// Panel is busy (another client is controlling it).
pub const STATUS_BUSY: i64 = 201;
/// Redirect, not supported.
pub const STATUS_REDIRECT: i64 = 300;
/// No session / session expired.
pub const STATUS_NO_SESSION: i64 = 800;
/// Control result asking for the user code.
pub const RESULT_CODE_REQUIRED: i64 = 4;

// ── Lenient scalars ──────────────────────────────────────────────────

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Bool(b) => b,
        ref other => as_int(other).is_some_and(|n| n != 0),
    })
}

fn de_opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(as_int(&value))
}

fn de_int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(de_opt_int(d)?.unwrap_or_default())
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ── Login / control ──────────────────────────────────────────────────

/// Response of `ajax/login.php`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default, deserialize_with = "de_int")]
    pub status: i64,
}

impl LoginResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Response of `ovladani.php`.
///
/// `vysledek` ("result") is absent when the cloud refused the request
/// outright; the caller treats that as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControlResponse {
    #[serde(default, deserialize_with = "de_int")]
    pub status: i64,
    #[serde(default, deserialize_with = "de_opt_int")]
    pub vysledek: Option<i64>,
}

impl ControlResponse {
    /// The panel wants the user code before it acts.
    pub fn needs_code(&self) -> bool {
        self.status == STATUS_OK && self.vysledek == Some(RESULT_CODE_REQUIRED)
    }
}

// ── Sections / PGM outputs ───────────────────────────────────────────

/// Per-index `stav` values of a `sekce` or `pgm` collection.
///
/// Accepts both the array shape `[{"stav":1}, ...]` and the object shape
/// `{"0": {"stav":1}, ...}`. Unknown indices read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentList(BTreeMap<usize, i64>);

impl SegmentList {
    fn from_value(value: &Value) -> Self {
        let stav = |entry: &Value| entry.get("stav").and_then(as_int).unwrap_or_default();
        let map = match value {
            Value::Array(items) => items.iter().map(stav).enumerate().collect(),
            Value::Object(entries) => entries
                .iter()
                .filter(|(_, entry)| entry.is_object())
                .filter_map(|(key, entry)| key.parse::<usize>().ok().map(|i| (i, stav(entry))))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self(map)
    }

    /// `stav` at `index`, 0 when absent.
    pub fn state(&self, index: usize) -> i64 {
        self.0.get(&index).copied().unwrap_or_default()
    }

    /// Whether the entry at `index` reads as "on" (stav == 1).
    pub fn is_on(&self, index: usize) -> bool {
        self.state(index) == 1
    }

    /// `(index, stav)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.0.iter().map(|(i, s)| (*i, *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SegmentList {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(Self::from_value(&value))
    }
}

impl<const N: usize> From<[i64; N]> for SegmentList {
    fn from(states: [i64; N]) -> Self {
        Self(states.into_iter().enumerate().collect())
    }
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastEntry {
    #[serde(default)]
    pub cid: Option<CidEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CidEntry {
    /// Unix seconds.
    #[serde(default, deserialize_with = "de_int")]
    pub time: i64,
}

/// Response of `stav.php`, shared by OASIS and JA-100 panels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default, deserialize_with = "de_int")]
    pub status: i64,
    #[serde(default)]
    pub sekce: Option<SegmentList>,
    #[serde(default)]
    pub pgm: Option<SegmentList>,
    #[serde(default, rename = "isAlarm", deserialize_with = "de_flag")]
    pub is_alarm: bool,
    #[serde(default, rename = "controlDisabled", deserialize_with = "de_flag")]
    pub control_disabled: bool,
    #[serde(default, deserialize_with = "de_opt_int")]
    pub service: Option<i64>,
    #[serde(default)]
    pub vypis: Option<Value>,
    #[serde(default)]
    pub last_entry: Option<LastEntry>,
}

impl StatusResponse {
    /// Decode a `stav.php` body.
    pub fn from_body(body: &str) -> Result<Self, Error> {
        serde_json::from_str(body).map_err(|e| Error::decode(&e, body))
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn is_busy(&self) -> bool {
        self.status == STATUS_BUSY
    }

    pub fn is_no_session(&self) -> bool {
        self.status == STATUS_NO_SESSION
    }

    pub fn in_service(&self) -> bool {
        self.service == Some(1)
    }

    pub fn has_section_status(&self) -> bool {
        self.sekce.is_some()
    }

    /// Time of the last panel entry, when the cloud includes it.
    pub fn last_event_time(&self) -> Option<DateTime<Utc>> {
        let secs = self.last_entry.as_ref()?.cid.as_ref()?.time;
        if secs <= 0 {
            return None;
        }
        DateTime::from_timestamp(secs, 0)
    }

    /// Events embedded in `vypis` (day → id → event). Empty when absent.
    pub fn events(&self) -> Vec<PanelEvent> {
        let Some(Value::Object(days)) = &self.vypis else {
            return Vec::new();
        };
        days.values()
            .filter_map(Value::as_object)
            .flat_map(|day| day.values())
            .filter_map(|entry| serde_json::from_value::<OasisEvent>(entry.clone()).ok())
            .map(PanelEvent::from)
            .collect()
    }
}

// ── Events / history ─────────────────────────────────────────────────

/// Event as listed by OASIS panels.
#[derive(Debug, Clone, Deserialize)]
pub struct OasisEvent {
    #[serde(default, deserialize_with = "de_string")]
    pub datum: String,
    #[serde(default, deserialize_with = "de_string")]
    pub code: String,
    #[serde(default, deserialize_with = "de_string")]
    pub event: String,
    #[serde(default, rename = "class", alias = "eventClass", deserialize_with = "de_string")]
    pub class: String,
}

/// Event as listed by JA-100 panels.
#[derive(Debug, Clone, Deserialize)]
pub struct Ja100Event {
    #[serde(default, deserialize_with = "de_string")]
    pub date: String,
    #[serde(default, rename = "section-name", deserialize_with = "de_string")]
    pub section: String,
    #[serde(default, rename = "event-text", deserialize_with = "de_string")]
    pub event: String,
    #[serde(default, rename = "icon-type", deserialize_with = "de_string")]
    pub class: String,
}

/// Panel event normalized across panel families.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelEvent {
    pub time: Option<DateTime<FixedOffset>>,
    pub text: String,
    pub class: String,
    pub code: Option<String>,
    pub section: Option<String>,
}

/// Parse the timestamps the cloud uses: RFC 3339 for JA-100, a plain
/// `YYYY-MM-DD HH:MM:SS` (UTC) for OASIS.
pub fn parse_event_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
    })
}

impl From<OasisEvent> for PanelEvent {
    fn from(e: OasisEvent) -> Self {
        Self {
            time: parse_event_time(&e.datum),
            text: e.event,
            class: e.class,
            code: Some(e.code).filter(|c| !c.is_empty()),
            section: None,
        }
    }
}

impl From<Ja100Event> for PanelEvent {
    fn from(e: Ja100Event) -> Self {
        Self {
            time: parse_event_time(&e.date),
            text: e.event,
            class: e.class,
            code: None,
            section: Some(e.section).filter(|s| !s.is_empty()),
        }
    }
}

/// OASIS `historie.php`: `{"events": {"<day>": [event, ...], ...}}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OasisHistory {
    #[serde(default)]
    events: Option<BTreeMap<String, Value>>,
}

impl OasisHistory {
    pub(crate) fn into_events(self) -> Vec<PanelEvent> {
        self.events
            .unwrap_or_default()
            .into_values()
            .filter_map(|day| serde_json::from_value::<Vec<OasisEvent>>(day).ok())
            .flatten()
            .map(PanelEvent::from)
            .collect()
    }
}

/// JA-100 `historie.php`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ja100History {
    #[serde(default, rename = "ResponseCode", deserialize_with = "de_int")]
    response_code: i64,
    #[serde(default, rename = "HistoryData")]
    history: Option<Ja100HistoryData>,
}

#[derive(Debug, Default, Deserialize)]
struct Ja100HistoryData {
    #[serde(default, rename = "Events")]
    events: Vec<Ja100Event>,
}

impl Ja100History {
    pub(crate) fn into_events(self) -> Vec<PanelEvent> {
        if self.response_code != STATUS_OK {
            return Vec::new();
        }
        self.history
            .map(|h| h.events.into_iter().map(PanelEvent::from).collect())
            .unwrap_or_default()
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// One service ("widget") on the account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceWidget {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub url: String,
    #[serde(default, rename = "templateService", deserialize_with = "de_string")]
    pub template_service: String,
}

/// Response of `ajax/widget-new.php`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WidgetsResponse {
    #[serde(default, deserialize_with = "de_int")]
    pub status: i64,
    #[serde(default)]
    pub widgets: Vec<ServiceWidget>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn segment_list_accepts_array_shape() {
        let list: SegmentList =
            serde_json::from_value(json!([{"stav": 1}, {"stav": 0}, {"stav": "2"}])).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.is_on(0));
        assert_eq!(list.state(1), 0);
        assert_eq!(list.state(2), 2);
        assert_eq!(list.state(10), 0);
    }

    #[test]
    fn segment_list_accepts_object_shape() {
        let list: SegmentList = serde_json::from_value(json!({
            "0": {"stav": 0},
            "3": {"stav": 1},
            "junk": {"stav": 1},
            "4": "not an object"
        }))
        .unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.is_on(3));
        assert_eq!(list.state(4), 0);
    }

    #[test]
    fn status_null_sections_means_no_section_status() {
        let status = StatusResponse::from_body(r#"{"status":200,"sekce":null}"#).unwrap();
        assert!(status.is_ok());
        assert!(!status.has_section_status());
        assert!(!status.in_service());
    }

    #[test]
    fn status_flags_decode_leniently() {
        let status = StatusResponse::from_body(
            r#"{"status":"201","isAlarm":1,"controlDisabled":true,"service":"1"}"#,
        )
        .unwrap();
        assert!(status.is_busy());
        assert!(status.is_alarm);
        assert!(status.control_disabled);
        assert!(status.in_service());
    }

    #[test]
    fn status_last_entry_time() {
        let status = StatusResponse::from_body(
            r#"{"status":200,"last_entry":{"cid":{"time":1521133652}}}"#,
        )
        .unwrap();
        let time = status.last_event_time().unwrap();
        assert_eq!(time.timestamp(), 1_521_133_652);
    }

    #[test]
    fn status_vypis_events_flatten() {
        let status = StatusResponse::from_body(
            r#"{"status":200,"vypis":{"2018-03-15":{"1":{"datum":"2018-03-15 18:07:32","code":"1","event":"Armed","class":"arm"}}}}"#,
        )
        .unwrap();
        let events = status.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "Armed");
        assert_eq!(events[0].code.as_deref(), Some("1"));
        assert!(events[0].time.is_some());
    }

    #[test]
    fn control_response_code_required() {
        let resp: ControlResponse =
            serde_json::from_str(r#"{"status":200,"vysledek":4}"#).unwrap();
        assert!(resp.needs_code());

        let resp: ControlResponse = serde_json::from_str(r#"{"status":200}"#).unwrap();
        assert!(!resp.needs_code());
        assert_eq!(resp.vysledek, None);
    }

    #[test]
    fn ja100_history_requires_ok_code() {
        let history: Ja100History = serde_json::from_value(json!({
            "ResponseCode": 200,
            "EventsCount": 1,
            "HistoryData": {"Events": [{
                "date": "2018-03-15T18:07:32+01:00",
                "section-name": "Garage",
                "event-text": "Unset",
                "icon-type": "disarm"
            }]}
        }))
        .unwrap();
        let events = history.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].section.as_deref(), Some("Garage"));
        assert_eq!(events[0].class, "disarm");

        let history: Ja100History =
            serde_json::from_value(json!({"ResponseCode": 500})).unwrap();
        assert!(history.into_events().is_empty());
    }

    #[test]
    fn oasis_history_skips_non_array_days() {
        let history: OasisHistory = serde_json::from_value(json!({
            "events": {
                "2018-03-15": [{"datum": "2018-03-15 10:00:00", "code": "7", "event": "Set", "class": "arm"}],
                "meta": {"count": 1}
            }
        }))
        .unwrap();
        let events = history.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class, "arm");
    }

    #[test]
    fn event_time_formats() {
        assert!(parse_event_time("2018-03-15T18:07:32+01:00").is_some());
        assert!(parse_event_time("2018-03-15 18:07:32").is_some());
        assert!(parse_event_time("yesterday").is_none());
        assert!(parse_event_time("").is_none());
    }
}
