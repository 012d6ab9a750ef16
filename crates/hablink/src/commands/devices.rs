//! `hablink devices`: list configured devices, or discover the services
//! visible to a Jablotron account.

use hablink_api::jablotron::ServiceWidget;
use hablink_config::{Config, DeviceEntry};
use hablink_core::DeviceKind;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ConfiguredDevice {
    id: String,
    label: String,
    kind: DeviceKind,
    /// Host, account or cloud the device is reached through.
    target: String,
    refresh_secs: u64,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Refresh")]
    refresh: String,
}

impl From<&ConfiguredDevice> for DeviceRow {
    fn from(d: &ConfiguredDevice) -> Self {
        Self {
            id: d.id.clone(),
            label: d.label.clone(),
            kind: d.kind.to_string(),
            target: d.target.clone(),
            refresh: format!("{}s", d.refresh_secs),
        }
    }
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    template: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl From<&ServiceWidget> for ServiceRow {
    fn from(s: &ServiceWidget) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            template: s.template_service.clone(),
            url: s.url.clone(),
        }
    }
}

fn target(entry: &DeviceEntry) -> String {
    let target = match entry.kind {
        DeviceKind::Oasis | DeviceKind::Ja100 => entry.username.as_deref(),
        DeviceKind::Smarwi | DeviceKind::PhilipsTv => {
            entry.host.as_deref().or(entry.base_url.as_deref())
        }
        DeviceKind::Efergy => entry.base_url.as_deref(),
    };
    target.unwrap_or("-").to_owned()
}

fn configured(cfg: &Config) -> Vec<ConfiguredDevice> {
    cfg.devices
        .iter()
        .map(|(id, entry)| ConfiguredDevice {
            id: id.clone(),
            label: entry.label.clone().unwrap_or_else(|| id.clone()),
            kind: entry.kind,
            target: target(entry),
            refresh_secs: entry.refresh.unwrap_or(cfg.defaults.refresh),
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = crate::config::load(global)?;

    let rendered = match &args.discover {
        None => output::render_list(global.output, &configured(&cfg), |d| DeviceRow::from(d), |d| {
            d.id.clone()
        })?,
        Some(id) => {
            let device = crate::config::device_config(&cfg, id)?;
            let services = hablink_core::discover_services(&device).await?;
            output::render_list(global.output, &services, |s| ServiceRow::from(s), |s| s.id.clone())?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
