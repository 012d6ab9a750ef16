//! CLI-side config glue: honours `--config` and selects devices.

use std::path::PathBuf;
use std::time::Duration;

use hablink_config::Config;
use hablink_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file path: `--config` if given, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(hablink_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(hablink_config::load_config_from(&config_path(global))?)
}

/// Device configs for `ids`, or every configured device when `ids` is
/// empty.
pub fn select_devices(
    cfg: &Config,
    ids: &[String],
    global: &GlobalOpts,
) -> Result<Vec<DeviceConfig>, CliError> {
    if cfg.devices.is_empty() {
        return Err(CliError::NoDevices {
            path: config_path(global).display().to_string(),
        });
    }
    if ids.is_empty() {
        return Ok(cfg.device_configs()?);
    }
    ids.iter().map(|id| device_config(cfg, id)).collect()
}

/// Config for one device, as `NotFound` when the id is not configured.
pub fn device_config(cfg: &Config, id: &str) -> Result<DeviceConfig, CliError> {
    if !cfg.devices.contains_key(id) {
        return Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: id.into(),
            list_command: "devices".into(),
        });
    }
    Ok(cfg.device_config(id)?)
}

/// Config for a one-shot command: the ticker is pushed out past the
/// command's lifetime so only explicit polls hit the device.
pub fn one_shot(mut config: DeviceConfig) -> DeviceConfig {
    config.initial_delay = config.refresh.max(Duration::from_secs(3600));
    config
}
