//! Command handlers, one module per subcommand.

pub mod completions;
pub mod config_cmd;
pub mod devices;
pub mod poll;
pub mod run;
pub mod send;

use hablink_core::{BroadcastPublisher, DeviceConfig, Hub};

use crate::error::CliError;

/// A hub running just `config`.
pub(crate) fn single_device_hub(config: DeviceConfig) -> Result<Hub, CliError> {
    Ok(Hub::from_configs(
        [crate::config::one_shot(config)],
        BroadcastPublisher::new(),
    )?)
}
