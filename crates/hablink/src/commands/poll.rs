//! `hablink poll <device>`: one poll cycle, then print the channels.

use hablink_core::{Hub, OutcomeKind};
use tracing::debug;

use crate::cli::{GlobalOpts, PollArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &PollArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = crate::config::load(global)?;
    let device = crate::config::device_config(&cfg, &args.device)?;
    let hub = super::single_device_hub(device)?;

    let result = poll_and_render(&hub, &args.device, global).await;
    hub.dispose_all().await;
    let rendered = result?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn poll_and_render(hub: &Hub, id: &str, global: &GlobalOpts) -> Result<String, CliError> {
    let report = hub.poll_now(id).await?;
    debug!(device = id, outcome = %report.outcome, relogged_in = report.relogged_in, "poll finished");

    let handle = hub.device(id)?;
    match (report.outcome, handle.channels()) {
        (OutcomeKind::Ok, Some(channels)) => {
            output::render_readings(global.output, &output::readings(channels))
        }
        (outcome, _) => Err(CliError::Unavailable {
            device: id.to_owned(),
            reason: handle
                .availability()
                .filter(|a| !a.is_online())
                .map_or_else(|| format!("poll ended with {outcome}"), |a| a.to_string()),
        }),
    }
}
