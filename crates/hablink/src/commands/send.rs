//! `hablink send <device> <channel> <command>`.

use std::time::Duration;

use hablink_core::{DispatchReport, HostCommand, Hub};
use tracing::info;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

/// Grace period after the last confirmation poll is due.
const SETTLE: Duration = Duration::from_millis(500);

pub async fn handle(args: &SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = crate::config::load(global)?;
    let device = crate::config::device_config(&cfg, &args.device)?;
    let hub = super::single_device_hub(device)?;

    let result = send(&hub, args, global).await;
    hub.dispose_all().await;
    let rendered = result?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn send(hub: &Hub, args: &SendArgs, global: &GlobalOpts) -> Result<String, CliError> {
    let Ok(command) = args.command.parse::<HostCommand>();
    let report = hub
        .handle_command(&args.device, &args.channel, command)
        .await?;
    info!(
        device = %args.device,
        channel = %args.channel,
        follow_ups = report.follow_ups.len(),
        "command accepted"
    );

    if !args.wait {
        return Ok(accepted_message(args, &report));
    }

    // Confirmation polls run on the device actor; wait them out, then read
    // the settled state.
    if let Some(last) = report.follow_ups.iter().max() {
        tokio::time::sleep(*last + SETTLE).await;
    }
    hub.poll_now(&args.device).await?;
    let channels = hub.device(&args.device)?.channels().unwrap_or_default();
    output::render_readings(global.output, &output::readings(channels))
}

fn accepted_message(args: &SendArgs, report: &DispatchReport) -> String {
    match report.follow_ups.len() {
        0 => format!("{}/{}: accepted", args.device, args.channel),
        n => format!(
            "{}/{}: accepted, {n} confirmation poll(s) pending (use --wait to see the result)",
            args.device, args.channel
        ),
    }
}
