//! `hablink run`: start every selected device and stream updates until
//! Ctrl-C.

use hablink_core::{BroadcastPublisher, Hub};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = crate::config::load(global)?;
    let devices = crate::config::select_devices(&cfg, &args.devices, global)?;

    let publisher = BroadcastPublisher::new();
    // Subscribe before any actor starts so the first poll is not missed.
    let hub = Hub::new(publisher);
    let mut updates = Box::pin(hub.updates());
    for device in &devices {
        if let Err(e) = hub.add(device) {
            hub.dispose_all().await;
            return Err(e.into());
        }
    }
    info!(devices = hub.len(), "polling started");

    let color = output::should_color(global.color);
    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            update = updates.next() => {
                let Some(update) = update else { break Ok(()) };
                match output::render_update(global.output, &update, color) {
                    Ok(line) => output::print_output(&line, global.quiet),
                    Err(e) => break Err(e),
                }
            }
        }
    };

    info!("shutting down");
    hub.dispose_all().await;
    if let Err(ref e) = result {
        warn!(error = %e, "stopped on error");
    }
    result
}
