//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use hablink_core::{Availability, ChannelState, Update};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Availability text, green when online and red otherwise.
pub fn availability_text(availability: Option<&Availability>, color: bool) -> String {
    let Some(availability) = availability else {
        return "unknown".into();
    };
    let text = availability.to_string();
    match (color, availability.is_online()) {
        (false, _) => text,
        (true, true) => text.green().to_string(),
        (true, false) => text.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact` / `yaml`: serializes the data itself
/// - `plain`: calls `line_fn` on each item
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    let out = match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&line_fn).collect::<Vec<_>>().join("\n"),
    };
    Ok(out)
}

/// Render one update as a single line for streaming output.
///
/// Structured formats emit one document per update so the stream stays
/// parseable line by line.
pub fn render_update(format: OutputFormat, update: &Update, color: bool) -> Result<String, CliError> {
    let out = match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(update)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(update)?),
        OutputFormat::Plain => match update {
            Update::State {
                device,
                channel,
                value,
            } => format!("{device}/{channel}={value}"),
            Update::Status {
                device,
                availability,
            } => format!("{device}={availability}"),
        },
        OutputFormat::Table => match update {
            Update::State {
                device,
                channel,
                value,
            } => {
                if color {
                    format!("{:<16} {:<24} {}", device.cyan(), channel, value.bold())
                } else {
                    format!("{device:<16} {channel:<24} {value}")
                }
            }
            Update::Status {
                device,
                availability,
            } => {
                let text = availability_text(Some(availability), color);
                if color {
                    format!("{:<16} {:<24} {text}", device.cyan(), "(status)".dimmed())
                } else {
                    format!("{device:<16} {:<24} {text}", "(status)")
                }
            }
        },
    };
    Ok(out)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Shared rows ──────────────────────────────────────────────────────

/// One channel reading, as rendered by `poll` and `send --wait`.
#[derive(Debug, serde::Serialize)]
pub struct Reading {
    pub channel: String,
    #[serde(flatten)]
    pub value: ChannelState,
}

#[derive(Tabled)]
pub struct ReadingRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&Reading> for ReadingRow {
    fn from(r: &Reading) -> Self {
        Self {
            channel: r.channel.clone(),
            value: r.value.to_string(),
        }
    }
}

pub fn readings(channels: Vec<(String, ChannelState)>) -> Vec<Reading> {
    channels
        .into_iter()
        .map(|(channel, value)| Reading { channel, value })
        .collect()
}

/// Render channel readings in the chosen format.
pub fn render_readings(format: OutputFormat, data: &[Reading]) -> Result<String, CliError> {
    render_list(format, data, |r| ReadingRow::from(r), |r| {
        format!("{}={}", r.channel, r.value)
    })
}
