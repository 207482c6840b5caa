//! `masterplan formats` command: list or check channel formats.

use anyhow::{Result, bail};

use masterplan_core::channels::{ChannelFormatTable, validate_format};

/// One line per channel, default format first.
pub fn render_table(table: &ChannelFormatTable, channel: Option<&str>) -> Result<String> {
    let mut out = String::new();
    match channel {
        Some(name) => {
            let Some(entry) = table.channel(name) else {
                bail!("unknown channel: {name}");
            };
            for (i, format) in entry.formats.iter().enumerate() {
                let marker = if i == 0 { " (default)" } else { "" };
                out.push_str(&format!("{format}{marker}\n"));
            }
        }
        None => {
            let width = table
                .channels()
                .iter()
                .map(|c| c.name.chars().count())
                .max()
                .unwrap_or(0);
            for entry in table.channels() {
                out.push_str(&format!(
                    "{:<width$}  {}\n",
                    entry.name,
                    entry.formats.join(", ")
                ));
            }
        }
    }
    Ok(out)
}

/// Describe whether `format` is valid for `channel`, and its replacement if not.
pub fn render_check(table: &ChannelFormatTable, channel: &str, format: &str) -> String {
    let valid = validate_format(channel, format, table);
    if table.is_allowed(channel, format) {
        format!("{valid}: valid for {channel}")
    } else if table.channel(channel).is_none() {
        format!("{format}: unknown channel {channel}, would use {valid}")
    } else {
        format!("{format}: not offered on {channel}, would use {valid}")
    }
}

/// Run the formats command.
pub fn run_formats(table: &ChannelFormatTable, channel: Option<&str>, check: Option<&str>) -> Result<()> {
    match (channel, check) {
        (Some(channel), Some(format)) => println!("{}", render_check(table, channel, format)),
        (None, Some(_)) => bail!("--check needs a channel"),
        (channel, None) => print!("{}", render_table(table, channel)?),
    }
    Ok(())
}
