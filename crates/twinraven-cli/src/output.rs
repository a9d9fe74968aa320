use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::args::OutputFormat;

/// Prints `value` as pretty JSON when `format` is [`OutputFormat::Json`],
/// otherwise hands it to `plain` for a human-readable rendering. Color is
/// skipped automatically when stdout isn't a terminal.
pub fn render<T, F>(format: OutputFormat, value: &T, plain: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Plain => plain(value),
    }
    Ok(())
}

pub fn colorize_enabled() -> bool {
    std::io::stdout().is_terminal()
}

pub fn ok(label: &str) -> String {
    if colorize_enabled() {
        label.green().to_string()
    } else {
        label.to_string()
    }
}

pub fn warn(label: &str) -> String {
    if colorize_enabled() {
        label.yellow().to_string()
    } else {
        label.to_string()
    }
}
