//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. `table` is a short
//! human-readable summary, structured formats use serde, plain emits one
//! value per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;

use pairlink_core::{LinkSession, LinkState};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Label for a link state, colored when `color` is set.
pub fn state_label(state: LinkState, color: bool) -> String {
    let label = match state {
        LinkState::Loading => "loading",
        LinkState::Connected => "linked",
        LinkState::Disconnected => "waiting for scan",
        LinkState::Error => "error",
    };
    if !color {
        return label.to_owned();
    }
    match state {
        LinkState::Connected => label.green().bold().to_string(),
        LinkState::Disconnected => label.yellow().bold().to_string(),
        LinkState::Error => label.red().bold().to_string(),
        LinkState::Loading => label.dimmed().to_string(),
    }
}

/// Human summary of a session snapshot.
pub fn session_detail(session: &LinkSession, color: bool) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = write!(out, "State:    {}", state_label(session.state, color));
    if let Some(ref identifier) = session.identifier {
        let _ = write!(out, "\nAccount:  {identifier}");
    }
    if let Some(ref code) = session.pairing_code {
        let _ = write!(out, "\nCode:     {code}");
    }
    if let Some(issued) = session.pairing_issued_at {
        let _ = write!(out, "\nIssued:   {}", issued.format("%H:%M:%S UTC"));
    }
    if session.consecutive_failures > 0 {
        let _ = write!(out, "\nFailures: {}", session.consecutive_failures);
    }
    if let Some(ref error) = session.last_error {
        let _ = write!(out, "\nError:    {error}");
    }
    out
}

/// One-value rendering of a session for `--output plain`.
pub fn session_plain(session: &LinkSession) -> String {
    match session.state {
        LinkState::Connected => session.identifier.clone().unwrap_or_default(),
        LinkState::Disconnected => session.pairing_code.clone().unwrap_or_default(),
        LinkState::Error => session.last_error.clone().unwrap_or_default(),
        LinkState::Loading => session.state.to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted
/// string, plain rendering calls `id_fn`.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
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

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

/// YAML output.
fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}
