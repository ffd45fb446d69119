//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for pipes, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `TICKETRY_FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use ticketry_core::TicketError;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output (sections, visual framing).
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(json_flag: bool, format_env: Option<&str>, is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {}
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from the `--json` flag, environment, and TTY defaults.
pub fn resolve_output_mode(json_flag: bool) -> OutputMode {
    let env_val = std::env::var("TICKETRY_FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(json_flag, env_val.as_deref(), is_tty)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize + ?Sized>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2001").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Build from any error chain, keeping the ticket error code when present.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        err.downcast_ref::<TicketError>()
            .map_or_else(|| Self::new(format!("{err:#}")), Self::from)
    }
}

impl From<&TicketError> for CliError {
    fn from(err: &TicketError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: err.hint().map(str::to_string),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn format_env_is_case_insensitive() {
        assert_eq!(
            resolve_output_mode_inner(false, Some("TEXT"), true),
            OutputMode::Text
        );
        assert_eq!(
            resolve_output_mode_inner(false, Some("Json"), false),
            OutputMode::Json
        );
    }

    #[test]
    fn unknown_env_falls_through_to_tty() {
        assert_eq!(
            resolve_output_mode_inner(false, Some("yaml"), true),
            OutputMode::Pretty
        );
        assert_eq!(resolve_output_mode_inner(false, None, false), OutputMode::Text);
    }

    #[test]
    fn ticket_error_keeps_code_and_hint() {
        let err = TicketError::Conflict {
            ticket_id: "tk-1".into(),
            expected: 2,
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2006"));
        assert!(cli.suggestion.is_some());
    }

    #[test]
    fn anyhow_wrapping_ticket_error_is_recovered() {
        let err = anyhow::Error::new(TicketError::NotFound {
            key: "tk-missing".into(),
        });
        let cli = CliError::from_anyhow(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2001"));
    }

    #[test]
    fn plain_error_has_no_code() {
        let cli = CliError::from_anyhow(&anyhow::anyhow!("disk full"));
        assert_eq!(cli.message, "disk full");
        assert!(cli.error_code.is_none());
    }

    #[test]
    fn json_error_is_wrapped() {
        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &CliError::new("boom")).expect("write");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["error"]["message"], "boom");
    }

    #[test]
    fn text_error_has_prefix() {
        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &CliError::new("boom")).expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "error: boom\n");
    }

    #[test]
    fn pretty_kv_pads_key() {
        let mut buf = Vec::new();
        pretty_kv(&mut buf, "status", "open").expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "status:      open\n");
    }
}
