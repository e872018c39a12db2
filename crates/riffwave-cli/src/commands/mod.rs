//! Command handlers

pub mod convert;
pub mod extract;
pub mod generate;
pub mod info;

use anyhow::Context;
use serde::Serialize;
use std::io::Write;

use crate::OutputFormat;

/// Serialize `value` as JSON to `out`, if a JSON format was requested
///
/// Returns false for text output so the caller prints its own layout.
pub(crate) fn write_json<T: Serialize>(
    value: &T,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<bool> {
    let text = match format {
        OutputFormat::Text => return Ok(false),
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    writeln!(out, "{}", text).context("failed to write report")?;
    Ok(true)
}
