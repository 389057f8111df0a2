//! Parse command implementation.
//!
//! Runs a line parser over captured command output, which makes it possible
//! to debug a new host's output without touching the metric store.

use anyhow::{Context, Result};
use remote_proc_sampler::parser::{LineFormat, LineParser, DEFAULT_PROCESS_PREFIX};
use remote_proc_sampler::sample::{MemoryUnit, MetricTuple};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use crate::cli::ConfigFormat;

/// Parse result as printed to stdout.
#[derive(Debug, Serialize)]
pub struct ParseOutput {
    pub format: LineFormat,
    pub memory_unit: MemoryUnit,
    pub skipped_lines: usize,
    pub rejected_lines: usize,
    pub tuples: Vec<MetricTuple>,
}

/// Parses `content` with the parser for `format`.
pub fn parse_content(
    content: &str,
    format: LineFormat,
    process_prefix: Option<&str>,
) -> Result<ParseOutput> {
    let parser = match format {
        LineFormat::ContainerStats => LineParser::container_stats(),
        LineFormat::ProcessList => {
            LineParser::process_list(process_prefix.unwrap_or(DEFAULT_PROCESS_PREFIX))?
        }
    };
    let parsed = parser.parse(content);

    Ok(ParseOutput {
        format,
        memory_unit: format.memory_unit(),
        skipped_lines: parsed.skipped,
        rejected_lines: parsed.rejected,
        tuples: parsed.tuples,
    })
}

fn read_input(input: &Path) -> Result<String> {
    if input.to_string_lossy() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        let bytes =
            fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Parses captured output and prints the tuples.
pub fn command_parse(
    format: LineFormat,
    process_prefix: Option<&str>,
    output_format: ConfigFormat,
    input: &Path,
) -> Result<()> {
    let content = read_input(input)?;
    debug!("Parsing {} bytes as {}", content.len(), format);

    let out = parse_content(&content, format, process_prefix)?;
    let rendered = match output_format {
        ConfigFormat::Json => serde_json::to_string_pretty(&out)?,
        ConfigFormat::Toml => toml::to_string_pretty(&out)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&out)?,
    };
    println!("{rendered}");
    Ok(())
}
