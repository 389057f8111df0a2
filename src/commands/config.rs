//! Config command implementation.
//!
//! Writes the default configuration in YAML, JSON or TOML.

use anyhow::Result;
use remote_proc_sampler::config::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Serializes a configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Generates configuration files
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("remote-proc-sampler.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Remote Process Sampler Configuration
# ====================================
#
# Storage
# -------
# database: "proc.sqlite"      # SQLite file, tables are created on first run
#
# Sampling
# --------
# parallelism: 1               # Targets sampled concurrently (1 = one after another)
#
# Logging / Telemetry
# -------------------
# log_level: "info"            # off, error, warn, info, debug, trace
# metrics_file: null           # Prometheus textfile written after each pass
#
# Sources
# -------
# Each source groups targets sharing one command and output format.
#   format: container_stats    # docker stats table, memory stored in bytes
#   format: process_list       # ps pcpu/pmem listing, memory stored in percent
#   table: nodes               # Destination table (one format per table)
#   command: "ssh {target} ..."   # {target} is replaced by each target
#   process_prefix: "postgres: "  # process_list only: workload title prefix
#   setup_command: "..."       # Optional, run by the `prepare` subcommand
#   targets: [ad-node4, ad-db] # Hosts or host/service pairs
"#;

    format!("{comments}\n{yaml}")
}
