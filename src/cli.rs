//! CLI arguments and subcommands for remote-proc-sampler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use remote_proc_sampler::parser::LineFormat;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_config(level: &str) -> Option<Self> {
        match level {
            "off" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format of a remote command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceFormat {
    /// `docker stats --no-stream` table
    ContainerStats,
    /// `ps -Ao pcpu,pmem,args` listing
    ProcessList,
}

impl From<SourceFormat> for LineFormat {
    fn from(f: SourceFormat) -> Self {
        match f {
            SourceFormat::ContainerStats => LineFormat::ContainerStats,
            SourceFormat::ProcessList => LineFormat::ProcessList,
        }
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "remote-proc-sampler",
    about = "Samples per-process CPU and memory usage from remote hosts into SQLite",
    long_about = "Samples per-process CPU and memory usage from remote hosts into SQLite.\n\n\
                  Runs one sampling pass per invocation: every configured target's command \
                  (docker stats over ssh, ps inside a container, ...) is executed, its output \
                  parsed into (label, cpu, memory) tuples and appended to a SQLite table. \
                  Schedule it from cron or a systemd timer.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// SQLite database file
    #[arg(short = 'd', long)]
    pub database: Option<PathBuf>,

    /// Number of targets sampled concurrently
    #[arg(short = 'j', long)]
    pub parallelism: Option<usize>,

    /// Write pass telemetry in Prometheus text format to this file
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Read captured outputs from <DIR>/<target>.out instead of running commands
    #[arg(long, value_name = "DIR")]
    pub replay_dir: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one sampling pass (default)
    Run,

    /// Validate configuration and the metric store
    Check {
        /// Execute every target's command and report what it would store
        #[arg(long)]
        probe: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Parse captured command output and print the resulting tuples
    Parse {
        /// Format of the captured output
        #[arg(short = 'f', long, value_enum)]
        format: SourceFormat,

        /// Workload process title prefix (process-list only)
        #[arg(long)]
        process_prefix: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        output_format: ConfigFormat,

        /// Input file ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
    },

    /// Run each source's setup command on its targets
    Prepare,

    /// Generate synthetic captured outputs for --replay-dir
    GenerateTestdata {
        /// Output directory
        #[arg(short = 'o', long, default_value = "testdata")]
        output: PathBuf,

        /// Containers per container-stats target
        #[arg(long, default_value_t = 6)]
        containers: usize,

        /// Backend processes per process-list target
        #[arg(long, default_value_t = 12)]
        backends: usize,
    },
}
