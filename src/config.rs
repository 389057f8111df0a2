//! Configuration model, loading and validation.
//!
//! Configuration is read from YAML (default), JSON or TOML. Every field is
//! optional; missing values fall back to the defaults below. CLI overrides are
//! applied by the binary on top of the loaded file.

use ahash::AHashMap as HashMap;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::executor::replay_file_name;
use crate::parser::{LineFormat, LineParser, DEFAULT_PROCESS_PREFIX};
use crate::sample::Target;
use crate::store::TableName;

pub const DEFAULT_DATABASE: &str = "proc.sqlite";
pub const DEFAULT_PARALLELISM: usize = 1;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Placeholder replaced with the target name in command templates.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Installs `ps` inside slim database containers.
pub const DEFAULT_PROCESS_LIST_SETUP: &str = r#"rancher1 exec -it {target} /bin/bash -c "apt-get update && apt-get install -y procps && rm -rf /var/lib/apt/lists/* && apt autoremove && apt clean""#;

/// Config file locations probed when no path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/remote-proc-sampler/config.yaml",
    "/etc/remote-proc-sampler/config.yml",
    "/etc/remote-proc-sampler/config.json",
    "./remote-proc-sampler.yaml",
    "./remote-proc-sampler.yml",
    "./remote-proc-sampler.json",
];

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// One group of targets sharing a command and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub format: LineFormat,
    /// Destination table (default depends on format).
    pub table: Option<String>,
    /// Command template containing `{target}`.
    pub command: Option<String>,
    /// Workload process title prefix (process_list only).
    #[serde(alias = "process-prefix")]
    pub process_prefix: Option<String>,
    /// Optional one-off preparation command run by `prepare`.
    #[serde(alias = "setup-command")]
    pub setup_command: Option<String>,
    #[serde(default)]
    pub targets: Vec<String>,
}

impl SourceConfig {
    pub fn new(format: LineFormat) -> Self {
        Self {
            format,
            table: Some(format.default_table().to_string()),
            command: Some(format.default_command().to_string()),
            process_prefix: match format {
                LineFormat::ProcessList => Some(DEFAULT_PROCESS_PREFIX.to_string()),
                LineFormat::ContainerStats => None,
            },
            setup_command: match format {
                LineFormat::ProcessList => Some(DEFAULT_PROCESS_LIST_SETUP.to_string()),
                LineFormat::ContainerStats => None,
            },
            targets: Vec::new(),
        }
    }

    pub fn table_name(&self) -> Result<TableName, String> {
        TableName::new(
            self.table
                .as_deref()
                .unwrap_or_else(|| self.format.default_table()),
        )
    }

    pub fn command_template(&self) -> &str {
        self.command
            .as_deref()
            .unwrap_or_else(|| self.format.default_command())
    }

    pub fn build_parser(&self) -> Result<LineParser> {
        match self.format {
            LineFormat::ContainerStats => Ok(LineParser::container_stats()),
            LineFormat::ProcessList => {
                let prefix = self
                    .process_prefix
                    .as_deref()
                    .unwrap_or(DEFAULT_PROCESS_PREFIX);
                LineParser::process_list(prefix)
                    .with_context(|| format!("Invalid process_prefix '{}'", prefix))
            }
        }
    }
}

/// Substitutes `{target}` in a command template.
pub fn render_command(template: &str, target: &str) -> String {
    template.replace(TARGET_PLACEHOLDER, target)
}

/// Effective sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file.
    pub database: Option<PathBuf>,
    /// Worker pool size (1 = sample targets one after another).
    pub parallelism: Option<usize>,

    // Logging
    pub log_level: Option<String>,

    /// Prometheus textfile written after each pass.
    #[serde(alias = "metrics-file")]
    pub metrics_file: Option<PathBuf>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Some(PathBuf::from(DEFAULT_DATABASE)),
            parallelism: Some(DEFAULT_PARALLELISM),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            metrics_file: None,
            sources: vec![
                SourceConfig::new(LineFormat::ContainerStats),
                SourceConfig::new(LineFormat::ProcessList),
            ],
        }
    }
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or(DEFAULT_PARALLELISM).max(1)
    }

    pub fn target_count(&self) -> usize {
        self.sources.iter().map(|s| s.targets.len()).sum()
    }

    /// Distinct destination tables in configuration order.
    pub fn tables(&self) -> Result<Vec<TableName>> {
        let mut out: Vec<TableName> = Vec::new();
        for source in &self.sources {
            let table = source.table_name().map_err(anyhow::Error::msg)?;
            if !out.contains(&table) {
                out.push(table);
            }
        }
        Ok(out)
    }

    /// Expands every source into concrete targets, in configuration order.
    pub fn resolve_targets(&self) -> Result<Vec<Target>> {
        let mut targets = Vec::with_capacity(self.target_count());
        for source in &self.sources {
            let table = source.table_name().map_err(anyhow::Error::msg)?;
            let parser = Arc::new(source.build_parser()?);
            let template = source.command_template();
            for name in &source.targets {
                targets.push(Target {
                    name: name.clone(),
                    command: render_command(template, name),
                    table: table.clone(),
                    parser: Arc::clone(&parser),
                });
            }
        }
        Ok(targets)
    }
}

fn is_valid_target(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._/@:-".contains(c))
}

/// Validate effective config (used by --check-config and before every run)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.parallelism == Some(0) {
        bail!("parallelism must be at least 1");
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            bail!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            );
        }
    }

    // A table is fed by exactly one format so its memory column keeps one unit.
    let mut table_formats: HashMap<TableName, LineFormat> = HashMap::new();
    // Replay captures are keyed by sanitized target name, which must stay unique.
    let mut replay_files: HashMap<String, &str> = HashMap::new();

    for (i, source) in cfg.sources.iter().enumerate() {
        let ctx = format!("sources[{}] ({})", i, source.format);

        let table = source
            .table_name()
            .map_err(|e| anyhow::anyhow!("{}: {}", ctx, e))?;
        if let Some(other) = table_formats.insert(table.clone(), source.format) {
            if other != source.format {
                bail!(
                    "{}: table '{}' is already used by a {} source; \
                     mixing formats would mix memory units ({} vs {})",
                    ctx,
                    table,
                    other,
                    other.memory_unit(),
                    source.format.memory_unit()
                );
            }
        }

        if !source.command_template().contains(TARGET_PLACEHOLDER) {
            bail!("{}: command must contain {}", ctx, TARGET_PLACEHOLDER);
        }
        if let Some(setup) = source.setup_command.as_deref() {
            if !setup.contains(TARGET_PLACEHOLDER) {
                bail!("{}: setup_command must contain {}", ctx, TARGET_PLACEHOLDER);
            }
        }

        match (source.format, source.process_prefix.as_deref()) {
            (LineFormat::ContainerStats, Some(_)) => {
                bail!("{}: process_prefix only applies to process_list sources", ctx);
            }
            (LineFormat::ProcessList, Some(p)) if p.trim().is_empty() => {
                bail!("{}: process_prefix must not be empty", ctx);
            }
            _ => {}
        }

        let mut seen: Vec<&str> = Vec::with_capacity(source.targets.len());
        for target in &source.targets {
            if !is_valid_target(target) {
                bail!(
                    "{}: invalid target '{}', expected characters [A-Za-z0-9._/@:-]",
                    ctx,
                    target
                );
            }
            if seen.contains(&target.as_str()) {
                bail!("{}: duplicate target '{}'", ctx, target);
            }
            seen.push(target);

            if let Some(other) = replay_files.insert(replay_file_name(target), target.as_str()) {
                if other != target.as_str() {
                    bail!(
                        "{}: target '{}' collides with '{}' (both replay from {})",
                        ctx,
                        target,
                        other,
                        replay_file_name(target)
                    );
                }
            }
        }
    }

    Ok(())
}

/// Loads configuration from `path`, or from the first existing default
/// location. Returns the defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML config {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}
