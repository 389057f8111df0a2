//! Run command implementation.
//!
//! Performs exactly one sampling pass over every configured target.

use anyhow::{Context, Result};
use remote_proc_sampler::collector::SampleCollector;
use remote_proc_sampler::config::Config;
use remote_proc_sampler::executor::RemoteExecutor;
use remote_proc_sampler::report::{PassReport, PassTelemetry};
use remote_proc_sampler::store::SqliteStore;
use tracing::{debug, info, warn};

/// Ensures the schema, samples all targets once and prints the pass table.
///
/// Remote failures are part of the report; only store and launch failures
/// return an error.
pub fn command_run(config: &Config, executor: &dyn RemoteExecutor) -> Result<PassReport> {
    let db_path = config.database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open metric store {}", db_path.display()))?;

    let targets = config.resolve_targets()?;
    if targets.is_empty() {
        warn!("No targets configured, nothing to sample");
    }

    let collector = SampleCollector::new(targets, executor, &store)
        .with_parallelism(config.effective_parallelism());
    collector
        .ensure_schema()
        .with_context(|| format!("Failed to create tables in {}", db_path.display()))?;
    debug!("Schema ready in {}", db_path.display());

    let report = collector.run_pass()?;

    print!("{}", report.render_table());

    if let Some(path) = &config.metrics_file {
        let written = PassTelemetry::new()
            .map_err(anyhow::Error::from)
            .and_then(|t| {
                t.observe(&report);
                t.write_textfile(path)
            });
        match written {
            Ok(()) => info!("Telemetry written to {}", path.display()),
            Err(e) => warn!("Failed to write telemetry to {}: {:#}", path.display(), e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_proc_sampler::config::SourceConfig;
    use remote_proc_sampler::executor::ReplayExecutor;
    use remote_proc_sampler::parser::LineFormat;
    use remote_proc_sampler::store::TableName;
    use std::fs;

    #[test]
    fn test_run_with_replay_dir() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("replay");
        fs::create_dir(&replay).unwrap();
        fs::write(
            replay.join("ad-node4.out"),
            "NAME CONTAINER CPU % MEM USAGE / LIMIT\nweb1 abc123 12.3% 512MiB / 2GiB\n",
        )
        .unwrap();
        fs::write(
            replay.join("adhoc-pg-demo_postgres.out"),
            "%CPU %MEM COMMAND\n 1.50  2.00 postgres: odoo matelec idle\n",
        )
        .unwrap();

        let mut containers = SourceConfig::new(LineFormat::ContainerStats);
        containers.targets = vec!["ad-node4".into(), "ad-node5".into()];
        let mut pg = SourceConfig::new(LineFormat::ProcessList);
        pg.targets = vec!["adhoc-pg-demo/postgres".into()];

        let config = Config {
            database: Some(dir.path().join("proc.sqlite")),
            parallelism: Some(2),
            log_level: None,
            metrics_file: Some(dir.path().join("sampler.prom")),
            sources: vec![containers, pg],
        };

        let report = command_run(&config, &ReplayExecutor::new(&replay)).unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed_targets(), 1);
        assert_eq!(report.rows_written(), 2);
        assert!(dir.path().join("sampler.prom").exists());

        // A second pass appends rather than replaces.
        command_run(&config, &ReplayExecutor::new(&replay)).unwrap();
        let store = SqliteStore::open(&config.database_path()).unwrap();
        assert_eq!(store.row_count(&TableName::new("nodes").unwrap()).unwrap(), 2);
        assert_eq!(store.row_count(&TableName::new("proc").unwrap()).unwrap(), 2);
    }

    #[test]
    fn test_run_creates_tables_of_configured_targets() {
        let dir = tempfile::tempdir().unwrap();
        let mut containers = SourceConfig::new(LineFormat::ContainerStats);
        containers.targets = vec!["ad-node9".into()];
        let config = Config {
            database: Some(dir.path().join("proc.sqlite")),
            sources: vec![containers, SourceConfig::new(LineFormat::ProcessList)],
            ..Config::default()
        };

        // The only target has no capture, so nothing is appended.
        let report = command_run(&config, &ReplayExecutor::new(dir.path())).unwrap();
        assert_eq!(report.failed_targets(), 1);

        let store = SqliteStore::open(&config.database_path()).unwrap();
        assert_eq!(store.row_count(&TableName::new("nodes").unwrap()).unwrap(), 0);
        assert!(store.row_count(&TableName::new("proc").unwrap()).is_err());
    }
}
