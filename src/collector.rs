//! One sampling pass across all configured targets.
//!
//! The pass timestamp is taken once before fan-out. Targets are sampled on a
//! bounded rayon pool; each target's sample is appended to the store on its
//! own, so a failing or slow target never affects the others. Only local
//! failures (cannot launch the shell, store unavailable) abort the pass.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::io;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::executor::RemoteExecutor;
use crate::report::{PassReport, TargetOutcome, TargetStatus};
use crate::sample::{Sample, Target};
use crate::store::{MetricStore, StoreError};

/// Sample of one target plus line accounting from its parser.
#[derive(Debug)]
pub struct TargetSample {
    pub sample: Sample,
    pub status: TargetStatus,
    pub skipped: usize,
    pub rejected: usize,
}

pub struct SampleCollector<'a> {
    targets: Vec<Target>,
    executor: &'a dyn RemoteExecutor,
    store: &'a dyn MetricStore,
    parallelism: usize,
}

impl<'a> SampleCollector<'a> {
    pub fn new(
        targets: Vec<Target>,
        executor: &'a dyn RemoteExecutor,
        store: &'a dyn MetricStore,
    ) -> Self {
        Self {
            targets,
            executor,
            store,
            parallelism: 1,
        }
    }

    /// Sets the worker pool size; values below 1 are treated as 1.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Creates every destination table that does not exist yet.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut done = Vec::new();
        for target in &self.targets {
            if !done.contains(&target.table) {
                self.store.ensure_schema(&target.table)?;
                done.push(target.table.clone());
            }
        }
        Ok(())
    }

    /// Runs the target's command and parses its output.
    ///
    /// A non-zero exit status yields an empty sample; it is not an error.
    pub fn sample_target(
        &self,
        target: &Target,
        timestamp: DateTime<Local>,
    ) -> io::Result<TargetSample> {
        let output = self.executor.execute(target)?;

        if !output.success() {
            warn!(
                "Command failed on {} (exit status {}): {}",
                target.name,
                output.status,
                output.stderr_lossy()
            );
            return Ok(TargetSample {
                sample: Sample::empty(&target.name, timestamp),
                status: TargetStatus::Failed {
                    exit_status: output.status,
                },
                skipped: 0,
                rejected: 0,
            });
        }

        let parsed = target.parser.parse(&output.stdout_lossy());
        debug!(
            "Parsed {} tuples from {} ({} skipped, {} rejected lines)",
            parsed.tuples.len(),
            target.name,
            parsed.skipped,
            parsed.rejected
        );

        Ok(TargetSample {
            sample: Sample {
                target: target.name.clone(),
                timestamp,
                tuples: parsed.tuples,
            },
            status: TargetStatus::Ok,
            skipped: parsed.skipped,
            rejected: parsed.rejected,
        })
    }

    fn collect_one(&self, target: &Target, timestamp: DateTime<Local>) -> Result<TargetOutcome> {
        let _span = info_span!("sample", target = %target.name).entered();
        let start = Instant::now();

        let ts = self
            .sample_target(target, timestamp)
            .with_context(|| format!("Failed to launch command for {}", target.name))?;

        let rows_written = self
            .store
            .append(&target.table, &ts.sample)
            .with_context(|| format!("Failed to store sample for {}", target.name))?;

        Ok(TargetOutcome {
            target: target.name.clone(),
            table: target.table.clone(),
            format: target.parser.format(),
            status: ts.status,
            rows_written,
            skipped_lines: ts.skipped,
            rejected_lines: ts.rejected,
            duration_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Samples every target once and appends the results.
    pub fn run_pass(&self) -> Result<PassReport> {
        let start = Instant::now();
        let timestamp = Local::now();
        info!(
            "Starting pass over {} targets with {} workers",
            self.targets.len(),
            self.parallelism
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("sampler-{i}"))
            .build()
            .context("Failed to build worker pool")?;

        let outcomes: Vec<TargetOutcome> = pool.install(|| {
            self.targets
                .par_iter()
                .map(|target| self.collect_one(target, timestamp))
                .collect::<Result<Vec<_>>>()
        })?;

        let report = PassReport {
            timestamp,
            outcomes,
            duration_seconds: start.elapsed().as_secs_f64(),
        };

        info!(
            "Pass completed: {} targets, {} failed, {} rows written, {:.2}ms",
            report.outcomes.len(),
            report.failed_targets(),
            report.rows_written(),
            report.duration_seconds * 1000.0
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::CommandOutput;
    use crate::parser::{LineParser, DEFAULT_PROCESS_PREFIX};
    use crate::store::{SqliteStore, TableName};
    use ahash::AHashMap as HashMap;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Executor answering from a fixed map of target name to output.
    #[derive(Default)]
    struct FakeExecutor {
        outputs: HashMap<String, CommandOutput>,
        delay: Option<(String, Duration)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeExecutor {
        fn respond(mut self, target: &str, status: i32, stdout: &str, stderr: &str) -> Self {
            self.outputs.insert(
                target.to_string(),
                CommandOutput {
                    stdout: stdout.as_bytes().to_vec(),
                    status,
                    stderr: stderr.as_bytes().to_vec(),
                },
            );
            self
        }
    }

    impl RemoteExecutor for FakeExecutor {
        fn run(&self, target_name: &str, _command: &str) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(target_name.to_string());
            if let Some((slow, d)) = &self.delay {
                if slow == target_name {
                    thread::sleep(*d);
                }
            }
            match self.outputs.get(target_name) {
                Some(o) => Ok(o.clone()),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "no shell")),
            }
        }
    }

    fn container_target(name: &str) -> Target {
        Target {
            name: name.to_string(),
            command: format!("ssh {name} docker stats"),
            table: TableName::new("nodes").unwrap(),
            parser: Arc::new(LineParser::container_stats()),
        }
    }

    fn process_target(name: &str) -> Target {
        Target {
            name: name.to_string(),
            command: format!("rancher1 exec -it {name} ps"),
            table: TableName::new("proc").unwrap(),
            parser: Arc::new(LineParser::process_list(DEFAULT_PROCESS_PREFIX).unwrap()),
        }
    }

    const DOCKER_OUTPUT: &str = "NAME CONTAINER CPU % MEM USAGE / LIMIT\n\
                                 web1 abc123 12.3% 512MiB / 2GiB\n\
                                 db1 def456 1.0% 1GiB / 2GiB\n";

    #[test]
    fn test_failed_target_yields_empty_sample() {
        let exec = FakeExecutor::default().respond("ad-node4", 255, "", "ssh: connect refused");
        let store = SqliteStore::open_in_memory().unwrap();
        let collector = SampleCollector::new(vec![container_target("ad-node4")], &exec, &store);

        let ts = collector
            .sample_target(&collector.targets()[0], Local::now())
            .unwrap();
        assert!(ts.sample.tuples.is_empty());
        assert_eq!(ts.status, TargetStatus::Failed { exit_status: 255 });
    }

    #[test]
    fn test_pass_continues_after_failed_target() {
        let exec = FakeExecutor::default()
            .respond("ad-node4", 1, "", "boom")
            .respond("ad-node5", 0, DOCKER_OUTPUT, "")
            .respond(
                "adhoc-pg-demo/postgres",
                0,
                " 1.5  2.0 postgres: odoo odoo idle\n 3.0  1.0 postgres: odoo odoo idle\n",
                "",
            );
        let store = SqliteStore::open_in_memory().unwrap();
        let collector = SampleCollector::new(
            vec![
                container_target("ad-node4"),
                container_target("ad-node5"),
                process_target("adhoc-pg-demo/postgres"),
            ],
            &exec,
            &store,
        );
        collector.ensure_schema().unwrap();

        let report = collector.run_pass().unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed_targets(), 1);
        assert_eq!(report.rows_written(), 3);
        assert_eq!(store.row_count(&TableName::new("nodes").unwrap()).unwrap(), 2);
        assert_eq!(store.row_count(&TableName::new("proc").unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_all_targets_share_one_timestamp() {
        let exec = FakeExecutor {
            delay: Some(("ad-node4".to_string(), Duration::from_millis(20))),
            ..Default::default()
        }
        .respond("ad-node4", 0, DOCKER_OUTPUT, "")
        .respond("ad-node5", 0, DOCKER_OUTPUT, "");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proc.sqlite");
        let store = SqliteStore::open(&path).unwrap();
        let collector = SampleCollector::new(
            vec![container_target("ad-node4"), container_target("ad-node5")],
            &exec,
            &store,
        )
        .with_parallelism(2);
        collector.ensure_schema().unwrap();
        collector.run_pass().unwrap();

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT timestamp FROM nodes").unwrap();
        let timestamps: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(timestamps.len(), 1);
        let targets: i64 = conn
            .query_row("SELECT COUNT(DISTINCT target) FROM nodes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(targets, 2);
    }

    #[test]
    fn test_parallel_pass_samples_every_target_once() {
        let names: Vec<String> = (0..8).map(|i| format!("node{i}")).collect();
        let mut exec = FakeExecutor::default();
        for n in &names {
            exec = exec.respond(n, 0, DOCKER_OUTPUT, "");
        }
        let store = SqliteStore::open_in_memory().unwrap();
        let collector = SampleCollector::new(
            names.iter().map(|n| container_target(n)).collect(),
            &exec,
            &store,
        )
        .with_parallelism(4);
        collector.ensure_schema().unwrap();

        let report = collector.run_pass().unwrap();
        let reported: Vec<&str> = report.outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(reported, names.iter().map(String::as_str).collect::<Vec<_>>());

        let mut calls = exec.calls.lock().unwrap().clone();
        calls.sort();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(calls, expected);
        assert_eq!(report.rows_written(), 16);
    }

    #[test]
    fn test_launch_failure_aborts_pass() {
        let exec = FakeExecutor::default();
        let store = SqliteStore::open_in_memory().unwrap();
        let collector = SampleCollector::new(vec![container_target("ad-db")], &exec, &store);
        collector.ensure_schema().unwrap();
        assert!(collector.run_pass().is_err());
    }

    #[test]
    fn test_missing_schema_is_fatal() {
        let exec = FakeExecutor::default().respond("ad-db", 0, DOCKER_OUTPUT, "");
        let store = SqliteStore::open_in_memory().unwrap();
        let collector = SampleCollector::new(vec![container_target("ad-db")], &exec, &store);
        let err = collector.run_pass().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to store sample for ad-db"));
    }
}
