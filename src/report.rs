//! Pass summary and telemetry.
//!
//! `PassReport` describes what one pass did per target. It can be rendered as
//! a plain-text table for operators and exported as Prometheus gauges to a
//! textfile for node_exporter's textfile collector.

use chrono::{DateTime, Local};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::parser::LineFormat;
use crate::store::TableName;

/// How the remote side of one target behaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Ok,
    Failed { exit_status: i32 },
}

/// Result of sampling and storing one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub table: TableName,
    pub format: LineFormat,
    pub status: TargetStatus,
    pub rows_written: usize,
    pub skipped_lines: usize,
    pub rejected_lines: usize,
    pub duration_seconds: f64,
}

/// Everything one pass produced, in target configuration order.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub timestamp: DateTime<Local>,
    pub outcomes: Vec<TargetOutcome>,
    pub duration_seconds: f64,
}

impl PassReport {
    pub fn failed_targets(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TargetStatus::Failed { .. }))
            .count()
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn rejected_lines(&self) -> usize {
        self.outcomes.iter().map(|o| o.rejected_lines).sum()
    }

    pub fn render_table(&self) -> String {
        let left_col = 32usize;
        let col_w = 10usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "target",
            "table",
            "status",
            "rows",
            "rejected",
            "time (s)",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 5)).ok();

        for o in &self.outcomes {
            let status = match o.status {
                TargetStatus::Ok => "ok".to_string(),
                TargetStatus::Failed { exit_status } => format!("exit {exit_status}"),
            };
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                o.target,
                o.table.as_str(),
                status,
                o.rows_written,
                o.rejected_lines,
                format!("{:.3}", o.duration_seconds),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(
            out,
            "pass at {}: {} targets, {} failed, {} rows written in {:.3}s",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.outcomes.len(),
            self.failed_targets(),
            self.rows_written(),
            self.duration_seconds
        )
        .ok();

        out
    }
}

/// Prometheus gauges describing the last pass.
pub struct PassTelemetry {
    registry: Registry,
    targets_total: Gauge,
    targets_failed: Gauge,
    rows_written: Gauge,
    lines_rejected: Gauge,
    pass_duration: Gauge,
    last_pass_timestamp: Gauge,
    target_rows: GaugeVec,
    target_up: GaugeVec,
}

impl PassTelemetry {
    /// Creates and registers all gauges with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let targets_total = Gauge::new(
            "remote_proc_sampler_targets_total",
            "Number of targets attempted in the last pass",
        )?;
        let targets_failed = Gauge::new(
            "remote_proc_sampler_targets_failed",
            "Number of targets whose remote command failed in the last pass",
        )?;
        let rows_written = Gauge::new(
            "remote_proc_sampler_rows_written",
            "Rows appended to the metric store in the last pass",
        )?;
        let lines_rejected = Gauge::new(
            "remote_proc_sampler_lines_rejected",
            "Malformed output lines dropped in the last pass",
        )?;
        let pass_duration = Gauge::new(
            "remote_proc_sampler_pass_duration_seconds",
            "Wall time of the last pass",
        )?;
        let last_pass_timestamp = Gauge::new(
            "remote_proc_sampler_last_pass_timestamp_seconds",
            "Unix time at which the last pass started",
        )?;
        let target_rows = GaugeVec::new(
            Opts::new(
                "remote_proc_sampler_target_rows",
                "Rows appended per target in the last pass",
            ),
            &["target", "table", "format"],
        )?;
        let target_up = GaugeVec::new(
            Opts::new(
                "remote_proc_sampler_target_up",
                "Whether the target's remote command succeeded (1) or failed (0)",
            ),
            &["target", "table", "format"],
        )?;

        registry.register(Box::new(targets_total.clone()))?;
        registry.register(Box::new(targets_failed.clone()))?;
        registry.register(Box::new(rows_written.clone()))?;
        registry.register(Box::new(lines_rejected.clone()))?;
        registry.register(Box::new(pass_duration.clone()))?;
        registry.register(Box::new(last_pass_timestamp.clone()))?;
        registry.register(Box::new(target_rows.clone()))?;
        registry.register(Box::new(target_up.clone()))?;

        Ok(Self {
            registry,
            targets_total,
            targets_failed,
            rows_written,
            lines_rejected,
            pass_duration,
            last_pass_timestamp,
            target_rows,
            target_up,
        })
    }

    pub fn observe(&self, report: &PassReport) {
        self.targets_total.set(report.outcomes.len() as f64);
        self.targets_failed.set(report.failed_targets() as f64);
        self.rows_written.set(report.rows_written() as f64);
        self.lines_rejected.set(report.rejected_lines() as f64);
        self.pass_duration.set(report.duration_seconds);
        self.last_pass_timestamp
            .set(report.timestamp.timestamp() as f64);

        self.target_rows.reset();
        self.target_up.reset();
        for o in &report.outcomes {
            let format = o.format.to_string();
            let labels = &[o.target.as_str(), o.table.as_str(), format.as_str()];
            self.target_rows
                .with_label_values(labels)
                .set(o.rows_written as f64);
            let up = if o.status == TargetStatus::Ok { 1.0 } else { 0.0 };
            self.target_up.with_label_values(labels).set(up);
        }
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the encoded gauges to `path` via a temp file and rename, so the
    /// textfile collector never sees a partial file.
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let body = self.encode()?;
        let tmp = path.with_extension("prom.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
