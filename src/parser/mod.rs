//! Line-format strategies for remote command output.
//!
//! Each supported command output layout is one `LineFormat` variant with a
//! matching parser. Both parsers share the same driver: the output is split
//! into lines, each line is classified as a tuple, noise to skip, or a
//! malformed line to reject, and tuples are merged by label.

pub mod container_stats;
pub mod process_list;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::sample::{MemoryUnit, MetricTuple, TupleSet};

pub use container_stats::{ContainerStatsParser, SizeUnit, FALLBACK_MEMORY_UNIT};
pub use process_list::{ProcessListParser, DEFAULT_PROCESS_PREFIX};

/// Known command output layouts, selected per source in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    /// `docker stats` table: `NAME CONTAINER CPU% MEM-USED / MEM-LIMIT`.
    ContainerStats,
    /// `ps -Ao pcpu,pmem,args` listing filtered to one workload prefix.
    ProcessList,
}

impl LineFormat {
    pub fn memory_unit(self) -> MemoryUnit {
        match self {
            LineFormat::ContainerStats => MemoryUnit::Bytes,
            LineFormat::ProcessList => MemoryUnit::Percent,
        }
    }

    pub fn default_table(self) -> &'static str {
        match self {
            LineFormat::ContainerStats => "nodes",
            LineFormat::ProcessList => "proc",
        }
    }

    pub fn default_command(self) -> &'static str {
        match self {
            LineFormat::ContainerStats => {
                r#"ssh {target} "docker stats --format 'table {{.Name}}\t{{.Container}}\t{{.CPUPerc}}\t{{.MemUsage}}' --no-stream""#
            }
            LineFormat::ProcessList => {
                r#"rancher1 exec -it {target} /bin/bash -c "ps --sort=-pcpu -Ao pcpu,pmem,args""#
            }
        }
    }
}

impl fmt::Display for LineFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineFormat::ContainerStats => f.write_str("container_stats"),
            LineFormat::ProcessList => f.write_str("process_list"),
        }
    }
}

/// Reason a line was rejected as malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum LineError {
    InvalidCpu(String),
    InvalidMemory(String),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::InvalidCpu(v) => write!(f, "invalid cpu value '{v}'"),
            LineError::InvalidMemory(v) => write!(f, "invalid memory value '{v}'"),
        }
    }
}

impl std::error::Error for LineError {}

/// Parses a cpu or memory figure. Usage is never negative or unbounded, so
/// `NaN`, infinities and negative numbers are refused.
pub fn parse_measure(field: &str) -> Option<f64> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Classification of a single output line.
#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    Tuple {
        label: String,
        cpu_percent: f64,
        memory: f64,
    },
    /// Header, blank or unrelated line.
    Skip(&'static str),
    /// Line had the expected shape but a field failed to parse.
    Reject(LineError),
}

/// Result of parsing one command output.
#[derive(Debug, Default)]
pub struct Parsed {
    pub tuples: Vec<MetricTuple>,
    pub skipped: usize,
    pub rejected: usize,
}

/// Parser for one configured line format.
#[derive(Debug)]
pub enum LineParser {
    ContainerStats(ContainerStatsParser),
    ProcessList(ProcessListParser),
}

impl LineParser {
    pub fn container_stats() -> Self {
        LineParser::ContainerStats(ContainerStatsParser)
    }

    pub fn process_list(prefix: &str) -> Result<Self, regex::Error> {
        Ok(LineParser::ProcessList(ProcessListParser::new(prefix)?))
    }

    pub fn format(&self) -> LineFormat {
        match self {
            LineParser::ContainerStats(_) => LineFormat::ContainerStats,
            LineParser::ProcessList(_) => LineFormat::ProcessList,
        }
    }

    pub fn classify(&self, line: &str) -> LineOutcome {
        match self {
            LineParser::ContainerStats(p) => p.classify(line),
            LineParser::ProcessList(p) => p.classify(line),
        }
    }

    /// Parses a full command output. Malformed lines are logged and dropped;
    /// they never fail the whole output.
    pub fn parse(&self, output: &str) -> Parsed {
        let mut set = TupleSet::new();
        let mut skipped = 0;
        let mut rejected = 0;

        for line in output.lines() {
            match self.classify(line) {
                LineOutcome::Tuple {
                    label,
                    cpu_percent,
                    memory,
                } => set.add(&label, cpu_percent, memory),
                LineOutcome::Skip(reason) => {
                    skipped += 1;
                    if !line.trim().is_empty() {
                        debug!("Skipping line ({}): {}", reason, line.trim());
                    }
                }
                LineOutcome::Reject(e) => {
                    rejected += 1;
                    warn!("Dropping malformed line ({}): {}", e, line.trim());
                }
            }
        }

        Parsed {
            tuples: set.into_vec(),
            skipped,
            rejected,
        }
    }
}
