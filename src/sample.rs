//! Sampling data model.
//!
//! This module provides the `Target`, `MetricTuple` and `Sample` structures
//! that flow from the executor through the parsers into the metric store.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::parser::LineParser;
use crate::store::TableName;

/// Unit in which a format reports the `memory` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryUnit {
    /// Absolute resident memory in bytes.
    Bytes,
    /// Share of host memory in percent, as reported by `ps -o pmem`.
    Percent,
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryUnit::Bytes => f.write_str("bytes"),
            MemoryUnit::Percent => f.write_str("percent"),
        }
    }
}

/// A remote sampling endpoint resolved from configuration.
#[derive(Debug, Clone)]
pub struct Target {
    /// Host or `host/process-scope` identifier as configured.
    pub name: String,
    /// Shell command with `{target}` already substituted.
    pub command: String,
    /// Table the target's rows are appended to.
    pub table: TableName,
    /// Line format strategy for the command's output.
    pub parser: Arc<LineParser>,
}

/// A single `(label, cpu, memory)` measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTuple {
    pub label: String,
    pub cpu_percent: f64,
    pub memory: f64,
}

impl MetricTuple {
    pub fn new(label: impl Into<String>, cpu_percent: f64, memory: f64) -> Self {
        Self {
            label: label.into(),
            cpu_percent,
            memory,
        }
    }
}

/// Accumulates tuples for one target, summing cpu and memory of repeated labels.
///
/// Insertion order of first occurrence is preserved so output stays stable
/// across runs.
#[derive(Debug, Default)]
pub struct TupleSet {
    index: HashMap<String, usize>,
    tuples: Vec<MetricTuple>,
}

impl TupleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a measurement, merging it into an existing label by summation.
    pub fn add(&mut self, label: &str, cpu_percent: f64, memory: f64) {
        match self.index.get(label) {
            Some(&i) => {
                let t = &mut self.tuples[i];
                t.cpu_percent += cpu_percent;
                t.memory += memory;
            }
            None => {
                self.index.insert(label.to_string(), self.tuples.len());
                self.tuples
                    .push(MetricTuple::new(label, cpu_percent, memory));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn into_vec(self) -> Vec<MetricTuple> {
        self.tuples
    }
}

/// The tuples collected for one target in one pass.
#[derive(Debug, Clone)]
pub struct Sample {
    pub target: String,
    pub timestamp: DateTime<Local>,
    pub tuples: Vec<MetricTuple>,
}

impl Sample {
    /// An empty sample, produced when the remote command failed.
    pub fn empty(target: &str, timestamp: DateTime<Local>) -> Self {
        Self {
            target: target.to_string(),
            timestamp,
            tuples: Vec::new(),
        }
    }
}
