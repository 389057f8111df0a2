//! Samples per-process CPU and memory usage from remote hosts into SQLite.
//!
//! One pass runs every configured target's command through a
//! [`executor::RemoteExecutor`], parses the text with the target's
//! [`parser::LineParser`] and appends one row per label to a
//! [`store::MetricStore`]. All rows of a pass share one timestamp.

pub mod collector;
pub mod config;
pub mod executor;
pub mod parser;
pub mod report;
pub mod sample;
pub mod store;
