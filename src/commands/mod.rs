//! CLI command implementations for remote-proc-sampler.
//!
//! This module provides implementations for all CLI subcommands:
//! - `run`: One sampling pass
//! - `check`: Configuration and store validation, optional target probe
//! - `config`: Configuration file generation
//! - `parse`: Offline parsing of captured output
//! - `prepare`: Target setup commands
//! - `generate-testdata`: Synthetic captured outputs

pub mod check;
pub mod config;
pub mod generate;
pub mod parse;
pub mod prepare;
pub mod run;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use parse::command_parse;
pub use prepare::command_prepare;
pub use run::command_run;
