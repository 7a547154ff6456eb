//! CLI module for plumbline - command-line interface and report output.

pub mod commands;
pub mod output;

pub use commands::Cli;
