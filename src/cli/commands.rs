//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - validate: check instance files against a schema
//! - plugins: list the builtin plugins

use clap::{Parser, Subcommand};
use plumbline::FaultPolicy;
use std::path::PathBuf;

use crate::config::OutputFormat;

/// Plumbline - plugin-driven validation of structured data
#[derive(Parser, Debug)]
#[command(name = "plumbline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate instance files against a schema
    Validate {
        /// Schema file (YAML)
        #[arg(short, long)]
        schema: PathBuf,

        /// Class every instance is validated as (defaults to the schema's tree_root)
        #[arg(short, long)]
        target_class: Option<String>,

        /// What to do when a plugin fails on an instance (continue, abort)
        #[arg(short, long)]
        policy: Option<FaultPolicy>,

        /// Report format (text, json, yaml)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Stop after the first instance with errors
        #[arg(long)]
        fail_fast: bool,

        /// Instance files (JSON or YAML); glob patterns are expanded
        #[arg(required = true)]
        instances: Vec<String>,
    },

    /// List the builtin plugins
    Plugins,
}
