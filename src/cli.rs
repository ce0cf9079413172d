//! Command-line interface definition for kafkasub
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to check a trigger configuration and to run it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LoggingConfig;

/// kafkasub - Kafka subscription trigger host
///
/// Consumes Kafka topics described by a trigger configuration and logs
/// every record handed to the configured actions.
#[derive(Parser, Debug, Clone)]
#[command(name = "kafkasub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log record payloads at debug level
    #[arg(long, global = true)]
    pub include_payload: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for kafkasub
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load, validate and initialize a trigger without connecting
    Check {
        /// Path to trigger configuration file (JSON or YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run a trigger until interrupted
    Run {
        /// Path to trigger configuration file (JSON or YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Stop after this many seconds instead of waiting for a signal
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging configuration derived from the global flags
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json_format: self.json_logs,
            file_path: self.log_file.clone(),
            include_payload: self.include_payload,
        }
    }
}
