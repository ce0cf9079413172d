//! kafkasub - Kafka subscription trigger library
//!
//! This library consumes Kafka topics described by a declarative trigger
//! configuration and forwards every record to a host-supplied action runner.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `trigger`: Endpoint resolution, security profiles, subscriptions,
//!   lifecycle control and message dispatch
//! - `config`: Configuration loading and validation
//! - `error`: Error types and result aliases
//! - `logging`: Tracing subscriber setup
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers for the CLI commands
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kafkasub::commands::LogRunner;
//! use kafkasub::{KafkaTrigger, TriggerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TriggerConfig::load("trigger.json")?;
//!     let mut trigger = KafkaTrigger::new(config);
//!     trigger.init(Arc::new(LogRunner::default()))?;
//!     trigger.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     trigger.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod trigger;

// Re-export commonly used types
pub use config::{HandlerConfig, LoggingConfig, OutputField, TriggerConfig};
pub use error::{Result, TriggerError};
pub use trigger::{ActionRunner, KafkaTrigger, RunContext, RunOutcome, TriggerState};

#[cfg(test)]
pub mod test_utils;
