//! Command handlers for the CLI
//!
//! This module provides command handlers invoked by the CLI entrypoint.
//!
//! - [`check`] - Validate and initialize a trigger configuration
//! - [`run`] - Run a trigger until interrupted
//!
//! Both use [`LogRunner`] as the host action runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::trigger::{ActionRunner, OutputValues, RunContext, RunOutcome};

pub mod check;
pub mod run;

/// Action runner that logs each invocation and reports success.
#[derive(Debug, Clone, Default)]
pub struct LogRunner {
    include_values: bool,
}

impl LogRunner {
    /// Creates a runner; output values are logged only when `include_values`.
    pub fn new(include_values: bool) -> Self {
        Self { include_values }
    }

    /// Shares the runner as a trait object.
    pub fn shared(self) -> Arc<dyn ActionRunner> {
        Arc::new(self)
    }
}

#[async_trait]
impl ActionRunner for LogRunner {
    async fn run(
        &self,
        context: &RunContext,
        action_id: &str,
        destination: &str,
        outputs: OutputValues,
    ) -> std::result::Result<RunOutcome, Box<dyn std::error::Error + Send + Sync>> {
        if self.include_values {
            info!(
                trigger = %context.trigger,
                topic = %context.topic,
                partition = context.partition,
                offset = context.offset,
                action_id,
                destination,
                outputs = %serde_json::Value::Object(outputs),
                "Ran action"
            );
        } else {
            let names: Vec<&str> = outputs.keys().map(String::as_str).collect();
            info!(
                trigger = %context.trigger,
                topic = %context.topic,
                partition = context.partition,
                offset = context.offset,
                action_id,
                destination,
                outputs = ?names,
                "Ran action"
            );
        }

        Ok(RunOutcome::default())
    }
}
