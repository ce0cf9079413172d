//! Test utilities for kafkasub
//!
//! This module provides common test utilities including temporary config
//! files, a sample trigger configuration, a recording action runner, and
//! assertion helpers.

use crate::config::{HandlerConfig, OutputField, TriggerConfig};
use crate::config::keys;
use crate::error::TriggerError;
use crate::trigger::dispatcher::{ActionRunner, OutputValues, RunContext, RunOutcome};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T, TriggerError>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Single-handler configuration consuming `syslog` into `kafka_message`
pub fn sample_config(broker_url: &str) -> TriggerConfig {
    let mut settings = BTreeMap::new();
    settings.insert(keys::BROKER_URL.to_string(), broker_url.to_string());
    TriggerConfig {
        name: "tibco-kafkasub".to_string(),
        settings,
        handlers: vec![HandlerConfig::new("kafka_message", "syslog")],
        outputs: vec![OutputField::new("message", "string")],
    }
}

/// One invocation seen by [`RecordingRunner`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub context: RunContext,
    pub action_id: String,
    pub destination: String,
    pub outputs: OutputValues,
}

/// Action runner that records every invocation
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    failure: Option<(String, usize)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that records, then fails every invocation with `message`
    pub fn failing(message: &str) -> Self {
        Self::failing_first(message, usize::MAX)
    }

    /// Runner that fails its first `count` invocations, then succeeds
    pub fn failing_first(message: &str, count: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some((message.to_string(), count)),
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ActionRunner for RecordingRunner {
    async fn run(
        &self,
        context: &RunContext,
        action_id: &str,
        destination: &str,
        outputs: OutputValues,
    ) -> Result<RunOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let mut calls = self.calls.lock().await;
        calls.push(RecordedCall {
            context: context.clone(),
            action_id: action_id.to_string(),
            destination: destination.to_string(),
            outputs,
        });

        match &self.failure {
            Some((message, count)) if calls.len() <= *count => Err(message.clone().into()),
            _ => Ok(RunOutcome::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "trigger.json", "{}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<(), TriggerError> =
            Err(TriggerError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: Result<(), TriggerError> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = sample_config("192.168.10.69:9092");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_loads_from_file() {
        let dir = temp_dir();
        let json = serde_json::to_string(&sample_config("bilbo:9092")).unwrap();
        let path = create_test_file(&dir, "trigger.json", &json);
        assert_error_contains(TriggerConfig::load(dir.path().join("missing.json")), "missing.json");
        assert_eq!(TriggerConfig::load(&path).unwrap().name, "tibco-kafkasub");
    }

    #[tokio::test]
    async fn test_failing_runner_records_call() {
        let runner = RecordingRunner::failing("boom");
        let context = RunContext {
            trigger: "t".to_string(),
            topic: "syslog".to_string(),
            partition: 0,
            offset: 1,
        };
        let err = runner
            .run(&context, "a", "a", OutputValues::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(runner.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_first_recovers() {
        let runner = RecordingRunner::failing_first("boom", 1);
        let context = RunContext {
            trigger: "t".to_string(),
            topic: "syslog".to_string(),
            partition: 0,
            offset: 1,
        };
        assert!(runner.run(&context, "a", "a", OutputValues::new()).await.is_err());
        assert!(runner.run(&context, "a", "a", OutputValues::new()).await.is_ok());
        assert_eq!(runner.calls().await.len(), 2);
    }
}
