use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use kafkasub::trigger::{ActionRunner, OutputValues, RunContext, RunOutcome};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Trigger configuration used across integration tests.
#[allow(dead_code)]
pub const TEST_CONFIG: &str = r#"{
  "name": "tibco-kafkasub",
  "settings": {
    "BrokerUrl": "192.168.10.69:9092"
  },
  "handlers": [
    {
      "actionId": "kafka_message",
      "settings": {
        "Topic": "syslog"
      }
    }
  ],
  "outputs": [
    {
      "name": "message",
      "type": "string"
    }
  ]
}"#;

/// Builds a single-handler JSON config with the given broker list and
/// handler settings.
#[allow(dead_code)]
pub fn config_json(broker_url: &str, handler_settings: &[(&str, &str)]) -> String {
    let mut settings = serde_json::Map::new();
    settings.insert("Topic".to_string(), "syslog".into());
    for (key, value) in handler_settings {
        settings.insert(key.to_string(), (*value).into());
    }
    serde_json::json!({
        "name": "tibco-kafkasub",
        "settings": { "BrokerUrl": broker_url },
        "handlers": [ { "actionId": "kafka_message", "settings": settings } ],
        "outputs": [ { "name": "message", "type": "string" } ]
    })
    .to_string()
}

#[allow(dead_code)]
pub fn temp_config_file(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join(name);
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Runner that keeps every invocation's context and outputs.
#[allow(dead_code)]
#[derive(Default)]
pub struct CollectingRunner {
    pub calls: Mutex<Vec<(RunContext, OutputValues)>>,
}

#[allow(dead_code)]
impl CollectingRunner {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn messages(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|(_, outputs)| outputs.get("message"))
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait::async_trait]
impl ActionRunner for CollectingRunner {
    async fn run(
        &self,
        context: &RunContext,
        _action_id: &str,
        _destination: &str,
        outputs: OutputValues,
    ) -> Result<RunOutcome, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.lock().await.push((context.clone(), outputs));
        Ok(RunOutcome::default())
    }
}
