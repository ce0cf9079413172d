//! Message dispatch to the host action runner.
//!
//! The host supplies an [`ActionRunner`]; the trigger never looks actions up
//! itself. For every consumed record a [`MessageDispatcher`] builds the output
//! values declared by the trigger's output schema and invokes the runner with
//! the handler's action identity.
//!
//! # Example
//!
//! ```rust
//! use kafkasub::trigger::dispatcher::{ActionRunner, OutputValues, RunContext, RunOutcome};
//!
//! struct PrintRunner;
//!
//! #[async_trait::async_trait]
//! impl ActionRunner for PrintRunner {
//!     async fn run(
//!         &self,
//!         _context: &RunContext,
//!         action_id: &str,
//!         destination: &str,
//!         outputs: OutputValues,
//!     ) -> Result<RunOutcome, Box<dyn std::error::Error + Send + Sync>> {
//!         println!("{} -> {}: {:?}", action_id, destination, outputs.get("message"));
//!         Ok(RunOutcome::default())
//!     }
//! }
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{HandlerConfig, OutputField};
use crate::error::{Result, TriggerError};
use crate::trigger::message::ConsumedRecord;

/// Output values handed to the action runner, keyed by output name.
pub type OutputValues = Map<String, Value>;

/// Context describing the record that triggered an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Name of the trigger that consumed the record.
    pub trigger: String,
    /// Topic of the record.
    pub topic: String,
    /// Partition of the record.
    pub partition: i32,
    /// Offset of the record.
    pub offset: i64,
}

/// Result of a successful runner invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    /// Status code reported by the action; zero means success.
    pub code: i32,
    /// Optional result value.
    pub data: Option<Value>,
}

/// Capability to run a unit of work with a payload.
///
/// Implemented by the host. Returning `Err` marks the invocation as failed;
/// the consumption loop logs it and keeps going.
#[async_trait::async_trait]
pub trait ActionRunner: Send + Sync {
    /// Runs the action identified by `action_id` at `destination`.
    async fn run(
        &self,
        context: &RunContext,
        action_id: &str,
        destination: &str,
        outputs: OutputValues,
    ) -> std::result::Result<RunOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Output fields the trigger knows how to fill from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Record payload as a string.
    Message,
    /// Record key as a string (null when absent).
    Key,
    /// Source topic.
    Topic,
    /// Source partition.
    Partition,
    /// Record offset.
    Offset,
    /// Record timestamp in milliseconds (null when absent).
    Timestamp,
}

impl OutputKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "message" => Some(Self::Message),
            "key" => Some(Self::Key),
            "topic" => Some(Self::Topic),
            "partition" => Some(Self::Partition),
            "offset" => Some(Self::Offset),
            "timestamp" => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Output name this kind is delivered under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Key => "key",
            Self::Topic => "topic",
            Self::Partition => "partition",
            Self::Offset => "offset",
            Self::Timestamp => "timestamp",
        }
    }

    fn value(&self, record: &ConsumedRecord) -> Value {
        match self {
            Self::Message => Value::String(record.payload_str()),
            Self::Key => record.key_str().map(Value::String).unwrap_or(Value::Null),
            Self::Topic => Value::String(record.topic.clone()),
            Self::Partition => Value::from(record.partition),
            Self::Offset => Value::from(record.offset),
            Self::Timestamp => record.timestamp.map(Value::from).unwrap_or(Value::Null),
        }
    }
}

/// Resolved output schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    fields: Vec<OutputKind>,
}

impl OutputSchema {
    /// Resolves declared output fields.
    ///
    /// An empty declaration yields the single `message` field. Unknown names
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` if `message` is declared with a
    /// non-string type
    pub fn from_fields(declared: &[OutputField]) -> Result<Self> {
        if declared.is_empty() {
            return Ok(Self::default());
        }

        let mut fields = Vec::with_capacity(declared.len());
        for field in declared {
            match OutputKind::from_name(&field.name) {
                Some(OutputKind::Message) if field.value_type != "string" => {
                    return Err(TriggerError::Config(format!(
                        "Output 'message' must be of type string, got '{}'",
                        field.value_type
                    )));
                }
                Some(kind) if !fields.contains(&kind) => fields.push(kind),
                Some(_) => {}
                None => warn!(output = %field.name, "Ignoring unknown output field"),
            }
        }

        Ok(Self { fields })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[OutputKind] {
        &self.fields
    }

    /// Builds the output values for one record.
    pub fn build(&self, record: &ConsumedRecord) -> OutputValues {
        self.fields
            .iter()
            .map(|kind| (kind.name().to_string(), kind.value(record)))
            .collect()
    }
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self {
            fields: vec![OutputKind::Message],
        }
    }
}

/// Forwards records of one handler to the action runner.
#[derive(Clone)]
pub struct MessageDispatcher {
    trigger: String,
    action_id: String,
    destination: String,
    schema: Arc<OutputSchema>,
    runner: Arc<dyn ActionRunner>,
    include_payload: bool,
}

impl MessageDispatcher {
    /// Creates a dispatcher for one handler.
    pub fn new(
        trigger: &str,
        handler: &HandlerConfig,
        schema: Arc<OutputSchema>,
        runner: Arc<dyn ActionRunner>,
    ) -> Self {
        Self {
            trigger: trigger.to_string(),
            action_id: handler.action_id.clone(),
            destination: handler.destination().to_string(),
            schema,
            runner,
            include_payload: false,
        }
    }

    /// Logs record payloads at debug level when enabled.
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.include_payload = enabled;
        self
    }

    /// Action identity this dispatcher invokes.
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Destination identifier passed to the runner.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Invokes the runner for one record.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Dispatch` if the runner fails. A non-zero status
    /// code is logged but not treated as an error.
    pub async fn dispatch(&self, record: &ConsumedRecord) -> Result<RunOutcome> {
        let context = RunContext {
            trigger: self.trigger.clone(),
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
        };
        let outputs = self.schema.build(record);

        if self.include_payload {
            debug!(
                action_id = %self.action_id,
                partition = record.partition,
                offset = record.offset,
                payload = %record.payload_str(),
                "Dispatching record"
            );
        } else {
            debug!(
                action_id = %self.action_id,
                partition = record.partition,
                offset = record.offset,
                "Dispatching record"
            );
        }

        let outcome = self
            .runner
            .run(&context, &self.action_id, &self.destination, outputs)
            .await
            .map_err(|e| {
                TriggerError::Dispatch(format!(
                    "action '{}' failed for {}/{}@{}: {}",
                    self.action_id, record.topic, record.partition, record.offset, e
                ))
            })?;

        if outcome.code != 0 {
            warn!(
                action_id = %self.action_id,
                code = outcome.code,
                "Action completed with non-zero status"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingRunner;

    fn record() -> ConsumedRecord {
        ConsumedRecord::new("syslog", 2, 17)
            .with_key("k1")
            .with_payload("hello kafka")
            .with_timestamp(1_000)
    }

    #[test]
    fn test_default_schema_is_message() {
        let schema = OutputSchema::from_fields(&[]).unwrap();
        assert_eq!(schema.fields(), &[OutputKind::Message]);
    }

    #[test]
    fn test_schema_build_all_fields() {
        let schema = OutputSchema::from_fields(&[
            OutputField::new("message", "string"),
            OutputField::new("key", "string"),
            OutputField::new("topic", "string"),
            OutputField::new("partition", "integer"),
            OutputField::new("offset", "integer"),
            OutputField::new("timestamp", "integer"),
        ])
        .unwrap();

        let values = schema.build(&record());
        assert_eq!(values["message"], Value::String("hello kafka".to_string()));
        assert_eq!(values["key"], Value::String("k1".to_string()));
        assert_eq!(values["topic"], Value::String("syslog".to_string()));
        assert_eq!(values["partition"], Value::from(2));
        assert_eq!(values["offset"], Value::from(17));
        assert_eq!(values["timestamp"], Value::from(1_000));
    }

    #[test]
    fn test_schema_skips_unknown_and_duplicate_fields() {
        let schema = OutputSchema::from_fields(&[
            OutputField::new("message", "string"),
            OutputField::new("headers", "object"),
            OutputField::new("message", "string"),
        ])
        .unwrap();
        assert_eq!(schema.fields(), &[OutputKind::Message]);
    }

    #[test]
    fn test_schema_rejects_non_string_message() {
        let result = OutputSchema::from_fields(&[OutputField::new("message", "integer")]);
        assert!(matches!(result, Err(TriggerError::Config(_))));
    }

    #[test]
    fn test_missing_key_is_null() {
        let schema = OutputSchema::from_fields(&[OutputField::new("key", "string")]).unwrap();
        let values = schema.build(&ConsumedRecord::new("t", 0, 0));
        assert_eq!(values["key"], Value::Null);
    }

    #[tokio::test]
    async fn test_dispatch_invokes_runner() {
        let runner = Arc::new(RecordingRunner::new());
        let handler = HandlerConfig::new("kafka_message", "syslog");
        let dispatcher = MessageDispatcher::new(
            "tibco-kafkasub",
            &handler,
            Arc::new(OutputSchema::default()),
            runner.clone(),
        );

        let outcome = dispatcher.dispatch(&record()).await.unwrap();
        assert_eq!(outcome.code, 0);

        let calls = runner.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action_id, "kafka_message");
        assert_eq!(calls[0].destination, "kafka_message");
        assert_eq!(calls[0].context.trigger, "tibco-kafkasub");
        assert_eq!(calls[0].context.offset, 17);
        assert_eq!(
            calls[0].outputs["message"],
            Value::String("hello kafka".to_string())
        );
    }

    #[tokio::test]
    async fn test_dispatch_uses_action_uri() {
        let runner = Arc::new(RecordingRunner::new());
        let mut handler = HandlerConfig::new("kafka_message", "syslog");
        handler.action_uri = Some("local://flow".to_string());
        let dispatcher = MessageDispatcher::new(
            "t",
            &handler,
            Arc::new(OutputSchema::default()),
            runner.clone(),
        );

        dispatcher.dispatch(&record()).await.unwrap();
        assert_eq!(runner.calls().await[0].destination, "local://flow");
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_dispatch_error() {
        let runner = Arc::new(RecordingRunner::failing("flow exploded"));
        let handler = HandlerConfig::new("kafka_message", "syslog");
        let dispatcher =
            MessageDispatcher::new("t", &handler, Arc::new(OutputSchema::default()), runner);

        let err = dispatcher.dispatch(&record()).await.unwrap_err();
        assert!(matches!(err, TriggerError::Dispatch(_)));
        assert!(err.to_string().contains("flow exploded"));
    }
}
