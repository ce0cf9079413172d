//! Configuration management for kafkasub
//!
//! This module handles loading, parsing, validating, and applying
//! environment overrides to the trigger configuration document.
//!
//! A configuration document names the trigger, carries trigger-level
//! settings (notably `BrokerUrl`), lists the handlers that each bind a topic
//! to an action, and declares the output schema handed to the action runner.
//!
//! # Example
//!
//! ```
//! use kafkasub::config::TriggerConfig;
//!
//! let config = TriggerConfig::from_json_str(r#"{
//!     "name": "tibco-kafkasub",
//!     "settings": { "BrokerUrl": "localhost:9092" },
//!     "handlers": [
//!         { "actionId": "kafka_message", "settings": { "Topic": "syslog" } }
//!     ],
//!     "outputs": [ { "name": "message", "type": "string" } ]
//! }"#).unwrap();
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.handlers[0].topic().unwrap(), "syslog");
//! ```

use crate::error::{Result, TriggerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognized setting keys.
pub mod keys {
    /// Trigger setting: comma-separated `host:port` broker list
    pub const BROKER_URL: &str = "BrokerUrl";
    /// Trigger setting: metadata round-trip bound in milliseconds
    pub const METADATA_TIMEOUT_MS: &str = "MetadataTimeoutMs";
    /// Trigger setting: consumer session timeout in milliseconds
    pub const SESSION_TIMEOUT_MS: &str = "SessionTimeoutMs";
    /// Handler setting: topic to consume
    pub const TOPIC: &str = "Topic";
    /// Handler setting: comma-separated explicit partition list
    pub const PARTITIONS: &str = "partitions";
    /// Handler setting: CA truststore path enabling TLS
    pub const TRUSTSTORE: &str = "truststore";
    /// Handler setting: SASL username
    pub const USER: &str = "user";
    /// Handler setting: SASL password
    pub const PASSWORD: &str = "password";
    /// Handler setting: SASL mechanism
    pub const MECHANISM: &str = "mechanism";
    /// Handler setting: start position without a committed offset
    pub const OFFSET: &str = "offset";
    /// Handler setting: consumer group id
    pub const GROUP: &str = "group";
}

/// Environment variable overriding the `BrokerUrl` trigger setting
pub const BROKER_URL_ENV: &str = "KAFKASUB_BROKER_URL";

/// Environment variable consulted when `user` is set without `password`
pub const SASL_PASSWORD_ENV: &str = "KAFKA_SASL_PASSWORD";

/// Trigger configuration document
///
/// Immutable once handed to [`crate::trigger::KafkaTrigger::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Trigger identity
    pub name: String,

    /// Trigger-level settings
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    /// Handlers, one subscription each, in declaration order
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,

    /// Output schema delivered to the action runner
    #[serde(default)]
    pub outputs: Vec<OutputField>,
}

/// One handler binding a topic subscription to an action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Opaque action identity resolved by the host
    #[serde(rename = "actionId")]
    pub action_id: String,

    /// Destination identifier passed to the runner (defaults to the action id)
    #[serde(
        rename = "actionURI",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub action_uri: Option<String>,

    /// Handler-level settings
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// One declared output field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    /// Field name (`message`, `key`, `topic`, `partition`, `offset`, `timestamp`)
    pub name: String,

    /// Declared value type
    #[serde(rename = "type", default = "default_output_type")]
    pub value_type: String,
}

fn default_output_type() -> String {
    "string".to_string()
}

impl OutputField {
    /// Creates an output field declaration.
    pub fn new(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: value_type.to_string(),
        }
    }
}

impl TriggerConfig {
    /// Load configuration from a JSON or YAML file with environment overrides
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TriggerError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );

        let mut config = if is_yaml {
            Self::from_yaml_str(&contents)?
        } else {
            Self::from_json_str(&contents)?
        };

        config.apply_env_vars();
        tracing::debug!(path = %path.display(), name = %config.name, "Loaded trigger configuration");

        Ok(config)
    }

    /// Parse a configuration document from JSON.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Parse a configuration document from YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(broker_url) = std::env::var(BROKER_URL_ENV) {
            tracing::debug!("Overriding {} from {}", keys::BROKER_URL, BROKER_URL_ENV);
            self.settings
                .insert(keys::BROKER_URL.to_string(), broker_url);
        }
    }

    /// Returns a trigger-level setting, treating blank values as absent.
    pub fn setting(&self, key: &str) -> Option<&str> {
        lookup(&self.settings, key)
    }

    /// Returns the raw `BrokerUrl` setting.
    ///
    /// A blank value is returned as-is so the endpoint resolver can reject it
    /// as an invalid endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` if the setting is missing
    pub fn broker_url(&self) -> Result<&str> {
        self.settings.get(keys::BROKER_URL).map(String::as_str).ok_or_else(|| {
            TriggerError::Config(format!("Trigger setting '{}' is required", keys::BROKER_URL))
        })
    }

    /// Bound on the metadata round trip when a subscription opens.
    pub fn metadata_timeout(&self) -> Result<Duration> {
        self.millis_setting(keys::METADATA_TIMEOUT_MS, default_metadata_timeout_ms())
    }

    /// Consumer session timeout.
    pub fn session_timeout(&self) -> Result<Duration> {
        self.millis_setting(keys::SESSION_TIMEOUT_MS, default_session_timeout_ms())
    }

    fn millis_setting(&self, key: &str, default: u64) -> Result<Duration> {
        match self.setting(key) {
            None => Ok(Duration::from_millis(default)),
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) | Err(_) => Err(TriggerError::Config(format!(
                    "Trigger setting '{}' must be a positive integer, got '{}'",
                    key, raw
                ))),
                Ok(ms) => Ok(Duration::from_millis(ms)),
            },
        }
    }

    /// Validate the configuration
    ///
    /// Checks presence and shape of required settings. Broker addresses,
    /// security settings and partition lists are resolved (and rejected) by
    /// the trigger during `init`.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` if any check fails
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TriggerError::Config("Trigger name cannot be empty".to_string()));
        }

        self.broker_url()?;
        self.metadata_timeout()?;
        self.session_timeout()?;

        if self.handlers.is_empty() {
            return Err(TriggerError::Config(
                "At least one handler must be configured".to_string(),
            ));
        }

        for (index, handler) in self.handlers.iter().enumerate() {
            if handler.action_id.trim().is_empty() {
                return Err(TriggerError::Config(format!(
                    "Handler {} is missing an actionId",
                    index
                )));
            }
            handler.topic()?;
        }

        if let Some(message) = self.outputs.iter().find(|f| f.name == "message") {
            if message.value_type != "string" {
                return Err(TriggerError::Config(format!(
                    "Output 'message' must be of type string, got '{}'",
                    message.value_type
                )));
            }
        }

        Ok(())
    }
}

impl HandlerConfig {
    /// Creates a handler bound to a topic with no further settings.
    pub fn new(action_id: &str, topic: &str) -> Self {
        let mut settings = BTreeMap::new();
        settings.insert(keys::TOPIC.to_string(), topic.to_string());
        Self {
            action_id: action_id.to_string(),
            action_uri: None,
            settings,
        }
    }

    /// Sets a handler setting, returning the updated handler.
    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    /// Returns a handler setting, treating blank values as absent.
    pub fn setting(&self, key: &str) -> Option<&str> {
        lookup(&self.settings, key)
    }

    /// Returns the configured topic.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` if `Topic` is missing
    pub fn topic(&self) -> Result<&str> {
        self.setting(keys::TOPIC).ok_or_else(|| {
            TriggerError::Config(format!(
                "Handler '{}' is missing required setting '{}'",
                self.action_id,
                keys::TOPIC
            ))
        })
    }

    /// Destination identifier handed to the action runner.
    pub fn destination(&self) -> &str {
        self.action_uri.as_deref().unwrap_or(&self.action_id)
    }
}

fn lookup<'a>(settings: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Default metadata timeout in milliseconds
fn default_metadata_timeout_ms() -> u64 {
    10_000
}

/// Default session timeout in milliseconds
fn default_session_timeout_ms() -> u64 {
    30_000
}

/// Logging configuration for the host binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDOUT only)
    pub file_path: Option<PathBuf>,

    /// Include record payloads and output values in dispatch logs
    #[serde(default)]
    pub include_payload: bool,
}

/// Default log level
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            include_payload: false,
        }
    }
}
