//! Consumed record type.
//!
//! A [`ConsumedRecord`] is an owned copy of one broker record, detached from
//! the client's internal buffers so it can be handed across an `.await` to the
//! action runner.
//!
//! # Example
//!
//! ```rust
//! use kafkasub::trigger::message::ConsumedRecord;
//!
//! let record = ConsumedRecord::new("syslog", 0, 42).with_payload("hello");
//! assert_eq!(record.payload_str(), "hello");
//! assert!(record.key_str().is_none());
//! ```

use rdkafka::message::Message;

/// One record read from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    /// Topic the record was read from.
    pub topic: String,

    /// Partition the record was read from.
    pub partition: i32,

    /// Offset of the record within its partition.
    pub offset: i64,

    /// Record key, if any.
    pub key: Option<Vec<u8>>,

    /// Record value, if any.
    pub payload: Option<Vec<u8>>,

    /// Broker or producer timestamp in milliseconds since the epoch.
    pub timestamp: Option<i64>,
}

impl ConsumedRecord {
    /// Creates an empty record at a position.
    pub fn new(topic: &str, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.to_string(),
            partition,
            offset,
            key: None,
            payload: None,
            timestamp: None,
        }
    }

    /// Sets the record value.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the record key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the record timestamp.
    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Copies a client message into an owned record.
    pub fn from_message<M: Message>(message: &M) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            timestamp: message.timestamp().to_millis(),
        }
    }

    /// Payload decoded as UTF-8, lossily; empty when there is no payload.
    pub fn payload_str(&self) -> String {
        self.payload
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    /// Key decoded as UTF-8, lossily.
    pub fn key_str(&self) -> Option<String> {
        self.key
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}
