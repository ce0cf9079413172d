//! Topic subscriptions and their consumption loops.
//!
//! A [`Subscription`] is built during `init` from one handler: it carries the
//! resolved endpoints, the security profile, the topic and the optional
//! explicit partition list, and performs no I/O. `open` connects, checks the
//! requested partitions against broker metadata, and assigns them, yielding a
//! [`ConsumerSession`] whose [`ConsumerSession::consume`] loop runs until its
//! cancellation token fires.
//!
//! The loop itself, [`consume_records`], reads from any [`RecordSource`];
//! the session feeds it from its `StreamConsumer`.
//!
//! Sessions always use manual assignment: either the partitions named in the
//! handler settings or every partition of the topic. There is no group
//! rebalancing; the group id only scopes committed offsets.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaResult, RDKafkaErrorCode};
use rdkafka::{Offset, TopicPartitionList};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{keys, HandlerConfig, TriggerConfig};
use crate::error::{Result, TriggerError};
use crate::trigger::dispatcher::MessageDispatcher;
use crate::trigger::endpoint::EndpointSet;
use crate::trigger::message::ConsumedRecord;
use crate::trigger::security::SecurityProfile;

/// Where a partition starts when the group has no committed offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartOffset {
    /// Only records produced after the session starts.
    #[default]
    Newest,
    /// From the earliest retained record.
    Oldest,
}

impl StartOffset {
    /// Parses the `offset` handler setting.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` for anything other than
    /// `newest`/`latest` or `oldest`/`earliest`
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "newest" | "latest" => Ok(Self::Newest),
            "oldest" | "earliest" => Ok(Self::Oldest),
            _ => Err(TriggerError::Config(format!(
                "Invalid offset '{}': expected 'newest' or 'oldest'",
                raw
            ))),
        }
    }

    /// Returns the `auto.offset.reset` value.
    pub fn as_reset_policy(&self) -> &'static str {
        match self {
            Self::Newest => "latest",
            Self::Oldest => "earliest",
        }
    }
}

/// Parses the `partitions` setting into a list of partition ids.
///
/// Repeated ids are kept once, in first-occurrence order.
///
/// # Errors
///
/// Returns `TriggerError::InvalidPartitionList` if any entry is empty, not
/// an integer, or negative
pub fn parse_partitions(raw: &str) -> Result<Vec<i32>> {
    let mut partitions = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        let id = entry.parse::<i32>().map_err(|_| {
            TriggerError::InvalidPartitionList(format!(
                "'{}' contains non-integer entry '{}'",
                raw, entry
            ))
        })?;
        if id < 0 {
            return Err(TriggerError::InvalidPartitionList(format!(
                "'{}' contains negative partition {}",
                raw, id
            )));
        }
        if !partitions.contains(&id) {
            partitions.push(id);
        }
    }
    Ok(partitions)
}

/// Checks requested partitions against those the broker reports.
///
/// # Errors
///
/// Returns `TriggerError::PartitionAssignment` if any requested partition
/// is missing
pub fn check_partitions(topic: &str, requested: &[i32], available: &[i32]) -> Result<()> {
    if requested.iter().all(|id| available.contains(id)) {
        Ok(())
    } else {
        Err(TriggerError::PartitionAssignment {
            topic: topic.to_string(),
            requested: requested.to_vec(),
            available: available.to_vec(),
        })
    }
}

/// Rejects topic metadata the broker flagged with an error.
///
/// A topic the client may not read, or one the broker does not know, comes
/// back with an error code and no partitions.
///
/// # Errors
///
/// Returns `TriggerError::Connect` naming the broker's error code
pub fn check_topic_metadata<E: fmt::Debug>(topic: &str, error: Option<E>) -> Result<()> {
    match error {
        Some(code) => Err(TriggerError::Connect(format!(
            "topic '{}' metadata error: {:?}",
            topic, code
        ))),
        None => Ok(()),
    }
}

/// One handler's topic subscription.
#[derive(Debug)]
pub struct Subscription {
    trigger: String,
    action_id: String,
    topic: String,
    endpoints: EndpointSet,
    security: SecurityProfile,
    partitions: Option<Vec<i32>>,
    start_offset: StartOffset,
    group_id: String,
    session_timeout: Duration,
    metadata_timeout: Duration,
    running: Arc<AtomicBool>,
}

impl Subscription {
    /// Builds a subscription from a handler without touching the network.
    ///
    /// # Arguments
    ///
    /// * `trigger` - The owning trigger configuration
    /// * `handler` - The handler to subscribe for
    /// * `endpoints` - Resolved trigger-level broker endpoints
    /// * `env_password` - Fallback SASL password
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` for a missing topic, bad security or
    /// offset settings, and `TriggerError::InvalidPartitionList` for an
    /// unparseable `partitions` setting
    pub fn from_handler(
        trigger: &TriggerConfig,
        handler: &HandlerConfig,
        endpoints: EndpointSet,
        env_password: Option<String>,
    ) -> Result<Self> {
        let topic = handler.topic()?.to_string();
        let security = SecurityProfile::from_settings(&handler.settings, env_password)?;
        let partitions = handler
            .setting(keys::PARTITIONS)
            .map(parse_partitions)
            .transpose()?;
        let start_offset = handler
            .setting(keys::OFFSET)
            .map(StartOffset::parse)
            .transpose()?
            .unwrap_or_default();
        let group_id = handler
            .setting(keys::GROUP)
            .map(str::to_string)
            .unwrap_or_else(|| format!("kafkasub-{}-{}", trigger.name, handler.action_id));

        Ok(Self {
            trigger: trigger.name.clone(),
            action_id: handler.action_id.clone(),
            topic,
            endpoints,
            security,
            partitions,
            start_offset,
            group_id,
            session_timeout: trigger.session_timeout()?,
            metadata_timeout: trigger.metadata_timeout()?,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Topic this subscription consumes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Resolved broker endpoints.
    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    /// Connection security profile.
    pub fn security(&self) -> &SecurityProfile {
        &self.security
    }

    /// Explicit partition list, if configured.
    pub fn partitions(&self) -> Option<&[i32]> {
        self.partitions.as_deref()
    }

    /// Start position without a committed offset.
    pub fn start_offset(&self) -> StartOffset {
        self.start_offset
    }

    /// Consumer group id scoping committed offsets.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Whether a consumption loop is currently running for this subscription.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Returns the client configuration as key-value pairs.
    pub fn client_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![
            (
                "bootstrap.servers".to_string(),
                self.endpoints.bootstrap_servers(),
            ),
            ("group.id".to_string(), self.group_id.clone()),
            (
                "client.id".to_string(),
                format!("kafkasub-{}", self.trigger),
            ),
            (
                "auto.offset.reset".to_string(),
                self.start_offset.as_reset_policy().to_string(),
            ),
            ("enable.auto.commit".to_string(), "true".to_string()),
            ("enable.partition.eof".to_string(), "false".to_string()),
            (
                "session.timeout.ms".to_string(),
                self.session_timeout.as_millis().to_string(),
            ),
        ];
        settings.extend(self.security.client_settings());
        settings
    }

    /// Connects, validates the partition assignment, and assigns partitions.
    ///
    /// The metadata round trip blocks, so it runs on the blocking pool. The
    /// client is dropped on every error path.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Connect` if the client cannot be created or
    /// the brokers do not answer within the metadata timeout, and
    /// `TriggerError::PartitionAssignment` if a requested partition is absent
    pub async fn open(&self) -> Result<ConsumerSession> {
        let mut config = ClientConfig::new();
        for (key, value) in self.client_settings() {
            config.set(key, value);
        }

        info!(
            brokers = %self.endpoints.bootstrap_servers(),
            topic = %self.topic,
            group_id = %self.group_id,
            security_protocol = %self.security.protocol().as_str(),
            partitions = ?self.partitions,
            "Opening subscription"
        );

        let topic = self.topic.clone();
        let requested = self.partitions.clone();
        let timeout = self.metadata_timeout;

        tokio::task::spawn_blocking(move || open_session(config, topic, requested, timeout))
            .await
            .map_err(|e| TriggerError::Connect(format!("open task failed: {}", e)))?
    }

    /// Action this subscription feeds.
    pub fn action_id(&self) -> &str {
        &self.action_id
    }
}

fn open_session(
    config: ClientConfig,
    topic: String,
    requested: Option<Vec<i32>>,
    timeout: Duration,
) -> Result<ConsumerSession> {
    let consumer: StreamConsumer = config
        .create()
        .map_err(|e| TriggerError::Connect(format!("failed to create consumer: {}", e)))?;

    let metadata = consumer
        .fetch_metadata(Some(topic.as_str()), timeout)
        .map_err(|e| {
            TriggerError::Connect(format!(
                "metadata request for topic '{}' failed: {}",
                topic, e
            ))
        })?;

    let topic_metadata = metadata.topics().iter().find(|t| t.name() == topic);
    check_topic_metadata(
        &topic,
        topic_metadata
            .and_then(|t| t.error())
            .map(RDKafkaErrorCode::from),
    )?;
    let available: Vec<i32> = topic_metadata
        .map(|t| t.partitions().iter().map(|p| p.id()).collect())
        .unwrap_or_default();

    let assigned = match requested {
        Some(requested) => {
            check_partitions(&topic, &requested, &available)?;
            requested
        }
        None if available.is_empty() => {
            return Err(TriggerError::PartitionAssignment {
                topic,
                requested: Vec::new(),
                available,
            });
        }
        None => available,
    };

    let mut assignment = TopicPartitionList::new();
    for partition in &assigned {
        assignment
            .add_partition_offset(&topic, *partition, Offset::Stored)
            .map_err(|e| TriggerError::Connect(format!("invalid assignment: {}", e)))?;
    }
    consumer
        .assign(&assignment)
        .map_err(|e| TriggerError::Connect(format!("partition assignment failed: {}", e)))?;

    Ok(ConsumerSession {
        consumer,
        topic,
        assigned,
    })
}

/// Counters reported when a consumption loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    /// Records the runner accepted.
    pub delivered: u64,
    /// Records whose dispatch failed.
    pub failed: u64,
}

/// Anything the consumption loop can pull records from.
#[async_trait::async_trait]
pub trait RecordSource: Send {
    /// Waits for the next record or client error.
    async fn next_record(&mut self) -> KafkaResult<ConsumedRecord>;
}

#[async_trait::async_trait]
impl RecordSource for StreamConsumer {
    async fn next_record(&mut self) -> KafkaResult<ConsumedRecord> {
        self.recv()
            .await
            .map(|message| ConsumedRecord::from_message(&message))
    }
}

/// Reads records from `source` and dispatches them until `cancellation` fires.
///
/// Cancellation is checked before every receive, so a stop request racing
/// with an arriving record is honored before that record is dispatched.
/// Dispatch failures and client errors are logged and consumption goes on.
pub async fn consume_records<S: RecordSource + ?Sized>(
    source: &mut S,
    dispatcher: &MessageDispatcher,
    cancellation: &CancellationToken,
) -> ConsumeSummary {
    let mut summary = ConsumeSummary::default();

    loop {
        let received = tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            received = source.next_record() => received,
        };

        match received {
            Ok(record) => match dispatcher.dispatch(&record).await {
                Ok(_) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Dispatch failed, continuing");
                }
            },
            Err(e) => {
                warn!(action_id = %dispatcher.action_id(), error = %e, "Kafka consumer error");
            }
        }
    }

    summary
}

/// Drops sessions on the blocking pool; closing a consumer blocks until
/// librdkafka has left the group and committed offsets.
pub(crate) async fn close_sessions(sessions: Vec<ConsumerSession>) {
    if sessions.is_empty() {
        return;
    }
    let count = sessions.len();
    match tokio::task::spawn_blocking(move || drop(sessions)).await {
        Ok(()) => debug!(count, "Closed consumer sessions"),
        Err(e) => warn!(count, error = %e, "Closing consumer sessions failed"),
    }
}

/// A live, assigned consumer for one subscription.
pub struct ConsumerSession {
    consumer: StreamConsumer,
    topic: String,
    assigned: Vec<i32>,
}

impl fmt::Debug for ConsumerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSession")
            .field("topic", &self.topic)
            .field("assigned", &self.assigned)
            .finish()
    }
}

impl ConsumerSession {
    /// Partitions this session reads.
    pub fn assigned_partitions(&self) -> &[i32] {
        &self.assigned
    }

    /// Runs [`consume_records`] over this session's consumer, then closes it.
    pub async fn consume(
        mut self,
        dispatcher: MessageDispatcher,
        cancellation: CancellationToken,
    ) -> ConsumeSummary {
        info!(
            topic = %self.topic,
            partitions = ?self.assigned,
            action_id = %dispatcher.action_id(),
            "Consumption loop started"
        );

        let summary = consume_records(&mut self.consumer, &dispatcher, &cancellation).await;

        info!(
            topic = %self.topic,
            delivered = summary.delivered,
            failed = summary.failed,
            "Consumption loop stopped"
        );

        close_sessions(vec![self]).await;
        summary
    }
}
