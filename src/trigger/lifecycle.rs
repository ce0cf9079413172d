//! Trigger lifecycle controller.
//!
//! [`KafkaTrigger`] moves through `Created → Initialized → Started → Stopped`.
//! `init` resolves every handler into a [`Subscription`] without network I/O,
//! `start` opens the subscriptions and spawns one consumption task each, and
//! `stop` cancels the tasks and waits for them to exit.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{TriggerConfig, SASL_PASSWORD_ENV};
use crate::error::{Result, TriggerError};
use crate::trigger::dispatcher::{ActionRunner, MessageDispatcher, OutputSchema};
use crate::trigger::endpoint::resolve;
use crate::trigger::subscription::{
    close_sessions, ConsumeSummary, ConsumerSession, Subscription,
};

/// Lifecycle state of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// Constructed, not yet initialized
    Created,
    /// Subscriptions resolved, nothing connected
    Initialized,
    /// Consumption loops running
    Started,
    /// Loops exited and subscriptions released
    Stopped,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A Kafka subscription trigger.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use kafkasub::config::TriggerConfig;
/// use kafkasub::trigger::{ActionRunner, KafkaTrigger};
///
/// # async fn example(runner: Arc<dyn ActionRunner>) -> kafkasub::Result<()> {
/// let config = TriggerConfig::load("trigger.json")?;
/// let mut trigger = KafkaTrigger::new(config);
/// trigger.init(runner)?;
/// trigger.start().await?;
/// // ...
/// trigger.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaTrigger {
    config: TriggerConfig,
    state: TriggerState,
    include_payload: bool,
    subscriptions: Vec<Subscription>,
    dispatchers: Vec<MessageDispatcher>,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<ConsumeSummary>>,
}

impl KafkaTrigger {
    /// Creates a trigger in the `Created` state.
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            state: TriggerState::Created,
            include_payload: false,
            subscriptions: Vec::new(),
            dispatchers: Vec::new(),
            cancellation: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Logs record payloads at debug level when dispatching.
    pub fn with_payload_logging(mut self, enabled: bool) -> Self {
        self.include_payload = enabled;
        self
    }

    /// Trigger name from the configuration.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Subscriptions built by `init`, one per handler in declaration order.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Resolves every handler into a subscription.
    ///
    /// No connection is made. On error the trigger stays `Created`.
    ///
    /// # Arguments
    ///
    /// * `runner` - Host capability invoked for every consumed record
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::InvalidEndpoint` for a malformed `BrokerUrl`,
    /// `TriggerError::InvalidPartitionList` for a malformed `partitions`
    /// setting, `TriggerError::Config` for other bad settings, and
    /// `TriggerError::InvalidState` unless the trigger is `Created`
    pub fn init(&mut self, runner: Arc<dyn ActionRunner>) -> Result<()> {
        self.expect_state(TriggerState::Created, "initialize")?;

        self.config.validate()?;
        let endpoints = resolve(self.config.broker_url()?)?;
        let schema = Arc::new(OutputSchema::from_fields(&self.config.outputs)?);
        let env_password = std::env::var(SASL_PASSWORD_ENV).ok();

        let mut subscriptions = Vec::with_capacity(self.config.handlers.len());
        let mut dispatchers = Vec::with_capacity(self.config.handlers.len());
        for handler in &self.config.handlers {
            let subscription = Subscription::from_handler(
                &self.config,
                handler,
                endpoints.clone(),
                env_password.clone(),
            )?;
            debug!(
                action_id = %handler.action_id,
                topic = %subscription.topic(),
                security_protocol = %subscription.security().protocol().as_str(),
                "Resolved subscription"
            );
            subscriptions.push(subscription);
            dispatchers.push(
                MessageDispatcher::new(&self.config.name, handler, schema.clone(), runner.clone())
                    .with_payload_logging(self.include_payload),
            );
        }

        self.subscriptions = subscriptions;
        self.dispatchers = dispatchers;
        self.state = TriggerState::Initialized;

        info!(
            trigger = %self.config.name,
            brokers = %endpoints,
            handlers = self.subscriptions.len(),
            "Trigger initialized"
        );
        Ok(())
    }

    /// Opens every subscription and spawns its consumption loop.
    ///
    /// Returns once all loops are running. If any subscription fails to open,
    /// sessions opened so far are closed and the trigger stays `Initialized`.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Connect` or `TriggerError::PartitionAssignment`
    /// from the failing subscription, or `TriggerError::InvalidState` unless
    /// the trigger is `Initialized`
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(TriggerState::Initialized, "start")?;

        let mut sessions: Vec<ConsumerSession> = Vec::with_capacity(self.subscriptions.len());
        for subscription in &self.subscriptions {
            match subscription.open().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    error!(
                        trigger = %self.config.name,
                        topic = %subscription.topic(),
                        error = %e,
                        "Failed to open subscription"
                    );
                    close_sessions(sessions).await;
                    return Err(e);
                }
            }
        }

        for ((subscription, dispatcher), session) in self
            .subscriptions
            .iter()
            .zip(&self.dispatchers)
            .zip(sessions)
        {
            info!(
                topic = %subscription.topic(),
                action_id = %subscription.action_id(),
                partitions = ?session.assigned_partitions(),
                "Starting consumption loop"
            );
            subscription.set_running(true);
            let token = self.cancellation.child_token();
            self.tasks
                .push(tokio::spawn(session.consume(dispatcher.clone(), token)));
        }

        self.state = TriggerState::Started;
        info!(trigger = %self.config.name, "Trigger started");
        Ok(())
    }

    /// Stops every consumption loop and waits for each to exit.
    ///
    /// No record is dispatched after this returns. Calling it in any state
    /// other than `Started` does nothing.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != TriggerState::Started {
            debug!(state = %self.state, "Stop requested while not started, ignoring");
            return Ok(());
        }

        info!(trigger = %self.config.name, "Stopping trigger");
        self.cancellation.cancel();

        for (task, subscription) in self.tasks.drain(..).zip(&self.subscriptions) {
            match task.await {
                Ok(summary) => debug!(
                    topic = %subscription.topic(),
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "Consumption loop joined"
                ),
                Err(e) => warn!(topic = %subscription.topic(), error = %e, "Consumption task aborted"),
            }
            subscription.set_running(false);
        }

        self.subscriptions.clear();
        self.dispatchers.clear();
        self.state = TriggerState::Stopped;
        info!(trigger = %self.config.name, "Trigger stopped");
        Ok(())
    }

    fn expect_state(&self, expected: TriggerState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TriggerError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }
}

impl fmt::Debug for KafkaTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaTrigger")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl Drop for KafkaTrigger {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
