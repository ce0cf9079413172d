//! Kafka subscription trigger
//!
//! This module consumes Kafka topics on behalf of configured handlers and
//! forwards every record to a host-supplied action runner.
//!
//! # Overview
//!
//! Configuration flows through the submodules in order:
//!
//! 1. **Resolve**: `BrokerUrl` becomes a validated [`EndpointSet`]
//! 2. **Secure**: handler settings become a [`SecurityProfile`]
//! 3. **Subscribe**: each handler becomes a [`Subscription`]
//! 4. **Run**: [`KafkaTrigger`] opens subscriptions and drives one
//!    consumption loop per handler
//! 5. **Dispatch**: each record goes through a [`MessageDispatcher`] to the
//!    [`ActionRunner`]
//!
//! # Submodules
//!
//! - [`endpoint`]: Broker list parsing and validation
//! - [`security`]: TLS and SASL connection profiles
//! - [`subscription`]: Partition assignment and the consumption loop
//! - [`lifecycle`]: Init/Start/Stop state machine
//! - [`dispatcher`]: Output mapping and action invocation
//! - [`message`]: Owned record type

pub mod dispatcher;
pub mod endpoint;
pub mod lifecycle;
pub mod message;
pub mod security;
pub mod subscription;

pub use dispatcher::{
    ActionRunner, MessageDispatcher, OutputKind, OutputSchema, OutputValues, RunContext,
    RunOutcome,
};
pub use endpoint::{resolve, Endpoint, EndpointSet};
pub use lifecycle::{KafkaTrigger, TriggerState};
pub use message::ConsumedRecord;
pub use security::{SaslCredentials, SaslMechanism, SecurityProfile, SecurityProtocol};
pub use subscription::{
    check_partitions, check_topic_metadata, consume_records, parse_partitions, ConsumeSummary,
    ConsumerSession, RecordSource, StartOffset, Subscription,
};
