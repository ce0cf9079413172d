//! Error types for kafkasub
//!
//! This module defines the error taxonomy used by the trigger, using
//! `thiserror` for ergonomic error handling. Configuration-time errors are
//! raised synchronously from `init`/`start`; dispatch errors stay inside the
//! consumption loop that produced them.

use thiserror::Error;

/// Main error type for trigger operations
///
/// Variants are grouped by when they can occur: while resolving
/// configuration, while connecting to the cluster, or while handing a
/// record to the action runner.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// A broker address segment is malformed
    #[error("Invalid broker endpoint '{segment}': {reason}")]
    InvalidEndpoint {
        /// The offending comma-separated segment
        segment: String,
        /// Why the segment was rejected
        reason: String,
    },

    /// Broker unreachable, credentials rejected, or client creation failed
    #[error("Connection error: {0}")]
    Connect(String),

    /// A requested partition does not exist on the topic
    #[error(
        "Partition assignment error: topic '{topic}' has partitions {available:?}, requested {requested:?}"
    )]
    PartitionAssignment {
        /// Topic the assignment was requested on
        topic: String,
        /// Partitions named in the handler settings
        requested: Vec<i32>,
        /// Partitions reported by the broker metadata
        available: Vec<i32>,
    },

    /// The `partitions` setting does not parse as a partition list
    #[error("Invalid partition list: {0}")]
    InvalidPartitionList(String),

    /// The action runner reported a failure for one record
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Missing or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle operation invoked from a state that does not allow it
    #[error("Cannot {operation} trigger while {state}")]
    InvalidState {
        /// The attempted operation (`initialize`, `start`)
        operation: &'static str,
        /// The state the trigger was in
        state: String,
    },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TriggerError {
    /// Returns true when retrying the same operation may succeed.
    ///
    /// Only connection failures qualify; everything else needs the
    /// configuration fixed first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    /// Returns true for errors caused by the partition settings of a handler.
    pub fn is_partition_error(&self) -> bool {
        matches!(
            self,
            Self::PartitionAssignment { .. } | Self::InvalidPartitionList(_)
        )
    }
}

/// Result type alias for trigger operations
pub type Result<T> = std::result::Result<T, TriggerError>;
