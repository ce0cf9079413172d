//! `check` command: config-only mode.
//!
//! Loads and initializes a trigger without opening any broker connection,
//! then prints what each handler would subscribe to.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::commands::LogRunner;
use crate::config::TriggerConfig;
use crate::trigger::{KafkaTrigger, Subscription};

/// Validate a configuration file and initialize a trigger from it
///
/// # Arguments
///
/// * `config_path` - Path to the trigger configuration file
///
/// # Errors
///
/// Returns error if the file cannot be loaded or any handler fails to resolve
pub fn check_config(config_path: &Path) -> Result<()> {
    let config = TriggerConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut trigger = KafkaTrigger::new(config);
    trigger
        .init(LogRunner::default().shared())
        .with_context(|| format!("Trigger '{}' failed to initialize", trigger.name()))?;

    info!(trigger = %trigger.name(), "Configuration check passed");
    println!(
        "Trigger '{}' OK: {} handler(s)",
        trigger.name(),
        trigger.subscriptions().len()
    );
    for subscription in trigger.subscriptions() {
        println!("  {}", describe(subscription));
    }

    Ok(())
}

fn describe(subscription: &Subscription) -> String {
    let partitions = match subscription.partitions() {
        Some(ids) => ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        None => "all".to_string(),
    };
    format!(
        "{} <- topic '{}' via {} [{}] partitions={} group={}",
        subscription.action_id(),
        subscription.topic(),
        subscription.endpoints().bootstrap_servers(),
        subscription.security().protocol().as_str(),
        partitions,
        subscription.group_id()
    )
}
