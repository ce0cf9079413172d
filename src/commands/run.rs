//! `run` command: host a trigger until shutdown.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::commands::LogRunner;
use crate::config::{LoggingConfig, TriggerConfig};
use crate::trigger::KafkaTrigger;

/// Run a trigger until Ctrl-C, SIGTERM, or the optional duration elapses
///
/// # Arguments
///
/// * `config_path` - Path to the trigger configuration file
/// * `duration` - Optional run time in seconds
/// * `logging` - Logging options; `include_payload` enables payload logging
///
/// # Errors
///
/// Returns error if the trigger fails to load, initialize or start
pub async fn run_trigger(
    config_path: &Path,
    duration: Option<u64>,
    logging: &LoggingConfig,
) -> Result<()> {
    let config = TriggerConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut trigger = KafkaTrigger::new(config).with_payload_logging(logging.include_payload);
    trigger.init(LogRunner::new(logging.include_payload).shared())?;
    trigger
        .start()
        .await
        .with_context(|| format!("Trigger '{}' failed to start", trigger.name()))?;

    let reason = wait_for_shutdown(duration.map(Duration::from_secs)).await;
    info!(reason, "Shutdown requested");

    trigger.stop().await?;
    Ok(())
}

/// Resolves when the process is interrupted or `limit` elapses.
async fn wait_for_shutdown(limit: Option<Duration>) -> &'static str {
    let elapsed = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = elapsed => "duration elapsed",
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            "interrupt"
        }
        _ = terminate() => "terminate",
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
