//! Tracing initialisation

use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// Filter from `RUST_LOG` when set, else the configured level, else `info`
fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.service.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global JSON subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(config))
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialise tracing: {}", e)))?;

    tracing::info!(
        environment = %config.service.environment,
        "Tracing initialized for service: {}", config.service.name
    );

    Ok(())
}

/// Flush and report shutdown
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_fails_cleanly() {
        let config = Config::default();
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Whichever call lost the race reports an error instead of panicking
        assert!(first.is_err() || second.is_err());
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let mut config = Config::default();
        config.service.log_level = "not a [valid filter".to_string();
        let _filter = env_filter(&config);
    }
}
