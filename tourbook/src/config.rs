//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `TOURBOOK_`, `__` between nesting levels)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/tourbook/{service_name}/config.toml
//! 4. System directory: /etc/tourbook/{service_name}/config.toml
//! 5. Default values
//!
//! `TOURBOOK_SERVICE__PORT=8080` sets `service.port`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Directory name under XDG and /etc
const CONFIG_PREFIX: &str = "tourbook";

/// Environment variable prefix
const ENV_PREFIX: &str = "TOURBOOK_";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Production hides internal error details from clients
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// HTTP middleware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Maximum request body size in kilobytes
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Recover from handler panics with a 500
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Gzip responses
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: permissive, restrictive or disabled
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,

    /// Per-client rate limiting of `/api` routes (governor)
    #[serde(default)]
    pub governor: LocalRateLimitConfig,
}

impl MiddlewareConfig {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_kb * 1024
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_kb: default_body_limit_kb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
            governor: LocalRateLimitConfig::default(),
        }
    }
}

/// Local rate limiting configuration (governor-based)
///
/// Each client may send `requests_per_period + burst_size` requests at once;
/// capacity then refills evenly over `period_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRateLimitConfig {
    /// Enable local rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per period
    #[serde(default = "default_governor_requests")]
    pub requests_per_period: u32,

    /// Time period in seconds
    #[serde(default = "default_governor_period_secs")]
    pub period_secs: u64,

    /// Extra requests allowed on top of the per-period quota
    #[serde(default)]
    pub burst_size: u32,
}

impl LocalRateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for LocalRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_period: default_governor_requests(),
            period_secs: default_governor_period_secs(),
            burst_size: 0,
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of `{collection}.json` arrays loaded at startup
    #[serde(default)]
    pub seed_dir: Option<PathBuf>,
}

// Default value functions
fn default_service_name() -> String {
    CONFIG_PREFIX.to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

fn default_body_limit_kb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

// Governor default functions
fn default_governor_requests() -> u32 {
    100
}

fn default_governor_period_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the binary name, falling back to
    /// `tourbook`.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first, so later files override earlier ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment.merge(Self::env_provider()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Skips the XDG and system directories; environment variables still
    /// apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env_provider())
            .extract()?;

        Ok(config)
    }

    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Possible config file paths, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: default_service_name(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            middleware: MiddlewareConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.name, "tourbook");
        assert_eq!(config.service.port, 3000);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.service.timeout(), Duration::from_secs(30));
        assert!(!config.service.is_production());
        assert_eq!(config.middleware.body_limit_bytes(), 10 * 1024);
        assert!(config.store.seed_dir.is_none());
        assert!(config.middleware.governor.enabled);
        assert_eq!(config.middleware.governor.requests_per_period, 100);
        assert_eq!(config.middleware.governor.period(), Duration::from_secs(3600));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "tourbook"
port = 8080
environment = "production"

[store]
seed_dir = "/var/lib/tourbook/seed"

[middleware.governor]
requests_per_period = 20
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.port, 8080);
        assert!(config.service.is_production());
        assert_eq!(config.service.log_level, "info");
        assert_eq!(
            config.store.seed_dir,
            Some(PathBuf::from("/var/lib/tourbook/seed"))
        );
        assert!(config.middleware.compression);
        assert_eq!(config.middleware.governor.requests_per_period, 20);
        assert_eq!(config.middleware.governor.period_secs, 3600);
        assert!(config.middleware.governor.enabled);
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TOURBOOK_SERVICE__LOG_LEVEL", "debug");
            jail.set_env("TOURBOOK_MIDDLEWARE__BODY_LIMIT_KB", "64");
            let config = Config::load_from("missing.toml").expect("config loads");
            assert_eq!(config.service.log_level, "debug");
            assert_eq!(config.middleware.body_limit_kb, 64);
            Ok(())
        });
    }
}
