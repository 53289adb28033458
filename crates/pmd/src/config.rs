//! Configuration file support for pmd
//!
//! Loads and validates pmd configuration from TOML files.
//! Default location: /etc/sonic/pmd.toml

use crate::error::{PmdError, PmdResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/pmd.toml";

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Redis host
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Redis database number for CONFIG_DB
    #[serde(default = "default_config_db_number")]
    pub config_db_number: u32,

    /// Redis database number for STATE_DB
    #[serde(default = "default_state_db_number")]
    pub state_db_number: u32,
}

/// Poll loop and hardware retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between poll passes in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Retries after the first failed hardware access
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Wall-clock budget of one hardware operation including its retries
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Time the reset line is held asserted
    #[serde(default = "default_reset_assert_delay_ms")]
    pub reset_assert_delay_ms: u64,

    /// Settle time after the reset line is released
    #[serde(default = "default_reset_release_delay_ms")]
    pub reset_release_delay_ms: u64,

    /// Re-read diagnostics every N passes (0 disables refresh)
    #[serde(default)]
    pub dom_refresh_cycles: u32,
}

/// Hardware access backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct register and EEPROM access over i2c-dev
    #[default]
    I2c,
    /// Vendor SDK register access
    Sdk,
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Hardware topology description
    #[serde(default = "default_topology_path")]
    pub topology: PathBuf,
}

/// Complete pmd configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PmdConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Retry and timing parameters consumed by the module state machine and the
/// reset controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub operation_timeout: Duration,
    pub reset_assert_delay: Duration,
    pub reset_release_delay: Duration,
}

impl RetryPolicy {
    /// Policy with no delays, for simulated hardware.
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            operation_timeout: Duration::from_secs(60),
            reset_assert_delay: Duration::ZERO,
            reset_release_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        PollingConfig::default().retry_policy()
    }
}

// Default functions
fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_config_db_number() -> u32 {
    4
}

fn default_state_db_number() -> u32 {
    6
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_retry_count() -> u32 {
    2
}

fn default_operation_timeout_ms() -> u64 {
    1000
}

fn default_reset_assert_delay_ms() -> u64 {
    1
}

fn default_reset_release_delay_ms() -> u64 {
    10
}

fn default_topology_path() -> PathBuf {
    PathBuf::from("/etc/sonic/pmd/topology.yaml")
}

// Default implementations
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            config_db_number: default_config_db_number(),
            state_db_number: default_state_db_number(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retry_count: default_retry_count(),
            operation_timeout_ms: default_operation_timeout_ms(),
            reset_assert_delay_ms: default_reset_assert_delay_ms(),
            reset_release_delay_ms: default_reset_release_delay_ms(),
            dom_refresh_cycles: 0,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            topology: default_topology_path(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry_count,
            operation_timeout: self.operation_timeout(),
            reset_assert_delay: Duration::from_millis(self.reset_assert_delay_ms),
            reset_release_delay: Duration::from_millis(self.reset_release_delay_ms),
        }
    }
}

impl PmdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> PmdResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                PmdError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(PmdError::Io(e)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> PmdResult<()> {
        if self.database.redis_port == 0 {
            return Err(PmdError::Configuration(
                "redis_port must be > 0".to_string(),
            ));
        }

        if self.polling.interval_ms == 0 {
            return Err(PmdError::Configuration(
                "interval_ms must be > 0".to_string(),
            ));
        }

        if self.polling.operation_timeout_ms == 0 {
            return Err(PmdError::Configuration(
                "operation_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.platform.backend == BackendKind::Sdk {
            return Err(PmdError::Configuration(
                "backend \"sdk\" needs a vendor register access library, none is linked in"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
