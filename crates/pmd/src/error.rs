//! Error types for pmd

use std::time::Duration;

use sonic_sff::SffError;
use thiserror::Error;

/// Pluggable module daemon errors
#[derive(Error, Debug)]
pub enum PmdError {
    /// Register or EEPROM access failed
    #[error("Transport failure on {device}: {message}")]
    Transport { device: String, message: String },

    /// Register or EEPROM access exceeded its wall-clock budget
    #[error("Operation on {device} timed out after {elapsed:?}")]
    Timeout { device: String, elapsed: Duration },

    /// Identification page failed its check codes
    #[error("Checksum mismatch on {module}: {source}")]
    ChecksumMismatch {
        module: String,
        #[source]
        source: SffError,
    },

    /// Identification page is intact but describes an unsupported module
    #[error("Unsupported cable type on {module}: {source}")]
    UnsupportedCableType {
        module: String,
        #[source]
        source: SffError,
    },

    /// Port connector has no presence or control signals
    #[error("Module {module} is not pluggable (connector {connector})")]
    NotPluggable { module: String, connector: String },

    /// Topology has no such device
    #[error("Device {device} not found in subsystem {subsystem}")]
    DeviceNotFound { subsystem: String, device: String },

    /// Register descriptor with a width other than 1, 2 or 4 bytes
    #[error("Invalid register size {size} for {device}")]
    InvalidRegisterSize { device: String, size: u8 },

    /// Subsystem is not registered
    #[error("Subsystem {0} not found")]
    SubsystemNotFound(String),

    /// Database connection error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PmdError {
    pub fn transport(device: impl Into<String>, message: impl Into<String>) -> Self {
        PmdError::Transport {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn device_not_found(subsystem: impl Into<String>, device: impl Into<String>) -> Self {
        PmdError::DeviceNotFound {
            subsystem: subsystem.into(),
            device: device.into(),
        }
    }

    /// Returns true if repeating the operation, possibly after a module
    /// reset, can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PmdError::Transport { .. } | PmdError::Timeout { .. } | PmdError::ChecksumMismatch { .. }
        )
    }
}

/// Result type for pmd operations
pub type PmdResult<T> = std::result::Result<T, PmdError>;
