//! Pluggable Module Daemon
//!
//! Detects SFP/QSFP transceiver modules in the front panel cages, validates
//! and decodes their management memory, publishes identity and diagnostics
//! to STATE_DB, and applies the enable state requested in CONFIG_DB.

pub mod attributes;
pub mod backend;
pub mod config;
pub mod control;
pub mod daemon;
pub mod db;
pub mod debug;
pub mod eeprom;
pub mod error;
pub mod module;
pub mod presence;
pub mod registry;
pub mod retry;
pub mod state_machine;
pub mod tables;
pub mod topology;
pub mod transport;

pub use attributes::{ConnectorStatus, ModuleAttributes};
pub use backend::{ModuleBackend, RegisterBackend, SdkBackend, SdkRegisterAccess};
pub use config::{BackendKind, PmdConfig, RetryPolicy};
pub use daemon::{Daemon, PassSummary};
pub use db::{ConfigSnapshot, ConfigStore, FieldValues, RedisConfigStore};
pub use eeprom::DiagnosticPages;
pub use error::{PmdError, PmdResult};
pub use module::{Module, ModuleState, Subsystem};
pub use registry::Registry;
pub use state_machine::{poll_module, PollOutcome};
pub use topology::{StaticTopology, TopologyDirectory};
pub use transport::{MemoryTransport, RegisterTransport};
