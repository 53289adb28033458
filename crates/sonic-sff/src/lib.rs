//! Transceiver management memory map decoding for SONiC.
//!
//! This crate turns the raw bytes of a pluggable module's management
//! EEPROM into typed values. It performs no I/O:
//!
//! - [`checksum`]: base-ID page check codes (CC_BASE / CC_EXT)
//! - [`Identifier`]: the SFF-8024 identifier byte and module family
//! - [`ModuleIdentity`]: vendor strings, connector classification, cable
//!   technology, speeds and DOM capability
//! - [`Diagnostics`]: calibrated real-time monitors with alarm/warning
//!   flags and thresholds
//!
//! Both SFP (SFF-8472 page A0/A2) and QSFP (SFF-8636 lower page and upper
//! pages 00/03) layouts are supported. Serial-ID offsets are relative to the
//! start of the 128-byte identification page in either case.

pub mod checksum;
mod connector;
mod dom;
mod identifier;
mod identity;

pub use connector::{CableTechnology, ConnectorKind, PowerMode};
pub use dom::{Calibration, Diagnostics, MonitoredValue, Thresholds};
pub use identifier::{Identifier, ModuleFamily};
pub use identity::ModuleIdentity;

/// Size of the base identification page (A0 / upper page 00).
pub const SERIAL_ID_PAGE_SIZE: usize = 128;

/// Size of a diagnostic monitoring page (A2 / lower page 0 / upper page 03).
pub const DOM_PAGE_SIZE: usize = 128;

/// Raw base identification page.
pub type SerialIdPage = [u8; SERIAL_ID_PAGE_SIZE];

/// Raw diagnostic monitoring page.
pub type DomPage = [u8; DOM_PAGE_SIZE];

/// Errors raised while validating or decoding a memory map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SffError {
    #[error("unsupported identifier 0x{0:02x}")]
    UnsupportedIdentifier(u8),

    #[error("{field} checksum mismatch: stored 0x{stored:02x}, computed 0x{computed:02x}")]
    ChecksumMismatch {
        field: &'static str,
        stored: u8,
        computed: u8,
    },

    #[error("page truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
}
