//! SFF-8024 identifier byte.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SffError;

/// Module identifier (byte 0 of the identification page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// SFP, SFP+ and SFP28 (0x03).
    Sfp,
    /// QSFP (0x0C).
    Qsfp,
    /// QSFP+ (0x0D).
    QsfpPlus,
    /// QSFP28 (0x11).
    Qsfp28,
}

/// Memory map family of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleFamily {
    /// SFF-8472: two-wire addresses A0/A2, single lane.
    Sfp,
    /// SFF-8636: paged map, four lanes.
    Qsfp,
}

impl Identifier {
    /// Identifier for SFP family modules.
    pub const SFP: u8 = 0x03;
    /// Identifier for QSFP modules.
    pub const QSFP: u8 = 0x0c;
    /// Identifier for QSFP+ modules.
    pub const QSFP_PLUS: u8 = 0x0d;
    /// Identifier for QSFP28 modules.
    pub const QSFP28: u8 = 0x11;

    /// Decodes the identifier byte.
    pub fn from_byte(byte: u8) -> Result<Self, SffError> {
        match byte {
            Self::SFP => Ok(Identifier::Sfp),
            Self::QSFP => Ok(Identifier::Qsfp),
            Self::QSFP_PLUS => Ok(Identifier::QsfpPlus),
            Self::QSFP28 => Ok(Identifier::Qsfp28),
            other => Err(SffError::UnsupportedIdentifier(other)),
        }
    }

    /// Raw identifier byte.
    pub const fn as_byte(&self) -> u8 {
        match self {
            Identifier::Sfp => Self::SFP,
            Identifier::Qsfp => Self::QSFP,
            Identifier::QsfpPlus => Self::QSFP_PLUS,
            Identifier::Qsfp28 => Self::QSFP28,
        }
    }

    pub const fn family(&self) -> ModuleFamily {
        match self {
            Identifier::Sfp => ModuleFamily::Sfp,
            Identifier::Qsfp | Identifier::QsfpPlus | Identifier::Qsfp28 => ModuleFamily::Qsfp,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Identifier::Sfp => "SFP/SFP+/SFP28",
            Identifier::Qsfp => "QSFP",
            Identifier::QsfpPlus => "QSFP+",
            Identifier::Qsfp28 => "QSFP28",
        };
        write!(f, "{}", s)
    }
}

impl ModuleFamily {
    /// Offset of the identification page in the module's two-wire map.
    ///
    /// SFP modules expose it at A0h offset 0, QSFP modules as upper page 00
    /// starting at offset 128.
    pub const fn serial_id_offset(&self) -> u8 {
        match self {
            ModuleFamily::Sfp => 0,
            ModuleFamily::Qsfp => 128,
        }
    }

    /// Number of electrical lanes reported by diagnostics.
    pub const fn lanes(&self) -> usize {
        match self {
            ModuleFamily::Sfp => 1,
            ModuleFamily::Qsfp => 4,
        }
    }
}

impl fmt::Display for ModuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFamily::Sfp => write!(f, "SFP"),
            ModuleFamily::Qsfp => write!(f, "QSFP"),
        }
    }
}
