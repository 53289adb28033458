//! Connector classification and cable attributes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Published connector type of a port.
///
/// `Absent` and `Unknown` are reported for empty cages and for modules whose
/// identification could not be validated or classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorKind {
    #[serde(rename = "absent")]
    Absent,
    #[serde(rename = "unknown")]
    Unknown,
    SfpRj45,
    SfpSx,
    SfpLx,
    SfpCx,
    SfpSr,
    SfpLr,
    SfpLrm,
    SfpEr,
    SfpDac,
    Sfp28Sr,
    Sfp28Lr,
    Sfp28Dac,
    QsfpCr4,
    QsfpSr4,
    QsfpLr4,
    QsfpAoc,
    Qsfp28Cr4,
    Qsfp28Sr4,
    Qsfp28Lr4,
    Qsfp28Cwdm4,
    Qsfp28Psm4,
    Qsfp28Aoc,
}

impl ConnectorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Absent => "absent",
            ConnectorKind::Unknown => "unknown",
            ConnectorKind::SfpRj45 => "SFP_RJ45",
            ConnectorKind::SfpSx => "SFP_SX",
            ConnectorKind::SfpLx => "SFP_LX",
            ConnectorKind::SfpCx => "SFP_CX",
            ConnectorKind::SfpSr => "SFP_SR",
            ConnectorKind::SfpLr => "SFP_LR",
            ConnectorKind::SfpLrm => "SFP_LRM",
            ConnectorKind::SfpEr => "SFP_ER",
            ConnectorKind::SfpDac => "SFP_DAC",
            ConnectorKind::Sfp28Sr => "SFP28_SR",
            ConnectorKind::Sfp28Lr => "SFP28_LR",
            ConnectorKind::Sfp28Dac => "SFP28_DAC",
            ConnectorKind::QsfpCr4 => "QSFP_CR4",
            ConnectorKind::QsfpSr4 => "QSFP_SR4",
            ConnectorKind::QsfpLr4 => "QSFP_LR4",
            ConnectorKind::QsfpAoc => "QSFP_AOC",
            ConnectorKind::Qsfp28Cr4 => "QSFP28_CR4",
            ConnectorKind::Qsfp28Sr4 => "QSFP28_SR4",
            ConnectorKind::Qsfp28Lr4 => "QSFP28_LR4",
            ConnectorKind::Qsfp28Cwdm4 => "QSFP28_CWDM4",
            ConnectorKind::Qsfp28Psm4 => "QSFP28_PSM4",
            ConnectorKind::Qsfp28Aoc => "QSFP28_AOC",
        }
    }

    /// Speeds in Mbps the module can run at, ascending.
    pub const fn supported_speeds(&self) -> &'static [u32] {
        match self {
            ConnectorKind::Absent | ConnectorKind::Unknown => &[],
            ConnectorKind::SfpRj45
            | ConnectorKind::SfpSx
            | ConnectorKind::SfpLx
            | ConnectorKind::SfpCx => &[1000],
            ConnectorKind::SfpSr
            | ConnectorKind::SfpLr
            | ConnectorKind::SfpLrm
            | ConnectorKind::SfpEr
            | ConnectorKind::SfpDac => &[10000],
            ConnectorKind::Sfp28Sr | ConnectorKind::Sfp28Lr | ConnectorKind::Sfp28Dac => {
                &[10000, 25000]
            }
            ConnectorKind::QsfpCr4
            | ConnectorKind::QsfpSr4
            | ConnectorKind::QsfpLr4
            | ConnectorKind::QsfpAoc => &[40000],
            ConnectorKind::Qsfp28Cr4
            | ConnectorKind::Qsfp28Sr4
            | ConnectorKind::Qsfp28Lr4
            | ConnectorKind::Qsfp28Cwdm4
            | ConnectorKind::Qsfp28Psm4
            | ConnectorKind::Qsfp28Aoc => &[100000],
        }
    }

    pub fn max_speed(&self) -> Option<u32> {
        self.supported_speeds().last().copied()
    }

    /// Returns true for kinds produced by a successful classification.
    pub const fn is_classified(&self) -> bool {
        !matches!(self, ConnectorKind::Absent | ConnectorKind::Unknown)
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cable technology of a direct-attach or active cable assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CableTechnology {
    Passive,
    Active,
}

impl fmt::Display for CableTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CableTechnology::Passive => write!(f, "passive"),
            CableTechnology::Active => write!(f, "active"),
        }
    }
}

/// Power mode derived from the declared power class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    Low,
    High,
}

impl PowerMode {
    /// Maps the SFF-8636 power class bits (byte 1, bits 7..6).
    pub const fn from_power_class(ext_identifier: u8) -> Self {
        if ext_identifier & 0xc0 == 0 {
            PowerMode::Low
        } else {
            PowerMode::High
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerMode::Low => write!(f, "low"),
            PowerMode::High => write!(f, "high"),
        }
    }
}
