//! Hardware topology directory.
//!
//! The topology describes, per subsystem, the devices reachable through the
//! register transport and the pluggable ports wired to them: which EEPROM
//! device holds the module map and which register bits carry the presence,
//! tx-disable and reset signals.

use serde::{Deserialize, Serialize};
use sonic_sff::ModuleFamily;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PmdError, PmdResult};

/// Suffix naming the diagnostics device of an SFP module EEPROM.
pub const DOM_DEVICE_SUFFIX: &str = "_A2";

/// A device addressable through the register transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    /// Bus the device sits on, e.g. `/dev/i2c-10`.
    pub bus: String,
    /// Two-wire slave address.
    pub address: u16,
}

/// A signal carried by bits of a device register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOp {
    pub device: String,
    pub register_address: u8,
    /// Width in bytes: 1, 2 or 4.
    #[serde(default = "default_register_size")]
    pub register_size: u8,
    pub bit_mask: u32,
    /// Signal is active when the masked bits read as zero.
    #[serde(default)]
    pub negative_polarity: bool,
}

fn default_register_size() -> u8 {
    1
}

impl RegisterOp {
    /// Returns true if the signal is active in `raw`.
    pub fn is_asserted(&self, raw: u32) -> bool {
        (raw & self.bit_mask != 0) != self.negative_polarity
    }

    /// Returns `current` with the signal bits driven to `asserted`.
    pub fn drive(&self, current: u32, asserted: bool) -> u32 {
        if asserted != self.negative_polarity {
            current | self.bit_mask
        } else {
            current & !self.bit_mask
        }
    }
}

/// Pluggable connector types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorType {
    SfpPlus,
    QsfpPlus,
    Qsfp28,
}

impl ConnectorType {
    pub const fn family(&self) -> ModuleFamily {
        match self {
            ConnectorType::SfpPlus => ModuleFamily::Sfp,
            ConnectorType::QsfpPlus | ConnectorType::Qsfp28 => ModuleFamily::Qsfp,
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectorType::SfpPlus => "SFP_PLUS",
            ConnectorType::QsfpPlus => "QSFP_PLUS",
            ConnectorType::Qsfp28 => "QSFP28",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConnectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SFP_PLUS" => Ok(ConnectorType::SfpPlus),
            "QSFP_PLUS" => Ok(ConnectorType::QsfpPlus),
            "QSFP28" => Ok(ConnectorType::Qsfp28),
            _ => Err(s.to_string()),
        }
    }
}

/// Signals of an SFP cage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfpSignals {
    pub mod_present: RegisterOp,
    pub tx_disable: Option<RegisterOp>,
}

/// Signals of a QSFP cage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QsfpSignals {
    pub mod_present: RegisterOp,
    pub reset: Option<RegisterOp>,
}

/// A front panel port as wired on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub instance: String,
    /// Connector type as written in the topology; fixed ports use values
    /// such as `RJ45`.
    pub connector: String,
    /// Device holding the module management map.
    #[serde(default)]
    pub module_eeprom: String,
    #[serde(default)]
    pub sfp: Option<SfpSignals>,
    #[serde(default)]
    pub qsfp: Option<QsfpSignals>,
}

impl PortDescriptor {
    /// Resolves the connector type, failing for ports that take no module.
    pub fn connector_type(&self) -> PmdResult<ConnectorType> {
        self.connector
            .parse()
            .map_err(|connector| PmdError::NotPluggable {
                module: self.instance.clone(),
                connector,
            })
    }

    /// Presence signal for the port's connector type.
    pub fn presence_signal(&self) -> PmdResult<&RegisterOp> {
        let signal = match self.connector_type()? {
            ConnectorType::SfpPlus => self.sfp.as_ref().map(|s| &s.mod_present),
            ConnectorType::QsfpPlus | ConnectorType::Qsfp28 => {
                self.qsfp.as_ref().map(|s| &s.mod_present)
            }
        };
        signal.ok_or_else(|| self.missing("mod_present"))
    }

    /// Reset signal; only QSFP cages have one.
    pub fn reset_signal(&self) -> PmdResult<Option<&RegisterOp>> {
        Ok(match self.connector_type()? {
            ConnectorType::SfpPlus => None,
            ConnectorType::QsfpPlus | ConnectorType::Qsfp28 => {
                self.qsfp.as_ref().and_then(|s| s.reset.as_ref())
            }
        })
    }

    /// Tx-disable signal; only SFP cages have one.
    pub fn tx_disable_signal(&self) -> PmdResult<Option<&RegisterOp>> {
        Ok(match self.connector_type()? {
            ConnectorType::SfpPlus => self.sfp.as_ref().and_then(|s| s.tx_disable.as_ref()),
            ConnectorType::QsfpPlus | ConnectorType::Qsfp28 => None,
        })
    }

    /// Name of the SFP diagnostics device.
    pub fn dom_device(&self) -> String {
        format!("{}{}", self.module_eeprom, DOM_DEVICE_SUFFIX)
    }

    fn missing(&self, signal: &str) -> PmdError {
        PmdError::Configuration(format!(
            "port {} ({}) has no {} signal",
            self.instance, self.connector, signal
        ))
    }
}

/// Lookup interface over the hardware description.
pub trait TopologyDirectory {
    fn find_device(&self, subsystem: &str, name: &str) -> Option<&DeviceDescriptor>;

    fn find_port(&self, subsystem: &str, instance: &str) -> Option<&PortDescriptor>;

    /// Resolves a device or fails with `DeviceNotFound`.
    fn device(&self, subsystem: &str, name: &str) -> PmdResult<&DeviceDescriptor> {
        self.find_device(subsystem, name)
            .ok_or_else(|| PmdError::device_not_found(subsystem, name))
    }
}

/// Devices and ports of one subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemTopology {
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
    #[serde(default)]
    pub ports: Vec<PortDescriptor>,
}

/// Topology loaded once from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTopology {
    #[serde(default)]
    pub subsystems: BTreeMap<String, SubsystemTopology>,
}

impl StaticTopology {
    pub fn from_yaml_str(content: &str) -> PmdResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| PmdError::Configuration(format!("Invalid topology: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> PmdResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PmdError::Configuration(format!(
                "Failed to read topology {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn with_device(mut self, subsystem: &str, device: DeviceDescriptor) -> Self {
        self.subsystems
            .entry(subsystem.to_string())
            .or_default()
            .devices
            .push(device);
        self
    }

    pub fn with_port(mut self, subsystem: &str, port: PortDescriptor) -> Self {
        self.subsystems
            .entry(subsystem.to_string())
            .or_default()
            .ports
            .push(port);
        self
    }
}

impl TopologyDirectory for StaticTopology {
    fn find_device(&self, subsystem: &str, name: &str) -> Option<&DeviceDescriptor> {
        self.subsystems
            .get(subsystem)?
            .devices
            .iter()
            .find(|d| d.name == name)
    }

    fn find_port(&self, subsystem: &str, instance: &str) -> Option<&PortDescriptor> {
        self.subsystems
            .get(subsystem)?
            .ports
            .iter()
            .find(|p| p.instance == instance)
    }
}
