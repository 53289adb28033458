//! Subsystem and module entities.

use serde::Serialize;
use sonic_sff::{ModuleFamily, ModuleIdentity};
use std::fmt;

use crate::attributes::ModuleAttributes;
use crate::error::PmdResult;
use crate::topology::{ConnectorType, PortDescriptor};

/// SDK device addressed by every subsystem.
pub const DEFAULT_DEVICE_ID: u8 = 1;

/// SDK switch addressed by every subsystem.
pub const DEFAULT_SWITCH_ID: u8 = 0;

/// A board or chassis; one register transport context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subsystem {
    pub name: String,
    /// Database key, kept for correlation.
    pub key: String,
    pub device_id: u8,
    pub switch_id: u8,
}

impl Subsystem {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            device_id: DEFAULT_DEVICE_ID,
            switch_id: DEFAULT_SWITCH_ID,
        }
    }
}

/// Presence and validation state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Absent,
    PresentUnvalidated,
    PresentValidated,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Absent => "absent",
            ModuleState::PresentUnvalidated => "present_unvalidated",
            ModuleState::PresentValidated => "present_validated",
        };
        write!(f, "{}", s)
    }
}

/// One pluggable port and what is known about the module in it.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub instance: String,
    /// Owning subsystem, by name.
    pub subsystem: String,
    /// Database key, kept for correlation.
    pub key: String,
    #[serde(skip)]
    pub port: PortDescriptor,
    /// Zero-based index derived from a numeric instance label.
    pub module_index: Option<u8>,

    pub present: bool,
    /// Last identification failed; the next pass tries again.
    pub retry: bool,
    pub hw_enable: bool,
    /// Per-lane enable of a split QSFP port.
    pub split: Option<[bool; 4]>,
    pub a2_read_requested: bool,

    #[serde(skip)]
    pub identity: Option<ModuleIdentity>,
    pub attributes: ModuleAttributes,
    /// Attributes differ from what was last published.
    #[serde(skip)]
    pub changed: bool,
    #[serde(skip)]
    pub(crate) not_pluggable_logged: bool,
}

impl Module {
    pub fn new(
        instance: impl Into<String>,
        subsystem: impl Into<String>,
        key: impl Into<String>,
        port: PortDescriptor,
    ) -> Self {
        let instance = instance.into();
        let module_index = instance
            .parse::<u8>()
            .ok()
            .and_then(|label| label.checked_sub(1));
        Self {
            instance,
            subsystem: subsystem.into(),
            key: key.into(),
            port,
            module_index,
            present: false,
            retry: false,
            hw_enable: false,
            split: None,
            a2_read_requested: false,
            identity: None,
            attributes: ModuleAttributes::default(),
            changed: false,
            not_pluggable_logged: false,
        }
    }

    pub fn connector_type(&self) -> PmdResult<ConnectorType> {
        self.port.connector_type()
    }

    pub fn family(&self) -> PmdResult<ModuleFamily> {
        Ok(self.connector_type()?.family())
    }

    pub fn state(&self) -> ModuleState {
        match (self.present, self.retry || self.identity.is_none()) {
            (false, _) => ModuleState::Absent,
            (true, true) => ModuleState::PresentUnvalidated,
            (true, false) => ModuleState::PresentValidated,
        }
    }

    /// Present module whose identity decoded as optical.
    pub fn is_optical(&self) -> bool {
        self.present && self.identity.as_ref().is_some_and(|id| id.is_optical())
    }

    /// Drops everything learnt about the inserted module.
    pub(crate) fn forget_module(&mut self) {
        self.identity = None;
        self.a2_read_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(instance: &str, connector: &str) -> PortDescriptor {
        PortDescriptor {
            instance: instance.to_string(),
            connector: connector.to_string(),
            module_eeprom: format!("port{}_eeprom", instance),
            sfp: None,
            qsfp: None,
        }
    }

    #[test]
    fn test_module_index() {
        assert_eq!(Module::new("1", "base", "INTERFACE|1", port("1", "SFP_PLUS")).module_index, Some(0));
        assert_eq!(Module::new("49", "base", "INTERFACE|49", port("49", "QSFP28")).module_index, Some(48));
        assert_eq!(Module::new("0", "base", "INTERFACE|0", port("0", "SFP_PLUS")).module_index, None);
        assert_eq!(Module::new("mgmt", "base", "INTERFACE|mgmt", port("mgmt", "RJ45")).module_index, None);
    }

    #[test]
    fn test_initial_state() {
        let module = Module::new("1", "base", "INTERFACE|1", port("1", "SFP_PLUS"));
        assert_eq!(module.state(), ModuleState::Absent);
        assert!(module.attributes.is_uninitialized());
        assert!(!module.is_optical());
        assert_eq!(module.family().unwrap(), ModuleFamily::Sfp);
    }

    #[test]
    fn test_present_without_identity_is_unvalidated() {
        let mut module = Module::new("1", "base", "INTERFACE|1", port("1", "QSFP_PLUS"));
        module.present = true;
        assert_eq!(module.state(), ModuleState::PresentUnvalidated);
        assert_eq!(module.family().unwrap(), ModuleFamily::Qsfp);
    }

    #[test]
    fn test_subsystem_defaults() {
        let subsystem = Subsystem::new("base", "SUBSYSTEM|base");
        assert_eq!(subsystem.device_id, 1);
        assert_eq!(subsystem.switch_id, 0);
    }
}
