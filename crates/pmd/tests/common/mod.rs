//! Shared fixtures for the pmd integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sonic_pmd::db::{InterfaceRow, SubsystemRow};
use sonic_pmd::{
    ConfigSnapshot, ConfigStore, Daemon, FieldValues, MemoryTransport, PmdResult, RegisterBackend,
    RetryPolicy, StaticTopology,
};
use sonic_sff::SerialIdPage;

pub const SFP_SR: SerialIdPage = [
    0x03, 0x04, 0x07, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x67, 0x00, 0x00, 0x00,
    0x08, 0x03, 0x00, 0x1e, 0x41, 0x56, 0x41, 0x47, 0x4f, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x17, 0x6a, 0x41, 0x46, 0x42, 0x52, 0x2d, 0x37, 0x30, 0x33,
    0x53, 0x44, 0x5a, 0x2d, 0x48, 0x50, 0x31, 0x20, 0x47, 0x32, 0x2e, 0x33, 0x03, 0x52, 0x00, 0x1b,
    0x00, 0x1a, 0x00, 0x00, 0x41, 0x41, 0x30, 0x39, 0x33, 0x38, 0x41, 0x30, 0x44, 0x5a, 0x32, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x30, 0x39, 0x30, 0x39, 0x32, 0x30, 0x20, 0x20, 0x68, 0xf0, 0x03, 0x20,
    0x00, 0x00, 0x00, 0xd0, 0x00, 0x81, 0x45, 0x01, 0x34, 0x35, 0x35, 0x38, 0x38, 0x35, 0x2d, 0x30,
    0x30, 0x31, 0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0xee, 0xca, 0xf4, 0xa1, 0xe5, 0x75, 0x98, 0x2b,
];

pub const SFP_DAC: SerialIdPage = [
    0x03, 0x04, 0x21, 0x01, 0x00, 0x00, 0x04, 0x41, 0x84, 0x80, 0xd5, 0x00, 0x67, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x4d, 0x6f, 0x6c, 0x65, 0x78, 0x20, 0x49, 0x6e, 0x63, 0x2e, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x09, 0x3a, 0x37, 0x34, 0x37, 0x36, 0x34, 0x39, 0x31, 0x32,
    0x34, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x41, 0x31, 0x20, 0x20, 0x01, 0x00, 0x00, 0x8e,
    0x00, 0x00, 0x00, 0x00, 0x33, 0x30, 0x32, 0x33, 0x33, 0x30, 0x30, 0x33, 0x39, 0x20, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x31, 0x33, 0x30, 0x31, 0x32, 0x33, 0x20, 0x20, 0x00, 0x00, 0x00, 0x11,
    0x48, 0x33, 0x43, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x09, 0x00, 0x01, 0x06,
    0x06, 0x06, 0x06, 0x01, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xed,
];

pub const QSFP_CR4: SerialIdPage = [
    0x0d, 0x00, 0x21, 0x08, 0x00, 0x00, 0x00, 0x41, 0x80, 0x80, 0xd5, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x01, 0xa0, 0x4d, 0x6f, 0x6c, 0x65, 0x78, 0x20, 0x49, 0x6e, 0x63, 0x2e, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x07, 0x00, 0x09, 0x3a, 0x31, 0x31, 0x31, 0x30, 0x34, 0x30, 0x39, 0x30,
    0x38, 0x33, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x41, 0x30, 0x00, 0x00, 0x00, 0x00, 0x46, 0xd6,
    0x00, 0x00, 0x00, 0x00, 0x32, 0x31, 0x31, 0x37, 0x33, 0x30, 0x31, 0x31, 0x33, 0x20, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x31, 0x32, 0x30, 0x34, 0x32, 0x36, 0x20, 0x20, 0x00, 0x00, 0x00, 0x12,
    0x48, 0x33, 0x43, 0x20, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0xdf, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

pub const QSFP_SR4: SerialIdPage = [
    0x0d, 0x00, 0x0c, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x67, 0x00, 0x00, 0x96,
    0x00, 0x00, 0x00, 0x00, 0x41, 0x56, 0x41, 0x47, 0x4f, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x17, 0x6a, 0x41, 0x46, 0x42, 0x52, 0x2d, 0x37, 0x39, 0x45,
    0x45, 0x50, 0x5a, 0x2d, 0x48, 0x50, 0x31, 0x20, 0x30, 0x31, 0x42, 0x68, 0x07, 0xd0, 0x46, 0x98,
    0x00, 0x00, 0x0f, 0xde, 0x41, 0x54, 0x41, 0x31, 0x31, 0x34, 0x31, 0x31, 0x30, 0x30, 0x30, 0x30,
    0x30, 0x31, 0x32, 0x20, 0x31, 0x34, 0x30, 0x33, 0x31, 0x30, 0x20, 0x20, 0x08, 0x00, 0x00, 0x9f,
    0x00, 0x96, 0x45, 0x00, 0xd9, 0x7c, 0xd0, 0x48, 0xea, 0x49, 0x1a, 0x57, 0x37, 0x34, 0x37, 0x36,
    0x39, 0x38, 0x2d, 0x42, 0x32, 0x31, 0x48, 0x50, 0x49, 0x01, 0x01, 0x00, 0x00, 0x00, 0x28, 0x12,
];


/// Board with one SFP cage (port 1), one QSFP cage (port 49) and one fixed
/// RJ45 port (port 2), all behind `cpld0`.
pub const TOPOLOGY: &str = r#"
subsystems:
  base:
    devices:
      - { name: cpld0, bus: /dev/i2c-1, address: 96 }
      - { name: port1_eeprom, bus: /dev/i2c-10, address: 80 }
      - { name: port1_eeprom_A2, bus: /dev/i2c-10, address: 81 }
      - { name: port49_eeprom, bus: /dev/i2c-58, address: 80 }
    ports:
      - instance: "1"
        connector: SFP_PLUS
        module_eeprom: port1_eeprom
        sfp:
          mod_present: { device: cpld0, register_address: 16, bit_mask: 1, negative_polarity: true }
          tx_disable: { device: cpld0, register_address: 32, bit_mask: 1 }
      - instance: "2"
        connector: RJ45
      - instance: "49"
        connector: QSFP_PLUS
        module_eeprom: port49_eeprom
        qsfp:
          mod_present: { device: cpld0, register_address: 17, bit_mask: 1, negative_polarity: true }
          reset: { device: cpld0, register_address: 48, bit_mask: 1, negative_polarity: true }
"#;

pub const CPLD: &str = "cpld0";
pub const SFP_PRESENT_REG: u8 = 16;
pub const QSFP_PRESENT_REG: u8 = 17;
pub const SFP_TX_DISABLE_REG: u8 = 32;
pub const QSFP_RESET_REG: u8 = 48;

pub type TestDaemon = Daemon<RegisterBackend<MemoryTransport, StaticTopology>, StaticTopology>;

/// CONFIG_DB/STATE_DB stand-in.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub snapshot: ConfigSnapshot,
    pub pm_info: BTreeMap<String, FieldValues>,
    pub ready: bool,
}

impl MemoryStore {
    pub fn new(interfaces: Vec<InterfaceRow>) -> Self {
        Self {
            snapshot: ConfigSnapshot {
                subsystems: vec![SubsystemRow {
                    name: "base".to_string(),
                    key: "SUBSYSTEM|base".to_string(),
                }],
                interfaces,
            },
            ..Default::default()
        }
    }

    pub fn field(&self, instance: &str, field: &str) -> Option<&str> {
        self.pm_info
            .get(instance)?
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn interface_mut(&mut self, instance: &str) -> &mut InterfaceRow {
        self.snapshot
            .interfaces
            .iter_mut()
            .find(|row| row.name == instance)
            .expect("interface row")
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_snapshot(&mut self) -> PmdResult<ConfigSnapshot> {
        Ok(self.snapshot.clone())
    }

    async fn publish_pm_info(&mut self, instance: &str, pm_info: &FieldValues) -> PmdResult<()> {
        if pm_info.is_empty() {
            self.pm_info.remove(instance);
        } else {
            self.pm_info.insert(instance.to_string(), pm_info.clone());
        }
        Ok(())
    }

    async fn set_daemon_ready(&mut self) -> PmdResult<()> {
        self.ready = true;
        Ok(())
    }
}

pub fn interface(name: &str, hw_enable: bool) -> InterfaceRow {
    InterfaceRow {
        name: name.to_string(),
        key: format!("INTERFACE|{}", name),
        subsystem: "base".to_string(),
        hw_enable,
        pluggable: true,
        split_enable: None,
    }
}

pub fn daemon(dom_refresh_cycles: u32) -> TestDaemon {
    let topology = Arc::new(StaticTopology::from_yaml_str(TOPOLOGY).expect("topology"));
    let backend = RegisterBackend::new(
        MemoryTransport::new(),
        Arc::clone(&topology),
        RetryPolicy::immediate(2),
    );
    Daemon::with_policy(backend, topology, RetryPolicy::immediate(2), dom_refresh_cycles)
}

pub fn transport(daemon: &mut TestDaemon) -> &mut MemoryTransport {
    daemon.backend_mut().transport_mut()
}

/// Drives the (active-low) presence line of a cage.
pub fn set_present(daemon: &mut TestDaemon, register: u8, present: bool) {
    transport(daemon).load(CPLD, register, &[if present { 0x00 } else { 0x01 }]);
}

pub fn insert_sfp(daemon: &mut TestDaemon, page: &SerialIdPage) {
    transport(daemon).load("port1_eeprom", 0, page);
    set_present(daemon, SFP_PRESENT_REG, true);
}

pub fn insert_qsfp(daemon: &mut TestDaemon, page: &SerialIdPage) {
    transport(daemon).load("port49_eeprom", 128, page);
    set_present(daemon, QSFP_PRESENT_REG, true);
}

/// Writes to `register` of the CPLD, oldest first.
pub fn cpld_writes(daemon: &TestDaemon, register: u8) -> Vec<u8> {
    daemon
        .backend()
        .transport()
        .writes(CPLD)
        .iter()
        .filter(|op| op.offset == register)
        .map(|op| op.data[0])
        .collect()
}
