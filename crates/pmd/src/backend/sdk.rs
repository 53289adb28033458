//! Backend for switch ASICs that own the module cages.
//!
//! The ASIC SDK exposes module state through management registers: an
//! operational/admin status register per module and an EEPROM access
//! register that moves at most [`SDK_EEPROM_BATCH`] bytes per call. The
//! register protocol itself lives behind [`SdkRegisterAccess`].

use sonic_sff::{
    Identifier, ModuleFamily, ModuleIdentity, SerialIdPage, DOM_PAGE_SIZE, SERIAL_ID_PAGE_SIZE,
};
use tracing::{debug, instrument};

use super::ModuleBackend;
use crate::config::RetryPolicy;
use crate::eeprom::DiagnosticPages;
use crate::error::{PmdError, PmdResult};
use crate::module::{Module, Subsystem};
use crate::retry::with_retries;

/// Largest EEPROM transfer of one register access.
pub const SDK_EEPROM_BATCH: usize = 48;

/// Two-wire address of the identification memory.
pub const SDK_ID_ADDRESS: u8 = 0x50;

/// Two-wire address of the SFP diagnostic memory.
pub const SDK_SFP_DOM_ADDRESS: u8 = 0x51;

/// Module addressing inside the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdkModuleAddress {
    pub device_id: u8,
    pub switch_id: u8,
    pub module: u8,
}

/// Operational status reported for a module cage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleOperStatus {
    Initializing,
    Plugged,
    Unplugged,
    PluggedWithError,
}

/// Vendor register access used by [`SdkBackend`].
pub trait SdkRegisterAccess {
    fn module_oper_status(&mut self, address: SdkModuleAddress) -> PmdResult<ModuleOperStatus>;

    fn set_module_admin(&mut self, address: SdkModuleAddress, up: bool) -> PmdResult<()>;

    /// Reads `buf.len()` bytes, never more than [`SDK_EEPROM_BATCH`].
    fn read_eeprom(
        &mut self,
        address: SdkModuleAddress,
        i2c_address: u8,
        page: u8,
        offset: u16,
        buf: &mut [u8],
    ) -> PmdResult<()>;
}

/// Vendor SDK backend.
#[derive(Debug)]
pub struct SdkBackend<A> {
    access: A,
    policy: RetryPolicy,
}

impl<A: SdkRegisterAccess> SdkBackend<A> {
    pub fn new(access: A, policy: RetryPolicy) -> Self {
        Self { access, policy }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn access_mut(&mut self) -> &mut A {
        &mut self.access
    }

    fn address(subsystem: &Subsystem, module: &Module) -> PmdResult<SdkModuleAddress> {
        let index = module.module_index.ok_or_else(|| {
            PmdError::Configuration(format!(
                "module {} has no numeric label for SDK addressing",
                module.instance
            ))
        })?;
        Ok(SdkModuleAddress {
            device_id: subsystem.device_id,
            switch_id: subsystem.switch_id,
            module: index,
        })
    }

    /// Fills `buf` from consecutive EEPROM batches starting at `offset`.
    fn read_block(
        &mut self,
        address: SdkModuleAddress,
        i2c_address: u8,
        offset: u16,
        buf: &mut [u8],
    ) -> PmdResult<()> {
        let mut at = offset;
        for chunk in buf.chunks_mut(SDK_EEPROM_BATCH) {
            self.access.read_eeprom(address, i2c_address, 0, at, chunk)?;
            // A chunk is at most SDK_EEPROM_BATCH bytes.
            at += chunk.len() as u16;
        }
        Ok(())
    }
}

impl<A: SdkRegisterAccess> ModuleBackend for SdkBackend<A> {
    fn name(&self) -> &'static str {
        "sdk"
    }

    fn detect(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<bool> {
        module.connector_type()?;
        let address = Self::address(subsystem, module)?;
        let status = with_retries(&self.policy, &module.instance, || {
            self.access.module_oper_status(address)
        })?;
        debug!(module = %module.instance, ?status, "Module oper status");
        Ok(status == ModuleOperStatus::Plugged)
    }

    fn read_serial_id(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<SerialIdPage> {
        let address = Self::address(subsystem, module)?;

        let mut identifier = [0u8; 1];
        self.access
            .read_eeprom(address, SDK_ID_ADDRESS, 0, 0, &mut identifier)?;
        let family = Identifier::from_byte(identifier[0])
            .map_err(|source| PmdError::UnsupportedCableType {
                module: module.instance.clone(),
                source,
            })?
            .family();

        let mut page = [0u8; SERIAL_ID_PAGE_SIZE];
        self.read_block(
            address,
            SDK_ID_ADDRESS,
            u16::from(family.serial_id_offset()),
            &mut page,
        )?;
        Ok(page)
    }

    fn read_diagnostics(
        &mut self,
        subsystem: &Subsystem,
        module: &Module,
        identity: &ModuleIdentity,
    ) -> PmdResult<DiagnosticPages> {
        let address = Self::address(subsystem, module)?;
        let i2c_address = match identity.family() {
            ModuleFamily::Sfp => SDK_SFP_DOM_ADDRESS,
            ModuleFamily::Qsfp => SDK_ID_ADDRESS,
        };

        let mut page = [0u8; DOM_PAGE_SIZE];
        self.read_block(address, i2c_address, 0, &mut page)?;
        Ok(DiagnosticPages::sfp(page))
    }

    #[instrument(skip_all, fields(module = %module.instance))]
    fn reset(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()> {
        let address = Self::address(subsystem, module)?;
        self.access.set_module_admin(address, false)?;
        self.access.set_module_admin(address, true)?;
        if !module.hw_enable {
            self.access.set_module_admin(address, false)?;
        }
        debug!("Module reset through admin status");
        Ok(())
    }

    fn set_enabled(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()> {
        let address = Self::address(subsystem, module)?;
        self.access.set_module_admin(address, module.hw_enable)
    }
}
