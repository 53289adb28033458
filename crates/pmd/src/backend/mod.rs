//! Hardware backends.
//!
//! A backend answers presence, reads the identification and diagnostic
//! pages, and drives reset and enable for one module. The daemon is generic
//! over the backend chosen at startup.

mod register;
mod sdk;

pub use register::RegisterBackend;
pub use sdk::{
    ModuleOperStatus, SdkBackend, SdkModuleAddress, SdkRegisterAccess, SDK_EEPROM_BATCH,
};

use sonic_sff::{ModuleIdentity, SerialIdPage};

use crate::eeprom::DiagnosticPages;
use crate::error::PmdResult;
use crate::module::{Module, Subsystem};

/// Per-module hardware operations.
pub trait ModuleBackend {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if a module is inserted.
    fn detect(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<bool>;

    /// Reads the 128-byte identification page.
    fn read_serial_id(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<SerialIdPage>;

    /// Reads the diagnostic pages of a module whose identity advertises them.
    fn read_diagnostics(
        &mut self,
        subsystem: &Subsystem,
        module: &Module,
        identity: &ModuleIdentity,
    ) -> PmdResult<DiagnosticPages>;

    /// Resets the module and restores its enable state.
    fn reset(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()>;

    /// Applies `module.hw_enable` (and the split lane enables) to hardware.
    fn set_enabled(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()>;

    /// Prepares the port when its module entity is created.
    fn initialize(&mut self, _subsystem: &Subsystem, _module: &Module) -> PmdResult<()> {
        Ok(())
    }
}
