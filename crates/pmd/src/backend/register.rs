//! Backend driving modules through board registers and the module EEPROM.

use std::sync::Arc;

use sonic_sff::{ModuleFamily, ModuleIdentity, SerialIdPage};
use tracing::{debug, instrument};

use super::ModuleBackend;
use crate::config::RetryPolicy;
use crate::control;
use crate::eeprom::{self, DiagnosticPages};
use crate::error::PmdResult;
use crate::module::{Module, Subsystem};
use crate::presence;
use crate::topology::TopologyDirectory;
use crate::transport::RegisterTransport;

/// Direct register access backend.
#[derive(Debug)]
pub struct RegisterBackend<T, D> {
    transport: T,
    topology: Arc<D>,
    policy: RetryPolicy,
}

impl<T, D> RegisterBackend<T, D>
where
    T: RegisterTransport,
    D: TopologyDirectory,
{
    pub fn new(transport: T, topology: Arc<D>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            topology,
            policy,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn topology(&self) -> &D {
        &self.topology
    }
}

impl<T, D> ModuleBackend for RegisterBackend<T, D>
where
    T: RegisterTransport,
    D: TopologyDirectory,
{
    fn name(&self) -> &'static str {
        "i2c"
    }

    fn detect(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<bool> {
        presence::detect(
            &mut self.transport,
            self.topology.as_ref(),
            &subsystem.name,
            &module.port,
            &self.policy,
        )
    }

    fn read_serial_id(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<SerialIdPage> {
        eeprom::read_serial_id(
            &mut self.transport,
            self.topology.as_ref(),
            &subsystem.name,
            &module.port,
        )
    }

    fn read_diagnostics(
        &mut self,
        subsystem: &Subsystem,
        module: &Module,
        _identity: &ModuleIdentity,
    ) -> PmdResult<DiagnosticPages> {
        eeprom::read_diagnostics(
            &mut self.transport,
            self.topology.as_ref(),
            &subsystem.name,
            &module.port,
        )
    }

    #[instrument(skip_all, fields(module = %module.instance))]
    fn reset(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()> {
        control::pulse_reset(
            &mut self.transport,
            self.topology.as_ref(),
            &subsystem.name,
            &module.port,
            &self.policy,
        )?;
        self.set_enabled(subsystem, module)
    }

    fn set_enabled(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()> {
        match module.family()? {
            ModuleFamily::Qsfp => {
                if !module.is_optical() {
                    debug!(
                        module = %module.instance,
                        "No optical module present, lane disable not applied"
                    );
                    return Ok(());
                }
                let mask = control::lane_disable_mask(module.hw_enable, module.split.as_ref());
                control::set_qsfp_lane_disable(
                    &mut self.transport,
                    self.topology.as_ref(),
                    &subsystem.name,
                    &module.port,
                    mask,
                )
            }
            ModuleFamily::Sfp => control::set_sfp_tx_disable(
                &mut self.transport,
                self.topology.as_ref(),
                &subsystem.name,
                &module.port,
                !module.hw_enable,
            ),
        }
    }

    fn initialize(&mut self, subsystem: &Subsystem, module: &Module) -> PmdResult<()> {
        control::clear_reset(
            &mut self.transport,
            self.topology.as_ref(),
            &subsystem.name,
            &module.port,
        )
    }
}
