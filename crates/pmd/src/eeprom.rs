//! Serial-ID and diagnostic page readers.
//!
//! SFP modules expose identification at A0h offset 0 and diagnostics on a
//! second device (A2h). QSFP modules expose identification in upper page 00h
//! (offset 128) and live monitors in the lower page; alarm thresholds sit in
//! upper page 03h behind the page-select byte.

use sonic_sff::{DomPage, ModuleFamily, SerialIdPage, DOM_PAGE_SIZE, SERIAL_ID_PAGE_SIZE};
use tracing::{debug, warn};

use crate::error::PmdResult;
use crate::topology::{DeviceDescriptor, PortDescriptor, TopologyDirectory};
use crate::transport::RegisterTransport;

/// QSFP page-select byte.
pub const QSFP_PAGE_SELECT: u8 = 127;

/// QSFP upper page carrying the alarm and warning thresholds.
pub const QSFP_THRESHOLD_PAGE: u8 = 0x03;

/// QSFP status byte and its flat-memory bit.
const QSFP_STATUS: usize = 2;
const QSFP_FLAT_MEM: u8 = 0x04;

const UPPER_PAGE_OFFSET: u8 = 128;

/// Raw diagnostic pages of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPages {
    /// SFP A2h page, or the QSFP lower page.
    pub primary: DomPage,
    /// QSFP upper page 03h, when it could be read.
    pub thresholds: Option<DomPage>,
}

impl DiagnosticPages {
    pub fn sfp(a2: DomPage) -> Self {
        Self {
            primary: a2,
            thresholds: None,
        }
    }
}

/// Reads the identification page of the module in `port`.
pub fn read_serial_id<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
) -> PmdResult<SerialIdPage>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let family = port.connector_type()?.family();
    let device = topology.device(subsystem, &port.module_eeprom)?;

    if family == ModuleFamily::Qsfp {
        transport.write(subsystem, device, QSFP_PAGE_SELECT, &[0])?;
    }
    let mut page = [0u8; SERIAL_ID_PAGE_SIZE];
    transport.read(subsystem, device, family.serial_id_offset(), &mut page)?;
    Ok(page)
}

/// Reads the diagnostic pages of the module in `port`.
pub fn read_diagnostics<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
) -> PmdResult<DiagnosticPages>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    match port.connector_type()?.family() {
        ModuleFamily::Sfp => {
            let device = topology.device(subsystem, &port.dom_device())?;
            let mut a2 = [0u8; DOM_PAGE_SIZE];
            transport.read(subsystem, device, 0, &mut a2)?;
            Ok(DiagnosticPages::sfp(a2))
        }
        ModuleFamily::Qsfp => {
            let device = topology.device(subsystem, &port.module_eeprom)?;
            let mut lower = [0u8; DOM_PAGE_SIZE];
            transport.read(subsystem, device, 0, &mut lower)?;

            let thresholds = if lower[QSFP_STATUS] & QSFP_FLAT_MEM != 0 {
                debug!(module = %port.instance, "Flat memory module, no threshold page");
                None
            } else {
                match read_upper_page(transport, subsystem, device, QSFP_THRESHOLD_PAGE) {
                    Ok(page) => Some(page),
                    Err(e) => {
                        warn!(module = %port.instance, error = %e, "Failed to read threshold page");
                        None
                    }
                }
            };

            Ok(DiagnosticPages {
                primary: lower,
                thresholds,
            })
        }
    }
}

/// Selects `page`, reads it, and selects page 00h again.
fn read_upper_page<T>(
    transport: &mut T,
    subsystem: &str,
    device: &DeviceDescriptor,
    page: u8,
) -> PmdResult<DomPage>
where
    T: RegisterTransport + ?Sized,
{
    transport.write(subsystem, device, QSFP_PAGE_SELECT, &[page])?;
    let mut buf = [0u8; DOM_PAGE_SIZE];
    let read = transport.read(subsystem, device, UPPER_PAGE_OFFSET, &mut buf);
    let restore = transport.write(subsystem, device, QSFP_PAGE_SELECT, &[0]);
    read?;
    restore?;
    Ok(buf)
}
