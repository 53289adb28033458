//! Reset and enable controller.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::PmdResult;
use crate::topology::{PortDescriptor, RegisterOp, TopologyDirectory};
use crate::transport::{read_register, write_register, RegisterTransport};

/// QSFP lower-page byte holding the per-lane Tx disable bits.
pub const QSFP_DISABLE_OFFSET: u8 = 86;

/// All four QSFP lanes disabled.
pub const QSFP_ALL_LANES: u8 = 0x0f;

/// Computes the QSFP Tx disable mask; bit N disables lane N.
///
/// A split port takes its per-lane enables, otherwise all lanes follow
/// `hw_enable`.
pub fn lane_disable_mask(hw_enable: bool, split: Option<&[bool; 4]>) -> u8 {
    match split {
        Some(lanes) => lanes
            .iter()
            .enumerate()
            .filter(|(_, enabled)| !**enabled)
            .fold(0u8, |mask, (lane, _)| mask | (1u8 << lane)),
        None if hw_enable => 0x00,
        None => QSFP_ALL_LANES,
    }
}

/// Drives `signal` to `asserted` with read-modify-write.
///
/// Returns false without writing when the register already holds the
/// target value.
pub fn drive_signal<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    signal: &RegisterOp,
    asserted: bool,
) -> PmdResult<bool>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let device = topology.device(subsystem, &signal.device)?;
    let current = read_register(transport, subsystem, device, signal)?;
    let target = signal.drive(current, asserted);
    if target == current {
        return Ok(false);
    }
    write_register(transport, subsystem, device, signal, target)?;
    Ok(true)
}

/// Pulses the reset line of `port`: assert, wait, release, wait.
///
/// Ports without a reset line (every SFP cage) are left alone.
pub fn pulse_reset<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
    policy: &RetryPolicy,
) -> PmdResult<()>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let Some(signal) = port.reset_signal()? else {
        debug!(module = %port.instance, "Port has no reset");
        return Ok(());
    };

    drive_signal(transport, topology, subsystem, signal, true)?;
    pause(policy.reset_assert_delay);
    drive_signal(transport, topology, subsystem, signal, false)?;
    pause(policy.reset_release_delay);

    debug!(module = %port.instance, "Module reset");
    Ok(())
}

/// Releases a reset line left asserted, e.g. by a previous daemon.
pub fn clear_reset<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
) -> PmdResult<()>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let Some(signal) = port.reset_signal()? else {
        return Ok(());
    };
    if !drive_signal(transport, topology, subsystem, signal, false)? {
        debug!(module = %port.instance, "Reset already released");
    }
    Ok(())
}

/// Drives the SFP Tx disable line.
pub fn set_sfp_tx_disable<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
    disabled: bool,
) -> PmdResult<()>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let Some(signal) = port.tx_disable_signal()? else {
        debug!(module = %port.instance, "Port has no tx_disable");
        return Ok(());
    };

    if drive_signal(transport, topology, subsystem, signal, disabled)? {
        debug!(module = %port.instance, disabled, "Set tx_disable");
    } else {
        debug!(module = %port.instance, "Port is correctly configured");
    }
    Ok(())
}

/// Writes the QSFP lane disable mask into the module.
pub fn set_qsfp_lane_disable<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
    mask: u8,
) -> PmdResult<()>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let device = topology.device(subsystem, &port.module_eeprom)?;
    transport.write(subsystem, device, QSFP_DISABLE_OFFSET, &[mask])?;
    debug!(
        module = %port.instance,
        mask = format_args!("0x{:x}", mask),
        "Set QSFP lane disable"
    );
    Ok(())
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
