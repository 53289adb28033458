//! Register transport.
//!
//! The transport moves bytes to and from a named device. Register-level
//! helpers layer the 1/2/4 byte little-endian register model, bit masks and
//! polarity on top of it.

#[cfg(target_os = "linux")]
mod i2c;
mod memory;

#[cfg(target_os = "linux")]
pub use i2c::I2cDevTransport;
pub use memory::{MemoryTransport, OpKind, TransportOp};

use crate::error::{PmdError, PmdResult};
use crate::topology::{DeviceDescriptor, RegisterOp};

/// Byte access to devices of a subsystem.
pub trait RegisterTransport {
    /// Reads `buf.len()` bytes starting at `offset`.
    fn read(
        &mut self,
        subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        buf: &mut [u8],
    ) -> PmdResult<()>;

    /// Writes `data` starting at `offset`.
    fn write(
        &mut self,
        subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        data: &[u8],
    ) -> PmdResult<()>;
}

fn register_width(op: &RegisterOp) -> PmdResult<usize> {
    match op.register_size {
        1 | 2 | 4 => Ok(usize::from(op.register_size)),
        size => Err(PmdError::InvalidRegisterSize {
            device: op.device.clone(),
            size,
        }),
    }
}

/// Reads the register described by `op`.
pub fn read_register<T: RegisterTransport + ?Sized>(
    transport: &mut T,
    subsystem: &str,
    device: &DeviceDescriptor,
    op: &RegisterOp,
) -> PmdResult<u32> {
    let width = register_width(op)?;
    let mut buf = [0u8; 4];
    transport.read(subsystem, device, op.register_address, &mut buf[..width])?;
    Ok(u32::from_le_bytes(buf))
}

/// Writes `value` to the register described by `op`.
pub fn write_register<T: RegisterTransport + ?Sized>(
    transport: &mut T,
    subsystem: &str,
    device: &DeviceDescriptor,
    op: &RegisterOp,
    value: u32,
) -> PmdResult<()> {
    let width = register_width(op)?;
    let bytes = value.to_le_bytes();
    transport.write(subsystem, device, op.register_address, &bytes[..width])
}
