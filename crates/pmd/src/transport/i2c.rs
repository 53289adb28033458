//! Linux i2c-dev transport.
//!
//! One file descriptor is kept per bus. The slave address is selected with
//! `I2C_SLAVE` before every transfer and the adapter timeout is bounded with
//! `I2C_TIMEOUT`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use nix::libc::c_int;
use tracing::debug;

use super::RegisterTransport;
use crate::error::{PmdError, PmdResult};
use crate::topology::DeviceDescriptor;

const I2C_TIMEOUT: u32 = 0x0702;
const I2C_SLAVE: u32 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_timeout, I2C_TIMEOUT);
nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// Register transport over `/dev/i2c-*`.
#[derive(Debug)]
pub struct I2cDevTransport {
    buses: HashMap<String, File>,
    timeout: Duration,
}

impl I2cDevTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buses: HashMap::new(),
            timeout,
        }
    }

    /// Opens (once) the bus of `device` and addresses the device on it.
    fn select(&mut self, device: &DeviceDescriptor) -> PmdResult<&mut File> {
        let timeout = self.timeout;
        let file = match self.buses.entry(device.bus.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&device.bus)
                    .map_err(|e| PmdError::transport(&device.name, format!("open {}: {}", device.bus, e)))?;

                // I2C_TIMEOUT counts in units of 10 ms.
                let ticks = c_int::try_from((timeout.as_millis() / 10).max(1)).unwrap_or(c_int::MAX);
                // SAFETY: the descriptor is open for the lifetime of `file`.
                unsafe { i2c_set_timeout(file.as_raw_fd(), ticks) }.map_err(|e| {
                    PmdError::transport(&device.name, format!("I2C_TIMEOUT: {}", e))
                })?;

                debug!(bus = %device.bus, "Opened i2c bus");
                entry.insert(file)
            }
        };

        // SAFETY: as above; I2C_SLAVE takes the 7-bit address by value.
        unsafe { i2c_set_slave(file.as_raw_fd(), c_int::from(device.address)) }.map_err(|e| {
            PmdError::transport(
                &device.name,
                format!("I2C_SLAVE 0x{:02x}: {}", device.address, e),
            )
        })?;

        Ok(file)
    }

    fn fail(&self, device: &DeviceDescriptor, started: Instant, message: String) -> PmdError {
        let elapsed = started.elapsed();
        if elapsed >= self.timeout {
            PmdError::Timeout {
                device: device.name.clone(),
                elapsed,
            }
        } else {
            PmdError::transport(&device.name, message)
        }
    }
}

impl RegisterTransport for I2cDevTransport {
    fn read(
        &mut self,
        _subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        buf: &mut [u8],
    ) -> PmdResult<()> {
        let started = Instant::now();
        let file = self.select(device)?;
        let result = file
            .write_all(&[offset])
            .and_then(|_| file.read_exact(buf));
        result.map_err(|e| self.fail(device, started, format!("read at 0x{:02x}: {}", offset, e)))
    }

    fn write(
        &mut self,
        _subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        data: &[u8],
    ) -> PmdResult<()> {
        let started = Instant::now();
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(offset);
        frame.extend_from_slice(data);

        let file = self.select(device)?;
        let result = file.write_all(&frame);
        result.map_err(|e| self.fail(device, started, format!("write at 0x{:02x}: {}", offset, e)))
    }
}
