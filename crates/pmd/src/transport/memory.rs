//! In-memory register transport.
//!
//! Simulates devices as a 128-byte lower page plus paged upper memory selected
//! through byte 127, the layout shared by SFF-8472 and SFF-8636 two-wire
//! maps. Every access is logged and failures can be injected per device.

use std::collections::{BTreeMap, HashMap};

use super::RegisterTransport;
use crate::error::{PmdError, PmdResult};
use crate::topology::DeviceDescriptor;

const PAGE_SIZE: usize = 128;
const PAGE_SELECT: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// One logged transport access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOp {
    pub kind: OpKind,
    pub subsystem: String,
    pub device: String,
    pub offset: u8,
    /// Bytes written, or bytes returned by a successful read.
    pub data: Vec<u8>,
    pub ok: bool,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Times(u32),
    Always,
}

#[derive(Debug, Clone)]
struct SimDevice {
    lower: [u8; PAGE_SIZE],
    pages: BTreeMap<u8, [u8; PAGE_SIZE]>,
    page_select: u8,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            lower: [0; PAGE_SIZE],
            pages: BTreeMap::from([(0, [0; PAGE_SIZE])]),
            page_select: 0,
        }
    }
}

impl SimDevice {
    fn get(&self, address: usize) -> u8 {
        if address < PAGE_SIZE {
            self.lower[address]
        } else {
            self.pages
                .get(&self.page_select)
                .map_or(0xff, |page| page[address - PAGE_SIZE])
        }
    }

    fn set(&mut self, address: usize, value: u8) {
        if address < PAGE_SIZE {
            self.lower[address] = value;
            if address == PAGE_SELECT {
                self.page_select = value;
            }
        } else if let Some(page) = self.pages.get_mut(&self.page_select) {
            page[address - PAGE_SIZE] = value;
        }
    }
}

/// Simulated bus with access log and failure injection.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    devices: HashMap<String, SimDevice>,
    read_failures: HashMap<String, Failure>,
    write_failures: HashMap<String, Failure>,
    log: Vec<TransportOp>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` at `offset` in page 0 of `device` without logging.
    pub fn load(&mut self, device: &str, offset: u8, bytes: &[u8]) {
        let sim = self.devices.entry(device.to_string()).or_default();
        let saved = sim.page_select;
        sim.page_select = 0;
        for (i, b) in bytes.iter().enumerate() {
            let address = usize::from(offset) + i;
            if address == PAGE_SELECT {
                sim.lower[address] = *b;
            } else {
                sim.set(address, *b);
            }
        }
        sim.page_select = saved;
    }

    /// Stores a full upper page.
    pub fn load_page(&mut self, device: &str, page: u8, bytes: &[u8]) {
        let sim = self.devices.entry(device.to_string()).or_default();
        let upper = sim.pages.entry(page).or_insert([0; PAGE_SIZE]);
        let len = bytes.len().min(PAGE_SIZE);
        upper[..len].copy_from_slice(&bytes[..len]);
    }

    /// Current value of a byte as seen by the next access.
    pub fn byte(&self, device: &str, offset: u8) -> u8 {
        self.devices
            .get(device)
            .map_or(0, |sim| sim.get(usize::from(offset)))
    }

    pub fn page_select(&self, device: &str) -> u8 {
        self.devices.get(device).map_or(0, |sim| sim.page_select)
    }

    /// Fails the next `times` reads of `device`.
    pub fn fail_reads(&mut self, device: &str, times: u32) {
        self.read_failures
            .insert(device.to_string(), Failure::Times(times));
    }

    pub fn fail_reads_always(&mut self, device: &str) {
        self.read_failures.insert(device.to_string(), Failure::Always);
    }

    pub fn fail_writes_always(&mut self, device: &str) {
        self.write_failures
            .insert(device.to_string(), Failure::Always);
    }

    pub fn clear_failures(&mut self, device: &str) {
        self.read_failures.remove(device);
        self.write_failures.remove(device);
    }

    pub fn operations(&self) -> &[TransportOp] {
        &self.log
    }

    /// Read attempts against `device`, failed ones included.
    pub fn read_count(&self, device: &str) -> usize {
        self.log
            .iter()
            .filter(|op| op.kind == OpKind::Read && op.device == device)
            .count()
    }

    /// Successful writes to `device`, oldest first.
    pub fn writes(&self, device: &str) -> Vec<&TransportOp> {
        self.log
            .iter()
            .filter(|op| op.kind == OpKind::Write && op.ok && op.device == device)
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn should_fail(failures: &mut HashMap<String, Failure>, device: &str) -> bool {
        match failures.get_mut(device) {
            Some(Failure::Always) => true,
            Some(Failure::Times(0)) | None => false,
            Some(Failure::Times(n)) => {
                *n -= 1;
                true
            }
        }
    }

    fn record(&mut self, kind: OpKind, subsystem: &str, device: &str, offset: u8, data: Vec<u8>, ok: bool) {
        self.log.push(TransportOp {
            kind,
            subsystem: subsystem.to_string(),
            device: device.to_string(),
            offset,
            data,
            ok,
        });
    }
}

impl RegisterTransport for MemoryTransport {
    fn read(
        &mut self,
        subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        buf: &mut [u8],
    ) -> PmdResult<()> {
        if Self::should_fail(&mut self.read_failures, &device.name) {
            self.record(OpKind::Read, subsystem, &device.name, offset, Vec::new(), false);
            return Err(PmdError::transport(&device.name, "simulated read failure"));
        }

        let sim = self.devices.entry(device.name.clone()).or_default();
        for (i, b) in buf.iter_mut().enumerate() {
            *b = sim.get(usize::from(offset) + i);
        }
        self.record(OpKind::Read, subsystem, &device.name, offset, buf.to_vec(), true);
        Ok(())
    }

    fn write(
        &mut self,
        subsystem: &str,
        device: &DeviceDescriptor,
        offset: u8,
        data: &[u8],
    ) -> PmdResult<()> {
        if Self::should_fail(&mut self.write_failures, &device.name) {
            self.record(OpKind::Write, subsystem, &device.name, offset, data.to_vec(), false);
            return Err(PmdError::transport(&device.name, "simulated write failure"));
        }

        let sim = self.devices.entry(device.name.clone()).or_default();
        for (i, b) in data.iter().enumerate() {
            sim.set(usize::from(offset) + i, *b);
        }
        self.record(OpKind::Write, subsystem, &device.name, offset, data.to_vec(), true);
        Ok(())
    }
}
