//! Module presence detection.

use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::PmdResult;
use crate::retry::with_retries;
use crate::topology::{PortDescriptor, TopologyDirectory};
use crate::transport::{read_register, RegisterTransport};

/// Reads the presence signal of `port`.
///
/// Fails with `NotPluggable` for connectors without a presence signal.
/// Transport failures are retried within `policy`.
pub fn detect<T, D>(
    transport: &mut T,
    topology: &D,
    subsystem: &str,
    port: &PortDescriptor,
    policy: &RetryPolicy,
) -> PmdResult<bool>
where
    T: RegisterTransport + ?Sized,
    D: TopologyDirectory + ?Sized,
{
    let signal = port.presence_signal()?;
    let device = topology.device(subsystem, &signal.device)?;

    let raw = with_retries(policy, &signal.device, || {
        read_register(transport, subsystem, device, signal)
    })?;
    let present = signal.is_asserted(raw);

    debug!(
        module = %port.instance,
        raw = format_args!("0x{:x}", raw),
        present,
        "Presence read"
    );
    Ok(present)
}
