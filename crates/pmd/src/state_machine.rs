//! Per-module poll: presence, identification, diagnostics.
//!
//! A module's attributes only change after a definitive outcome: a negative
//! presence read, a validated and decoded identification page, or an
//! exhausted retry budget. Failures inside the retry loop leave the previous
//! attribute set in place.

use sonic_sff::{checksum, ConnectorKind, Diagnostics, ModuleFamily, ModuleIdentity};
use tracing::{debug, info, instrument, warn};

use crate::attributes::{ConnectorStatus, ModuleAttributes};
use crate::backend::ModuleBackend;
use crate::config::RetryPolicy;
use crate::eeprom::DiagnosticPages;
use crate::error::{PmdError, PmdResult};
use crate::module::{Module, Subsystem};
use crate::retry::{with_retries, RetryBudget};

/// What one poll did to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Still no module in the cage.
    Absent,
    /// The module was pulled, or the first poll found the cage empty.
    Removed,
    /// A module was read, validated and decoded.
    Identified,
    /// A validated module was left alone.
    Unchanged,
    /// Diagnostics of a validated module were re-read.
    Refreshed,
}

/// Polls one module and updates its attribute set.
///
/// Errors are confined to the module: the attribute set reflects the
/// failure where one was reached, and the error is returned for logging.
#[instrument(skip_all, fields(module = %module.instance))]
pub fn poll_module<B>(
    backend: &mut B,
    subsystem: &Subsystem,
    module: &mut Module,
    policy: &RetryPolicy,
) -> PmdResult<PollOutcome>
where
    B: ModuleBackend + ?Sized,
{
    let present = backend.detect(subsystem, module)?;

    if !present {
        if !module.present && !module.attributes.is_uninitialized() {
            return Ok(PollOutcome::Absent);
        }
        if module.present {
            info!("Module removed");
        }
        update(module, |attrs| {
            attrs.mark(ConnectorKind::Absent, ConnectorStatus::Unrecognized)
        });
        module.present = false;
        module.retry = false;
        module.forget_module();
        return Ok(PollOutcome::Removed);
    }

    if module.present && !module.retry && module.identity.is_some() {
        if module.a2_read_requested {
            refresh_diagnostics(backend, subsystem, module, policy);
            return Ok(PollOutcome::Refreshed);
        }
        return Ok(PollOutcome::Unchanged);
    }

    identify(backend, subsystem, module, policy)
}

/// Reads, validates and decodes the identification page, then diagnostics.
fn identify<B>(
    backend: &mut B,
    subsystem: &Subsystem,
    module: &mut Module,
    policy: &RetryPolicy,
) -> PmdResult<PollOutcome>
where
    B: ModuleBackend + ?Sized,
{
    let mut budget = RetryBudget::new(policy);
    let page = loop {
        let attempt = backend.read_serial_id(subsystem, module).and_then(|page| {
            checksum::verify(&page)
                .map(|()| page)
                .map_err(|source| PmdError::ChecksumMismatch {
                    module: module.instance.clone(),
                    source,
                })
        });

        match attempt {
            Ok(page) => break page,
            Err(err) => match budget.retry(&module.instance, err) {
                Ok(_) => {
                    if let Err(e) = backend.reset(subsystem, module) {
                        warn!(error = %e, "Module reset failed");
                    }
                }
                Err(err) => {
                    let status = match err {
                        PmdError::UnsupportedCableType { .. } => ConnectorStatus::Unsupported,
                        _ => ConnectorStatus::Unrecognized,
                    };
                    warn!(
                        retries = budget.used(),
                        error = %err,
                        "Module identification failed"
                    );
                    fail(module, status);
                    return Err(err);
                }
            },
        }
    };

    let identity = match ModuleIdentity::parse(&page) {
        Ok(identity) => identity,
        Err(source) => {
            warn!(error = %source, "Unsupported module");
            fail(module, ConnectorStatus::Unsupported);
            return Err(PmdError::UnsupportedCableType {
                module: module.instance.clone(),
                source,
            });
        }
    };

    let diagnostics = if identity.dom_available {
        read_diagnostics(backend, subsystem, module, &identity, policy)
    } else {
        None
    };

    info!(
        connector = %identity.connector,
        vendor = identity.vendor_name.as_deref().unwrap_or(""),
        part_number = identity.vendor_part_number.as_deref().unwrap_or(""),
        diagnostics = diagnostics.is_some(),
        "Module identified"
    );

    update(module, |attrs| attrs.populate(&identity, diagnostics));
    module.present = true;
    module.retry = false;
    module.a2_read_requested = false;
    module.identity = Some(identity);
    Ok(PollOutcome::Identified)
}

/// Re-reads the diagnostics of a validated module. Failures keep the
/// previous values.
fn refresh_diagnostics<B>(
    backend: &mut B,
    subsystem: &Subsystem,
    module: &mut Module,
    policy: &RetryPolicy,
) where
    B: ModuleBackend + ?Sized,
{
    module.a2_read_requested = false;
    let Some(identity) = module.identity.clone() else {
        return;
    };
    if !identity.dom_available {
        return;
    }

    if let Some(diagnostics) = read_diagnostics(backend, subsystem, module, &identity, policy) {
        update(module, |attrs| attrs.diagnostics = Some(diagnostics));
    }
}

/// Reads and decodes diagnostics, retrying transport failures. An exhausted
/// budget yields no diagnostics.
fn read_diagnostics<B>(
    backend: &mut B,
    subsystem: &Subsystem,
    module: &Module,
    identity: &ModuleIdentity,
    policy: &RetryPolicy,
) -> Option<Diagnostics>
where
    B: ModuleBackend + ?Sized,
{
    match with_retries(policy, &module.instance, || {
        backend.read_diagnostics(subsystem, module, identity)
    }) {
        Ok(pages) => decode_diagnostics(identity, &pages),
        Err(e) => {
            warn!(error = %e, "Failed to read diagnostics");
            None
        }
    }
}

/// Decodes diagnostic pages for `identity`. A sentinel page yields nothing.
pub fn decode_diagnostics(identity: &ModuleIdentity, pages: &DiagnosticPages) -> Option<Diagnostics> {
    if Diagnostics::is_sentinel(&pages.primary) {
        debug!("Diagnostic page holds the failure sentinel");
        return None;
    }
    Some(match identity.family() {
        ModuleFamily::Sfp => Diagnostics::from_sfp(&pages.primary, identity.calibration),
        ModuleFamily::Qsfp => Diagnostics::from_qsfp(&pages.primary, pages.thresholds.as_ref()),
    })
}

/// Records a failed identification of a present module.
fn fail(module: &mut Module, status: ConnectorStatus) {
    update(module, |attrs| attrs.mark(ConnectorKind::Unknown, status));
    module.present = true;
    module.retry = true;
    module.forget_module();
}

/// Applies `f` to the attribute set and flags the module if it changed.
fn update(module: &mut Module, f: impl FnOnce(&mut ModuleAttributes)) {
    let before = module.attributes.clone();
    f(&mut module.attributes);
    if module.attributes != before {
        module.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::PortDescriptor;
    use sonic_sff::{DomPage, SerialIdPage};

    /// Backend answering from fixed pages with scripted failures.
    #[derive(Default)]
    struct FakeBackend {
        present: bool,
        detect_fails: bool,
        page: Option<SerialIdPage>,
        serial_failures: u32,
        dom: Option<DomPage>,
        dom_fails: bool,
        serial_reads: u32,
        dom_reads: u32,
        resets: u32,
    }

    impl ModuleBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn detect(&mut self, _: &Subsystem, _: &Module) -> PmdResult<bool> {
            if self.detect_fails {
                return Err(PmdError::transport("cpld0", "nak"));
            }
            Ok(self.present)
        }

        fn read_serial_id(&mut self, _: &Subsystem, _: &Module) -> PmdResult<SerialIdPage> {
            self.serial_reads += 1;
            if self.serial_failures > 0 {
                self.serial_failures -= 1;
                return Err(PmdError::transport("port1_eeprom", "nak"));
            }
            self.page
                .ok_or_else(|| PmdError::transport("port1_eeprom", "nak"))
        }

        fn read_diagnostics(
            &mut self,
            _: &Subsystem,
            _: &Module,
            _: &ModuleIdentity,
        ) -> PmdResult<DiagnosticPages> {
            self.dom_reads += 1;
            if self.dom_fails {
                return Err(PmdError::transport("port1_eeprom_A2", "nak"));
            }
            Ok(DiagnosticPages::sfp(self.dom.unwrap_or([0xff; 128])))
        }

        fn reset(&mut self, _: &Subsystem, _: &Module) -> PmdResult<()> {
            self.resets += 1;
            Ok(())
        }

        fn set_enabled(&mut self, _: &Subsystem, _: &Module) -> PmdResult<()> {
            Ok(())
        }
    }

    fn sfp_page(dom: bool) -> SerialIdPage {
        let mut page = [0u8; 128];
        page[0] = 0x03;
        page[3] = 0x10;
        page[20..36].copy_from_slice(b"ACME OPTICS     ");
        page[40..56].copy_from_slice(b"SR-10G-1        ");
        if dom {
            page[92] = 0x40;
        }
        page[63] = checksum::checksum(&page[0..63]);
        page[95] = checksum::checksum(&page[64..95]);
        page
    }

    fn a2_page() -> DomPage {
        let mut page = [0u8; 128];
        page[96] = 0x19;
        page[97] = 0x80;
        page
    }

    fn subsystem() -> Subsystem {
        Subsystem::new("base", "SUBSYSTEM|base")
    }

    fn module() -> Module {
        Module::new(
            "1",
            "base",
            "INTERFACE|1",
            PortDescriptor {
                instance: "1".to_string(),
                connector: "SFP_PLUS".to_string(),
                module_eeprom: "port1_eeprom".to_string(),
                sfp: None,
                qsfp: None,
            },
        )
    }

    fn poll(backend: &mut FakeBackend, module: &mut Module) -> PmdResult<PollOutcome> {
        poll_module(backend, &subsystem(), module, &RetryPolicy::immediate(2))
    }

    #[test]
    fn test_absent_on_first_poll() {
        let mut backend = FakeBackend::default();
        let mut module = module();

        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Removed);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::Absent));
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Unrecognized));
        assert!(module.attributes.vendor_name.is_none());
        assert!(module.changed);

        module.changed = false;
        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Absent);
        assert!(!module.changed);
    }

    #[test]
    fn test_identify_and_stay_idle() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(false)),
            ..Default::default()
        };
        let mut module = module();

        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Identified);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::SfpSr));
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Supported));
        assert_eq!(module.attributes.vendor_name.as_deref(), Some("ACME OPTICS"));
        assert!(module.attributes.diagnostics.is_none());
        assert!(module.present);
        assert!(!module.retry);

        let first = module.attributes.clone();
        module.changed = false;
        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Unchanged);
        assert_eq!(module.attributes, first);
        assert!(!module.changed);
        assert_eq!(backend.serial_reads, 1);
        assert_eq!(backend.resets, 0);
    }

    #[test]
    fn test_transient_failure_resets_between_attempts() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(false)),
            serial_failures: 1,
            ..Default::default()
        };
        let mut module = module();

        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Identified);
        assert_eq!(backend.serial_reads, 2);
        assert_eq!(backend.resets, 1);
    }

    #[test]
    fn test_persistent_failure_exhausts_retries() {
        let mut backend = FakeBackend {
            present: true,
            ..Default::default()
        };
        let mut module = module();

        let err = poll(&mut backend, &mut module).unwrap_err();
        assert!(matches!(err, PmdError::Transport { .. }));
        assert_eq!(backend.serial_reads, 3);
        assert_eq!(backend.resets, 2);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::Unknown));
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Unrecognized));
        assert!(module.retry);
        assert!(module.present);
    }

    #[test]
    fn test_retry_recovers_next_pass() {
        let mut backend = FakeBackend {
            present: true,
            ..Default::default()
        };
        let mut module = module();
        assert!(poll(&mut backend, &mut module).is_err());

        backend.page = Some(sfp_page(false));
        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Identified);
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Supported));
        assert!(!module.retry);
    }

    #[test]
    fn test_checksum_mismatch_is_retried_with_reset() {
        let mut page = sfp_page(false);
        page[20] ^= 0xff;
        let mut backend = FakeBackend {
            present: true,
            page: Some(page),
            ..Default::default()
        };
        let mut module = module();

        let err = poll(&mut backend, &mut module).unwrap_err();
        assert!(matches!(err, PmdError::ChecksumMismatch { .. }));
        assert_eq!(backend.serial_reads, 3);
        assert_eq!(backend.resets, 2);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::Unknown));
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Unrecognized));
        assert!(module.attributes.vendor_name.is_none());
    }

    #[test]
    fn test_unsupported_identifier_is_not_retried() {
        let mut page = sfp_page(false);
        page[0] = 0x18;
        page[63] = checksum::checksum(&page[0..63]);
        let mut backend = FakeBackend {
            present: true,
            page: Some(page),
            ..Default::default()
        };
        let mut module = module();

        let err = poll(&mut backend, &mut module).unwrap_err();
        assert!(matches!(err, PmdError::UnsupportedCableType { .. }));
        assert_eq!(backend.serial_reads, 1);
        assert_eq!(backend.resets, 0);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::Unknown));
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Unsupported));
        assert!(module.retry);
    }

    #[test]
    fn test_detect_failure_leaves_attributes() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(false)),
            ..Default::default()
        };
        let mut module = module();
        poll(&mut backend, &mut module).unwrap();
        let before = module.attributes.clone();
        module.changed = false;

        backend.detect_fails = true;
        assert!(poll(&mut backend, &mut module).is_err());
        assert_eq!(module.attributes, before);
        assert!(!module.changed);
    }

    #[test]
    fn test_removal_clears_identity() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(false)),
            ..Default::default()
        };
        let mut module = module();
        poll(&mut backend, &mut module).unwrap();

        backend.present = false;
        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Removed);
        assert_eq!(module.attributes.connector, Some(ConnectorKind::Absent));
        assert!(module.attributes.vendor_name.is_none());
        assert!(module.identity.is_none());
        assert!(!module.present);
    }

    #[test]
    fn test_diagnostics_decoded_when_available() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(true)),
            dom: Some(a2_page()),
            ..Default::default()
        };
        let mut module = module();

        poll(&mut backend, &mut module).unwrap();
        let diag = module.attributes.diagnostics.as_ref().unwrap();
        assert_eq!(diag.temperature.value, 25.5);
        assert_eq!(diag.lane_count(), 1);
    }

    #[test]
    fn test_diagnostics_failure_keeps_identity() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(true)),
            dom_fails: true,
            ..Default::default()
        };
        let mut module = module();

        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Identified);
        assert_eq!(backend.dom_reads, 3);
        assert!(module.attributes.diagnostics.is_none());
        assert_eq!(module.attributes.connector_status, Some(ConnectorStatus::Supported));
    }

    #[test]
    fn test_sentinel_page_yields_no_diagnostics() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(true)),
            ..Default::default()
        };
        let mut module = module();

        poll(&mut backend, &mut module).unwrap();
        assert_eq!(backend.dom_reads, 1);
        assert!(module.attributes.diagnostics.is_none());
    }

    #[test]
    fn test_requested_refresh_rereads_diagnostics_only() {
        let mut backend = FakeBackend {
            present: true,
            page: Some(sfp_page(true)),
            dom: Some(a2_page()),
            ..Default::default()
        };
        let mut module = module();
        poll(&mut backend, &mut module).unwrap();
        module.changed = false;

        let mut warmer = a2_page();
        warmer[96] = 0x1e;
        backend.dom = Some(warmer);
        module.a2_read_requested = true;

        assert_eq!(poll(&mut backend, &mut module).unwrap(), PollOutcome::Refreshed);
        assert_eq!(backend.serial_reads, 1);
        assert_eq!(backend.dom_reads, 2);
        assert!(module.changed);
        assert!(!module.a2_read_requested);
        let diag = module.attributes.diagnostics.as_ref().unwrap();
        assert_eq!(diag.temperature.value, 30.5);
    }
}
