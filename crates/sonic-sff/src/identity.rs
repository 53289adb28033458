//! Base identification page decoding.

use serde::{Deserialize, Serialize};

use crate::connector::{CableTechnology, ConnectorKind, PowerMode};
use crate::dom::Calibration;
use crate::identifier::{Identifier, ModuleFamily};
use crate::{SerialIdPage, SffError};

/// Offsets shared by SFF-8472 A0h and SFF-8636 upper page 00h.
mod offset {
    pub const IDENTIFIER: usize = 0;
    pub const EXT_IDENTIFIER: usize = 1;
    pub const ETH_COMPLIANCE: usize = 3;
    pub const GIGE_COMPLIANCE: usize = 6;
    pub const SFP_CABLE_TECHNOLOGY: usize = 8;
    pub const LENGTH_COPPER: usize = 18;
    pub const QSFP_DEVICE_TECHNOLOGY: usize = 19;
    pub const VENDOR_NAME: std::ops::Range<usize> = 20..36;
    pub const SFP_EXT_COMPLIANCE: usize = 36;
    pub const VENDOR_OUI: std::ops::Range<usize> = 37..40;
    pub const VENDOR_PN: std::ops::Range<usize> = 40..56;
    pub const SFP_VENDOR_REV: std::ops::Range<usize> = 56..60;
    pub const QSFP_VENDOR_REV: std::ops::Range<usize> = 56..58;
    pub const QSFP_EXT_COMPLIANCE: usize = 64;
    pub const VENDOR_SN: std::ops::Range<usize> = 68..84;
    pub const DIAG_MONITORING_TYPE: usize = 92;
}

/// SFP byte 92: digital diagnostics implemented.
const SFP_DOM_IMPLEMENTED: u8 = 0x40;
/// SFP byte 92: externally calibrated.
const SFP_DOM_EXTERNAL: u8 = 0x10;
/// QSFP byte 92: temperature, voltage, rx and tx power monitoring bits.
const QSFP_DOM_MASK: u8 = 0x3c;
/// Byte 3 bit 7: extended compliance byte is in use.
const QSFP_EXTENDED_COMPLIANCE: u8 = 0x80;

/// Decoded identity of a pluggable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub identifier: Identifier,
    pub connector: ConnectorKind,
    pub cable_technology: Option<CableTechnology>,
    /// Cable assembly length in metres.
    pub cable_length: Option<u8>,
    pub power_mode: Option<PowerMode>,
    pub vendor_name: Option<String>,
    pub vendor_oui: Option<String>,
    pub vendor_part_number: Option<String>,
    pub vendor_revision: Option<String>,
    pub vendor_serial_number: Option<String>,
    pub dom_available: bool,
    pub calibration: Calibration,
}

impl ModuleIdentity {
    /// Decodes an identification page.
    ///
    /// The page must already have passed [`crate::checksum::verify`]. An
    /// unsupported identifier byte is an error; a supported identifier with
    /// unrecognized compliance codes decodes with `connector` set to
    /// [`ConnectorKind::Unknown`].
    pub fn parse(page: &SerialIdPage) -> Result<Self, SffError> {
        let identifier = Identifier::from_byte(page[offset::IDENTIFIER])?;
        let family = identifier.family();

        let connector = match family {
            ModuleFamily::Sfp => classify_sfp(page),
            ModuleFamily::Qsfp => classify_qsfp(identifier, page),
        };

        let cable_technology = match family {
            ModuleFamily::Sfp => sfp_cable_technology(page),
            ModuleFamily::Qsfp => qsfp_cable_technology(connector, page),
        };

        let cable_length = match (cable_technology, page[offset::LENGTH_COPPER]) {
            (Some(_), len) if len > 0 => Some(len),
            _ => None,
        };

        let (power_mode, vendor_revision, dom_available, calibration) = match family {
            ModuleFamily::Sfp => {
                let diag = page[offset::DIAG_MONITORING_TYPE];
                let calibration = if diag & SFP_DOM_EXTERNAL != 0 {
                    Calibration::External
                } else {
                    Calibration::Internal
                };
                (
                    None,
                    ascii_field(&page[offset::SFP_VENDOR_REV]),
                    diag & SFP_DOM_IMPLEMENTED != 0,
                    calibration,
                )
            }
            ModuleFamily::Qsfp => (
                Some(PowerMode::from_power_class(page[offset::EXT_IDENTIFIER])),
                ascii_field(&page[offset::QSFP_VENDOR_REV]),
                page[offset::DIAG_MONITORING_TYPE] & QSFP_DOM_MASK != 0,
                Calibration::Internal,
            ),
        };

        Ok(Self {
            identifier,
            connector,
            cable_technology,
            cable_length,
            power_mode,
            vendor_name: ascii_field(&page[offset::VENDOR_NAME]),
            vendor_oui: oui(&page[offset::VENDOR_OUI]),
            vendor_part_number: ascii_field(&page[offset::VENDOR_PN]),
            vendor_revision,
            vendor_serial_number: ascii_field(&page[offset::VENDOR_SN]),
            dom_available,
            calibration,
        })
    }

    pub const fn family(&self) -> ModuleFamily {
        self.identifier.family()
    }

    /// Returns true when the compliance codes mapped to a known connector.
    pub const fn is_supported(&self) -> bool {
        self.connector.is_classified()
    }

    /// Returns true unless the module is a passive copper assembly.
    pub fn is_optical(&self) -> bool {
        self.cable_technology != Some(CableTechnology::Passive)
    }

    pub fn supported_speeds(&self) -> &'static [u32] {
        self.connector.supported_speeds()
    }

    pub fn max_speed(&self) -> Option<u32> {
        self.connector.max_speed()
    }
}

fn classify_sfp(page: &SerialIdPage) -> ConnectorKind {
    match page[offset::SFP_EXT_COMPLIANCE] {
        0x02 => return ConnectorKind::Sfp28Sr,
        0x03 => return ConnectorKind::Sfp28Lr,
        0x0b..=0x0d => return ConnectorKind::Sfp28Dac,
        _ => {}
    }

    let tengig = page[offset::ETH_COMPLIANCE];
    if tengig & 0x10 != 0 {
        return ConnectorKind::SfpSr;
    }
    if tengig & 0x20 != 0 {
        return ConnectorKind::SfpLr;
    }
    if tengig & 0x40 != 0 {
        return ConnectorKind::SfpLrm;
    }
    if tengig & 0x80 != 0 {
        return ConnectorKind::SfpEr;
    }

    if sfp_cable_technology(page).is_some() {
        return ConnectorKind::SfpDac;
    }

    let gige = page[offset::GIGE_COMPLIANCE];
    if gige & 0x08 != 0 {
        ConnectorKind::SfpRj45
    } else if gige & 0x04 != 0 {
        ConnectorKind::SfpCx
    } else if gige & 0x02 != 0 {
        ConnectorKind::SfpLx
    } else if gige & 0x01 != 0 {
        ConnectorKind::SfpSx
    } else {
        ConnectorKind::Unknown
    }
}

fn classify_qsfp(identifier: Identifier, page: &SerialIdPage) -> ConnectorKind {
    let compliance = page[offset::ETH_COMPLIANCE];

    if identifier == Identifier::Qsfp28 || compliance & QSFP_EXTENDED_COMPLIANCE != 0 {
        match page[offset::QSFP_EXT_COMPLIANCE] {
            0x01 => return ConnectorKind::Qsfp28Aoc,
            0x02 => return ConnectorKind::Qsfp28Sr4,
            0x03 => return ConnectorKind::Qsfp28Lr4,
            0x06 => return ConnectorKind::Qsfp28Cwdm4,
            0x07 => return ConnectorKind::Qsfp28Psm4,
            0x0b => return ConnectorKind::Qsfp28Cr4,
            _ => {}
        }
    }

    if compliance & 0x08 != 0 {
        ConnectorKind::QsfpCr4
    } else if compliance & 0x04 != 0 {
        ConnectorKind::QsfpSr4
    } else if compliance & 0x02 != 0 {
        ConnectorKind::QsfpLr4
    } else if compliance & 0x01 != 0 {
        ConnectorKind::QsfpAoc
    } else {
        ConnectorKind::Unknown
    }
}

fn sfp_cable_technology(page: &SerialIdPage) -> Option<CableTechnology> {
    let tech = page[offset::SFP_CABLE_TECHNOLOGY];
    if tech & 0x04 != 0 {
        Some(CableTechnology::Passive)
    } else if tech & 0x08 != 0 {
        Some(CableTechnology::Active)
    } else {
        None
    }
}

fn qsfp_cable_technology(connector: ConnectorKind, page: &SerialIdPage) -> Option<CableTechnology> {
    match page[offset::QSFP_DEVICE_TECHNOLOGY] >> 4 {
        0x0a | 0x0b => Some(CableTechnology::Passive),
        0x0c..=0x0f => Some(CableTechnology::Active),
        _ if matches!(connector, ConnectorKind::QsfpAoc | ConnectorKind::Qsfp28Aoc) => {
            Some(CableTechnology::Active)
        }
        _ => None,
    }
}

/// Space padded ASCII field, trimmed. Non-printable bytes end the value.
fn ascii_field(bytes: &[u8]) -> Option<String> {
    let value: String = bytes
        .iter()
        .take_while(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|b| char::from(*b))
        .collect();
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn oui(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|b| *b == 0) {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join("-"),
    )
}
