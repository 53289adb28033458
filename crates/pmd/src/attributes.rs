//! Derived module attributes and their published form.

use serde::Serialize;
use sonic_sff::{CableTechnology, ConnectorKind, Diagnostics, ModuleIdentity, MonitoredValue, PowerMode};
use std::fmt;

use crate::db::FieldValues;
use crate::tables::fields;

/// Outcome of the last identification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Absent,
    Unrecognized,
    Unknown,
    Unsupported,
    Supported,
}

impl ConnectorStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectorStatus::Absent => "absent",
            ConnectorStatus::Unrecognized => "unrecognized",
            ConnectorStatus::Unknown => "unknown",
            ConnectorStatus::Unsupported => "unsupported",
            ConnectorStatus::Supported => "supported",
        }
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribute set of one module.
///
/// Either empty, marked with a connector/status pair only, or populated from
/// one validated read. Every transition goes through [`clear`](Self::clear)
/// first so no field survives from an earlier cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleAttributes {
    pub connector: Option<ConnectorKind>,
    pub connector_status: Option<ConnectorStatus>,
    pub cable_technology: Option<CableTechnology>,
    pub cable_length: Option<u8>,
    pub max_speed: Option<u32>,
    pub supported_speeds: Option<Vec<u32>>,
    pub power_mode: Option<PowerMode>,
    pub vendor_name: Option<String>,
    pub vendor_oui: Option<String>,
    pub vendor_part_number: Option<String>,
    pub vendor_revision: Option<String>,
    pub vendor_serial_number: Option<String>,
    pub diagnostics: Option<Diagnostics>,
}

impl ModuleAttributes {
    /// True before the first poll has decided anything.
    pub fn is_uninitialized(&self) -> bool {
        self.connector.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Clears everything and records only `connector` and `status`.
    pub fn mark(&mut self, connector: ConnectorKind, status: ConnectorStatus) {
        self.clear();
        self.connector = Some(connector);
        self.connector_status = Some(status);
    }

    /// Replaces the attribute set with the decode of one validated read.
    pub fn populate(&mut self, identity: &ModuleIdentity, diagnostics: Option<Diagnostics>) {
        self.clear();
        let speeds = identity.supported_speeds();

        self.connector = Some(identity.connector);
        self.connector_status = Some(if identity.is_supported() {
            ConnectorStatus::Supported
        } else {
            ConnectorStatus::Unsupported
        });
        self.cable_technology = identity.cable_technology;
        self.cable_length = identity.cable_length;
        self.max_speed = identity.max_speed();
        self.supported_speeds = (!speeds.is_empty()).then(|| speeds.to_vec());
        self.power_mode = identity.power_mode;
        self.vendor_name = identity.vendor_name.clone();
        self.vendor_oui = identity.vendor_oui.clone();
        self.vendor_part_number = identity.vendor_part_number.clone();
        self.vendor_revision = identity.vendor_revision.clone();
        self.vendor_serial_number = identity.vendor_serial_number.clone();
        self.diagnostics = diagnostics;
    }

    /// Flattens the set into the published `pm_info` map. Null attributes
    /// are left out.
    pub fn to_pm_info(&self) -> FieldValues {
        let mut fvs = FieldValues::new();

        push(&mut fvs, fields::CABLE_LENGTH, self.cable_length);
        push(&mut fvs, fields::CABLE_TECHNOLOGY, self.cable_technology);
        push(&mut fvs, fields::CONNECTOR, self.connector);
        push(&mut fvs, fields::CONNECTOR_STATUS, self.connector_status);
        push(
            &mut fvs,
            fields::SUPPORTED_SPEEDS,
            self.supported_speeds.as_ref().map(|speeds| {
                speeds
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }),
        );
        push(&mut fvs, fields::MAX_SPEED, self.max_speed);
        push(&mut fvs, fields::POWER_MODE, self.power_mode);
        push(&mut fvs, fields::VENDOR_NAME, self.vendor_name.as_deref());
        push(&mut fvs, fields::VENDOR_OUI, self.vendor_oui.as_deref());
        push(&mut fvs, fields::VENDOR_PART_NUMBER, self.vendor_part_number.as_deref());
        push(&mut fvs, fields::VENDOR_REVISION, self.vendor_revision.as_deref());
        push(&mut fvs, fields::VENDOR_SERIAL_NUMBER, self.vendor_serial_number.as_deref());

        if let Some(diag) = &self.diagnostics {
            push_diagnostics(&mut fvs, diag);
        }

        fvs
    }
}

fn push<T: fmt::Display>(fvs: &mut FieldValues, field: &str, value: Option<T>) {
    if let Some(value) = value {
        fvs.push((field.to_string(), value.to_string()));
    }
}

/// `tx_bias` on lane 2 becomes `tx2_bias`.
fn lane_field(sensor: &str, lane: usize) -> String {
    match sensor.split_once('_') {
        Some((prefix, suffix)) => format!("{}{}_{}", prefix, lane, suffix),
        None => format!("{}{}", sensor, lane),
    }
}

fn push_diagnostics(fvs: &mut FieldValues, diag: &Diagnostics) {
    push_monitor(fvs, fields::TEMPERATURE, &diag.temperature, 2);
    push_monitor(fvs, fields::VCC, &diag.vcc, 4);

    let per_lane = diag.lane_count() > 1;
    for (sensor, values, precision) in [
        (fields::TX_BIAS, &diag.tx_bias, 3),
        (fields::RX_POWER, &diag.rx_power, 4),
        (fields::TX_POWER, &diag.tx_power, 4),
    ] {
        for (i, value) in values.iter().enumerate() {
            let name = if per_lane {
                lane_field(sensor, i + 1)
            } else {
                sensor.to_string()
            };
            push_monitor(fvs, &name, value, precision);
        }
    }
}

fn push_monitor(fvs: &mut FieldValues, name: &str, value: &MonitoredValue, precision: usize) {
    let fmt = |v: f64| format!("{:.*}", precision, v);

    fvs.push((name.to_string(), fmt(value.value)));
    for (suffix, flag) in [
        ("high_alarm", value.high_alarm),
        ("low_alarm", value.low_alarm),
        ("high_warning", value.high_warning),
        ("low_warning", value.low_warning),
    ] {
        fvs.push((format!("{}_{}", name, suffix), flag.to_string()));
    }

    if let Some(t) = &value.thresholds {
        for (suffix, limit) in [
            ("high_alarm", t.high_alarm),
            ("low_alarm", t.low_alarm),
            ("high_warning", t.high_warning),
            ("low_warning", t.low_warning),
        ] {
            fvs.push((format!("{}_{}_threshold", name, suffix), fmt(limit)));
        }
    }
}
