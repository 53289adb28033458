//! Diagnostic monitoring (DOM) decoding.
//!
//! Raw monitor words are big-endian. Engineering units follow the MSA
//! scales: temperature in 1/256 degC (signed), supply voltage in 100 uV,
//! bias current in 2 uA and optical power in 0.1 uW. Values are returned in
//! degC, V, mA and mW respectively.

use serde::{Deserialize, Serialize};

use crate::DomPage;

const TEMPERATURE_LSB: f64 = 1.0 / 256.0;
const VCC_LSB: f64 = 0.0001;
const BIAS_LSB: f64 = 0.002;
const POWER_LSB: f64 = 0.0001;

/// How raw A/D words are converted to units (SFF-8472 byte 92).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calibration {
    #[default]
    Internal,
    External,
}

/// Alarm and warning limits of a monitor, in engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub high_alarm: f64,
    pub low_alarm: f64,
    pub high_warning: f64,
    pub low_warning: f64,
}

/// One monitored quantity with its latched flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitoredValue {
    pub value: f64,
    pub high_alarm: bool,
    pub low_alarm: bool,
    pub high_warning: bool,
    pub low_warning: bool,
    pub thresholds: Option<Thresholds>,
}

/// Decoded diagnostics of one module.
///
/// Lane vectors hold one entry for SFP modules and four for QSFP modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub temperature: MonitoredValue,
    pub vcc: MonitoredValue,
    pub tx_bias: Vec<MonitoredValue>,
    pub rx_power: Vec<MonitoredValue>,
    pub tx_power: Vec<MonitoredValue>,
}

#[derive(Debug, Clone, Copy)]
enum Quantity {
    Temperature,
    Vcc,
    Bias,
    TxPower,
    RxPower,
}

/// Flags of one monitor in the high-alarm, low-alarm, high-warning,
/// low-warning order.
#[derive(Debug, Clone, Copy, Default)]
struct Flags([bool; 4]);

impl Flags {
    /// Builds flags from a nibble laid out as HA, LA, HW, LW (bit 3..0).
    fn from_nibble(nibble: u8) -> Self {
        Flags([
            nibble & 0x8 != 0,
            nibble & 0x4 != 0,
            nibble & 0x2 != 0,
            nibble & 0x1 != 0,
        ])
    }
}

fn be_u16(page: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([page[at], page[at + 1]])
}

fn be_i16(page: &[u8], at: usize) -> i16 {
    i16::from_be_bytes([page[at], page[at + 1]])
}

fn be_f32(page: &[u8], at: usize) -> f32 {
    f32::from_be_bytes([page[at], page[at + 1], page[at + 2], page[at + 3]])
}

fn monitored(value: f64, flags: Flags, thresholds: Option<Thresholds>) -> MonitoredValue {
    let Flags([high_alarm, low_alarm, high_warning, low_warning]) = flags;
    MonitoredValue {
        value,
        high_alarm,
        low_alarm,
        high_warning,
        low_warning,
        thresholds,
    }
}

impl Diagnostics {
    /// Returns true when a page carries the read-failure fill pattern.
    pub fn is_sentinel(page: &DomPage) -> bool {
        page.iter().all(|b| *b == 0xff)
    }

    pub fn lane_count(&self) -> usize {
        self.tx_bias.len()
    }

    /// Decodes an SFF-8472 A2h page.
    pub fn from_sfp(a2: &DomPage, calibration: Calibration) -> Self {
        let converter = SfpConverter::new(a2, calibration);

        // (quantity, thresholds, value, flag byte, flag bit of the high alarm)
        let sensor = |quantity: Quantity, thr: usize, at: usize, byte: usize, bit: u8| {
            let flag = |base: usize| {
                let b = a2[base + byte];
                (b & (1 << bit) != 0, b & (1 << (bit - 1)) != 0)
            };
            let (high_alarm, low_alarm) = flag(0);
            let (high_warning, low_warning) = flag(4);
            let thresholds = Thresholds {
                high_alarm: converter.convert(quantity, thr),
                low_alarm: converter.convert(quantity, thr + 2),
                high_warning: converter.convert(quantity, thr + 4),
                low_warning: converter.convert(quantity, thr + 6),
            };
            monitored(
                converter.convert(quantity, at),
                Flags([high_alarm, low_alarm, high_warning, low_warning]),
                Some(thresholds),
            )
        };

        Self {
            temperature: sensor(Quantity::Temperature, 0, 96, 112, 7),
            vcc: sensor(Quantity::Vcc, 8, 98, 112, 5),
            tx_bias: vec![sensor(Quantity::Bias, 16, 100, 112, 3)],
            tx_power: vec![sensor(Quantity::TxPower, 24, 102, 112, 1)],
            rx_power: vec![sensor(Quantity::RxPower, 32, 104, 113, 7)],
        }
    }

    /// Decodes an SFF-8636 lower page, with upper page 03h thresholds when
    /// the module provides them.
    pub fn from_qsfp(lower: &DomPage, page03: Option<&DomPage>) -> Self {
        let thresholds = |quantity: Quantity, at: usize| {
            page03.map(|p| Thresholds {
                high_alarm: internal(quantity, p, at),
                low_alarm: internal(quantity, p, at + 2),
                high_warning: internal(quantity, p, at + 4),
                low_warning: internal(quantity, p, at + 6),
            })
        };

        let lanes = |quantity: Quantity, values: usize, flags: usize, thr: usize| {
            (0..4)
                .map(|lane| {
                    let byte = lower[flags + lane / 2];
                    let nibble = if lane % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                    monitored(
                        internal(quantity, lower, values + 2 * lane),
                        Flags::from_nibble(nibble),
                        thresholds(quantity, thr),
                    )
                })
                .collect::<Vec<_>>()
        };

        Self {
            temperature: monitored(
                internal(Quantity::Temperature, lower, 22),
                Flags::from_nibble(lower[6] >> 4),
                thresholds(Quantity::Temperature, 0),
            ),
            vcc: monitored(
                internal(Quantity::Vcc, lower, 26),
                Flags::from_nibble(lower[7] >> 4),
                thresholds(Quantity::Vcc, 16),
            ),
            rx_power: lanes(Quantity::RxPower, 34, 9, 48),
            tx_bias: lanes(Quantity::Bias, 42, 11, 56),
            tx_power: lanes(Quantity::TxPower, 50, 13, 64),
        }
    }
}

/// Internally calibrated conversion of the word at `at`.
fn internal(quantity: Quantity, page: &[u8], at: usize) -> f64 {
    match quantity {
        Quantity::Temperature => f64::from(be_i16(page, at)) * TEMPERATURE_LSB,
        Quantity::Vcc => f64::from(be_u16(page, at)) * VCC_LSB,
        Quantity::Bias => f64::from(be_u16(page, at)) * BIAS_LSB,
        Quantity::TxPower | Quantity::RxPower => f64::from(be_u16(page, at)) * POWER_LSB,
    }
}

/// SFF-8472 conversion honoring external calibration constants.
struct SfpConverter<'a> {
    page: &'a DomPage,
    calibration: Calibration,
}

impl<'a> SfpConverter<'a> {
    const RX_PWR_4: usize = 56;
    const TX_I_SLOPE: usize = 76;
    const TX_PWR_SLOPE: usize = 80;
    const T_SLOPE: usize = 84;
    const V_SLOPE: usize = 88;

    fn new(page: &'a DomPage, calibration: Calibration) -> Self {
        Self { page, calibration }
    }

    fn convert(&self, quantity: Quantity, at: usize) -> f64 {
        if self.calibration == Calibration::Internal {
            return internal(quantity, self.page, at);
        }

        match quantity {
            Quantity::Temperature => {
                let raw = f64::from(be_i16(self.page, at));
                self.linear(Self::T_SLOPE, raw) * TEMPERATURE_LSB
            }
            Quantity::Vcc => {
                let raw = f64::from(be_u16(self.page, at));
                self.linear(Self::V_SLOPE, raw) * VCC_LSB
            }
            Quantity::Bias => {
                let raw = f64::from(be_u16(self.page, at));
                self.linear(Self::TX_I_SLOPE, raw) * BIAS_LSB
            }
            Quantity::TxPower => {
                let raw = f64::from(be_u16(self.page, at));
                self.linear(Self::TX_PWR_SLOPE, raw) * POWER_LSB
            }
            Quantity::RxPower => {
                let raw = f64::from(be_u16(self.page, at));
                // Rx_PWR(4) first, Rx_PWR(0) last.
                let power = (0..5).fold(0.0, |acc, i| {
                    acc * raw + f64::from(be_f32(self.page, Self::RX_PWR_4 + 4 * i))
                });
                power * POWER_LSB
            }
        }
    }

    /// Unsigned 8.8 slope followed by a signed offset.
    fn linear(&self, slope_at: usize, raw: f64) -> f64 {
        let slope = f64::from(be_u16(self.page, slope_at)) / 256.0;
        let offset = f64::from(be_i16(self.page, slope_at + 2));
        slope * raw + offset
    }
}
