//! Database collaborator.
//!
//! pmd reads subsystem and interface rows from CONFIG_DB and publishes one
//! `pm_info` map per module into STATE_DB. Everything goes through the
//! [`ConfigStore`] trait so the daemon core never touches Redis directly.

mod redis_adapter;

pub use redis_adapter::{RedisAdapter, RedisConfigStore};

use async_trait::async_trait;

use crate::error::PmdResult;
use crate::tables::fields;

/// A single field-value pair.
pub type FieldValue = (String, String);

/// A collection of field-value pairs (like a Redis hash).
pub type FieldValues = Vec<FieldValue>;

/// Helper trait for working with field-value collections.
pub trait FieldValuesExt {
    /// Gets the value for a field, if present.
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Parses a "true"/"false" field.
    fn get_bool(&self, field: &str) -> Option<bool>;
}

impl FieldValuesExt for FieldValues {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get_field(field)? {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

/// Builds a FieldValues collection from key-value pairs.
#[macro_export]
macro_rules! field_values {
    ($($field:expr => $value:expr),* $(,)?) => {
        vec![
            $(($field.to_string(), $value.to_string()),)*
        ]
    };
}

/// A subsystem row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemRow {
    pub name: String,
    /// Database key, kept for correlation.
    pub key: String,
}

/// An interface row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRow {
    pub name: String,
    pub key: String,
    pub subsystem: String,
    pub hw_enable: bool,
    pub pluggable: bool,
    /// Per-lane enable when the port is split.
    pub split_enable: Option<[bool; 4]>,
}

impl InterfaceRow {
    /// Builds a row from its hash. Rows without a subsystem are skipped.
    pub fn from_field_values(name: &str, key: &str, fvs: &FieldValues) -> Option<Self> {
        Some(Self {
            name: name.to_string(),
            key: key.to_string(),
            subsystem: fvs.get_field(fields::SUBSYSTEM)?.to_string(),
            hw_enable: fvs.get_bool(fields::HW_ENABLE).unwrap_or(false),
            pluggable: fvs.get_bool(fields::PLUGGABLE).unwrap_or(false),
            split_enable: fvs.get_field(fields::SPLIT_ENABLE).and_then(parse_split),
        })
    }
}

fn parse_split(value: &str) -> Option<[bool; 4]> {
    let mut lanes = [false; 4];
    let mut parts = value.split(',');
    for lane in lanes.iter_mut() {
        *lane = match parts.next()?.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return None,
        };
    }
    parts.next().is_none().then_some(lanes)
}

/// Configuration as read in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub subsystems: Vec<SubsystemRow>,
    pub interfaces: Vec<InterfaceRow>,
}

/// Keyed-attribute store consumed by the daemon.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send {
    /// Reads all subsystem and interface rows.
    async fn load_snapshot(&mut self) -> PmdResult<ConfigSnapshot>;

    /// Replaces the published `pm_info` of `instance`.
    async fn publish_pm_info(&mut self, instance: &str, pm_info: &FieldValues) -> PmdResult<()>;

    /// Announces that the first hardware pass is complete.
    async fn set_daemon_ready(&mut self) -> PmdResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_values_ext() {
        let fvs: FieldValues = field_values! {
            "subsystem" => "base",
            "hw_enable" => "true",
            "pluggable" => "maybe",
        };

        assert_eq!(fvs.get_field("subsystem"), Some("base"));
        assert_eq!(fvs.get_bool("hw_enable"), Some(true));
        assert_eq!(fvs.get_bool("pluggable"), None);
        assert_eq!(fvs.get_bool("missing"), None);
    }

    #[test]
    fn test_interface_row() {
        let fvs = field_values! {
            "subsystem" => "base",
            "hw_enable" => "false",
            "pluggable" => "true",
            "split_enable" => "true,false,true,true",
        };
        let row = InterfaceRow::from_field_values("1", "INTERFACE|1", &fvs).unwrap();
        assert_eq!(row.subsystem, "base");
        assert!(!row.hw_enable);
        assert!(row.pluggable);
        assert_eq!(row.split_enable, Some([true, false, true, true]));
    }

    #[test]
    fn test_interface_row_requires_subsystem() {
        let fvs = field_values! { "pluggable" => "true" };
        assert!(InterfaceRow::from_field_values("1", "INTERFACE|1", &fvs).is_none());
    }

    #[test]
    fn test_parse_split() {
        assert_eq!(parse_split("1,0,0,1"), Some([true, false, false, true]));
        assert_eq!(parse_split("true,false"), None);
        assert_eq!(parse_split("true,false,true,true,true"), None);
        assert_eq!(parse_split("on,off,on,off"), None);
    }
}
