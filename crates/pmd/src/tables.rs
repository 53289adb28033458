//! Table name constants for pmd.

/// CONFIG_DB table describing hardware subsystems.
pub const CFG_SUBSYSTEM_TABLE_NAME: &str = "SUBSYSTEM";

/// CONFIG_DB table of front panel interfaces.
pub const CFG_INTERFACE_TABLE_NAME: &str = "INTERFACE";

/// STATE_DB table receiving module identity and diagnostics.
pub const STATE_PM_INFO_TABLE_NAME: &str = "TRANSCEIVER_PM_INFO";

/// STATE_DB table announcing daemon readiness.
pub const STATE_DAEMON_TABLE_NAME: &str = "PMD_DAEMON";

/// Key of this daemon in [`STATE_DAEMON_TABLE_NAME`].
pub const DAEMON_KEY: &str = "pmd";

/// Separator between table name and key.
pub const KEY_SEPARATOR: char = '|';

/// Builds a `TABLE|key` string.
pub fn table_key(table: &str, key: &str) -> String {
    format!("{}{}{}", table, KEY_SEPARATOR, key)
}

/// Field names.
pub mod fields {
    /// Owning subsystem of an interface.
    pub const SUBSYSTEM: &str = "subsystem";

    /// Requested operational state ("true"/"false").
    pub const HW_ENABLE: &str = "hw_enable";

    /// Interface takes a pluggable module ("true"/"false").
    pub const PLUGGABLE: &str = "pluggable";

    /// Per-lane enable of a split port, four comma separated booleans.
    pub const SPLIT_ENABLE: &str = "split_enable";

    /// Daemon has completed its first hardware pass.
    pub const CUR_HW: &str = "cur_hw";

    pub const CABLE_LENGTH: &str = "cable_length";
    pub const CABLE_TECHNOLOGY: &str = "cable_technology";
    pub const CONNECTOR: &str = "connector";
    pub const CONNECTOR_STATUS: &str = "connector_status";
    pub const SUPPORTED_SPEEDS: &str = "supported_speeds";
    pub const MAX_SPEED: &str = "max_speed";
    pub const POWER_MODE: &str = "power_mode";
    pub const VENDOR_NAME: &str = "vendor_name";
    pub const VENDOR_OUI: &str = "vendor_oui";
    pub const VENDOR_PART_NUMBER: &str = "vendor_part_number";
    pub const VENDOR_REVISION: &str = "vendor_revision";
    pub const VENDOR_SERIAL_NUMBER: &str = "vendor_serial_number";

    pub const TEMPERATURE: &str = "temperature";
    pub const VCC: &str = "vcc";
    pub const TX_BIAS: &str = "tx_bias";
    pub const RX_POWER: &str = "rx_power";
    pub const TX_POWER: &str = "tx_power";
}
