//! Node configuration

use embassy_time::Duration;

/// Bus addresses and timing for one logging node
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// DS1307 7-bit address
    pub clock_address: u8,
    /// AT24C32 7-bit address
    pub eeprom_address: u8,
    /// EEPROM self-timed write cycle, waited after every byte written
    pub eeprom_write_cycle: Duration,
    /// Settling time after clock register writes
    pub clock_write_cycle: Duration,
    /// Period of the clock-refresh task
    pub refresh_interval: Duration,
    /// Minimum spacing between accepted pulses
    pub debounce: Duration,
    /// Period of the status-indicator task
    pub indicator_poll: Duration,
}

impl NodeConfig {
    pub const DEFAULT: Self = Self {
        clock_address: 0x68,
        eeprom_address: 0x50,
        eeprom_write_cycle: Duration::from_millis(10),
        clock_write_cycle: Duration::from_ticks(0),
        refresh_interval: Duration::from_millis(1000),
        debounce: Duration::from_millis(1000),
        indicator_poll: Duration::from_millis(10),
    };
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
