use serde::{Deserialize, Serialize};

use crate::Result;

/// Native clock of the chip (32768 * 128 Hz)
pub const CHIP_FREQUENCY: u64 = 32768 * 128;

/// NTSC master clock of the host
pub const HOST_FREQUENCY_NTSC: u64 = 21_477_272;

// Program ROM size on most boards (8 Mbit)
const DEFAULT_PROM_SIZE: u32 = 0x100000;

/// Cartridge layout and clock settings for one chip instance
///
/// The ROM image is split into a program ROM (`prom_*`) followed by the
/// data ROM (`drom_*`) that the decompressor, data port and banked windows
/// read from. Every field has a default so a JSON manifest only needs the
/// values that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prom_base: u32,
    pub prom_size: u32,
    pub drom_base: u32,
    pub drom_size: u32,
    /// Board carries the Epson RTC; without it the clock registers are inert
    pub has_rtc: bool,
    /// Host master clock frequency, used to convert host time to chip cycles
    pub host_frequency: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prom_base: 0,
            prom_size: DEFAULT_PROM_SIZE,
            drom_base: DEFAULT_PROM_SIZE,
            drom_size: 0,
            has_rtc: false,
            host_frequency: HOST_FREQUENCY_NTSC,
        }
    }
}

impl Config {
    /// Standard layout for a ROM image of `rom_size` bytes: the first
    /// megabyte is program ROM, everything after it is data ROM.
    pub fn new(rom_size: u32) -> Self {
        Self::default().with_prom_size(rom_size, DEFAULT_PROM_SIZE)
    }

    /// Split a `rom_size` image after `prom_size` bytes of program ROM
    pub fn with_prom_size(mut self, rom_size: u32, prom_size: u32) -> Self {
        let prom_size = prom_size.min(rom_size);
        self.prom_base = 0;
        self.prom_size = prom_size;
        self.drom_base = prom_size;
        self.drom_size = rom_size - prom_size;
        self
    }

    pub fn with_rtc(mut self, has_rtc: bool) -> Self {
        self.has_rtc = has_rtc;
        self
    }

    /// Parse a JSON cartridge manifest
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
