//! Epson real-time clock ($4840-$4842)
//!
//! Sixteen 4-bit cells behind a command protocol, plus a free-running
//! interrupt generator clocked by the chip.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registers::{RTC_DATA, RTC_ENABLE, RTC_STATUS, RegisterFile};

/// Chip cycles the busy bit stays up after an access
pub const ACCESS_DELAY: u32 = 20;

pub const IMAGE_SIZE: usize = 16;

const COMMAND_READ: u8 = 0x0C;
const COMMAND_WRITE: u8 = 0x03;

const STATUS_BUSY: u8 = 0x80;

const CELL_SECONDS_HI: usize = 0x1;
const CELL_CONTROL_D: usize = 0xD;
const CELL_CONTROL_E: usize = 0xE;

const LOST_FLAG: u8 = 0x08;
const IRQ_FLAG: u8 = 0x02;
const DUTY_FLAG: u8 = 0x04;
const IRQ_MASK: u8 = 0x01;
const DUTY_ENABLE: u8 = 0x02;

const DUTY_PERIOD_MASK: u16 = 0x7FFF;
const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR_EVENT: u32 = 1440;

/// Command protocol state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Idle,
    CommandReceived,
    Read,
    Write,
}

/// Interrupt rates selectable through control E bits 2-3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rate {
    Tick = 0,
    Second = 1,
    Minute = 2,
    Hour = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rtc {
    present: bool,
    ram: [u8; IMAGE_SIZE],
    clocks: u16,
    seconds: u32,
    mode: Mode,
    cursor: u8,
    wait: u32,
}

impl Rtc {
    /// Cold clock: memory cleared, lost flag set
    pub fn new(present: bool) -> Self {
        let mut rtc = Self {
            present,
            ram: [0; IMAGE_SIZE],
            clocks: 0,
            seconds: 0,
            mode: Mode::Idle,
            cursor: 0,
            wait: 0,
        };
        rtc.ram[CELL_SECONDS_HI] |= LOST_FLAG;
        rtc
    }

    /// Chip reset; the battery-backed memory is kept
    pub fn reset(&mut self) {
        self.clocks = 0;
        self.seconds = 0;
        self.mode = Mode::Idle;
        self.cursor = 0;
        self.wait = 0;
    }

    pub fn present(&self) -> bool {
        self.present
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn clocks(&self) -> u16 {
        self.clocks
    }

    pub fn lost(&self) -> bool {
        self.ram[CELL_SECONDS_HI] & LOST_FLAG != 0
    }

    pub fn read_nibble(&self, addr: u8) -> u8 {
        self.ram[(addr & 0x0F) as usize]
    }

    pub fn write_nibble(&mut self, addr: u8, data: u8) {
        self.ram[(addr & 0x0F) as usize] = data & 0x0F;
    }

    /// Battery-backed memory, one nibble per byte
    pub fn image(&self) -> [u8; IMAGE_SIZE] {
        self.ram
    }

    /// Restore the battery-backed memory
    ///
    /// Anything that is not exactly 16 nibbles means the backup was lost:
    /// the clock comes up cold with the lost flag set.
    pub fn load_image(&mut self, image: &[u8]) {
        match <[u8; IMAGE_SIZE]>::try_from(image) {
            Ok(ram) if ram.iter().all(|&nibble| nibble <= 0x0F) => self.ram = ram,
            _ => {
                warn!("RTC image rejected ({} bytes), starting with lost flag set", image.len());
                self.ram = [0; IMAGE_SIZE];
                self.ram[CELL_SECONDS_HI] |= LOST_FLAG;
            }
        }
    }

    fn enabled(regs: &RegisterFile) -> bool {
        regs.get(RTC_ENABLE) & 1 != 0
    }

    fn touch(&mut self, regs: &mut RegisterFile) {
        regs.set(RTC_STATUS, regs.get(RTC_STATUS) | STATUS_BUSY);
        self.wait = ACCESS_DELAY;
    }

    /// Write to $4840 (the value is already stored)
    pub fn write_enable(&mut self, regs: &mut RegisterFile) {
        if !Self::enabled(regs) {
            self.mode = Mode::Idle;
            self.cursor = 0;
        }
        self.touch(regs);
    }

    /// Read of $4841
    pub fn read_data(&mut self, regs: &mut RegisterFile) -> u8 {
        if !Self::enabled(regs) || self.mode != Mode::Read {
            return 0x00;
        }
        self.touch(regs);
        let data = self.read_nibble(self.cursor);
        self.cursor = (self.cursor + 1) & 0x0F;
        data
    }

    /// Write to $4841
    pub fn write_data(&mut self, regs: &mut RegisterFile, data: u8) {
        if !Self::enabled(regs) {
            return;
        }
        self.touch(regs);

        match self.mode {
            Mode::Idle => {
                regs.set(RTC_DATA, data & 0x0F);
                self.mode = Mode::CommandReceived;
                self.cursor = 0;
            }
            Mode::CommandReceived => {
                self.mode = match regs.get(RTC_DATA) {
                    COMMAND_READ => Mode::Read,
                    COMMAND_WRITE => Mode::Write,
                    _ => Mode::Idle,
                };
                self.cursor = data & 0x0F;
                debug!("RTC {:?} at cell {:X}", self.mode, self.cursor);
            }
            Mode::Write => {
                self.write_nibble(self.cursor, data);
                self.cursor = (self.cursor + 1) & 0x0F;
            }
            Mode::Read => {}
        }
    }

    pub fn busy(&self) -> bool {
        self.wait != 0
    }

    /// Count down the access delay; the busy bit drops at zero
    pub fn tick_wait(&mut self, regs: &mut RegisterFile) {
        if self.wait != 0 {
            self.wait -= 1;
            if self.wait == 0 {
                regs.set(RTC_STATUS, regs.get(RTC_STATUS) & !STATUS_BUSY);
            }
        }
    }

    /// One chip cycle of the interrupt generator
    pub fn clock(&mut self) {
        if !self.present {
            return;
        }

        self.clocks = self.clocks.wrapping_add(1);
        if self.clocks & DUTY_PERIOD_MASK == 0 {
            self.duty();
        }
        if self.clocks == 0 {
            self.irq(Rate::Tick);
            self.irq(Rate::Second);
            self.seconds += 1;
            if self.seconds % SECONDS_PER_MINUTE == 0 {
                self.irq(Rate::Minute);
            }
            if self.seconds % SECONDS_PER_HOUR_EVENT == 0 {
                self.irq(Rate::Hour);
                self.seconds = 0;
            }
        }
    }

    /// Cycles that can pass before the next generator event
    pub fn idle_cycles(&self) -> u32 {
        if !self.present {
            return u32::MAX;
        }
        (DUTY_PERIOD_MASK - (self.clocks & DUTY_PERIOD_MASK)) as u32
    }

    /// Jump over `cycles` quiet cycles, at most [`Rtc::idle_cycles`]
    pub fn skip(&mut self, cycles: u32) {
        if self.present {
            self.clocks = self.clocks.wrapping_add(cycles as u16);
        }
    }

    fn masked(&self) -> bool {
        self.ram[CELL_CONTROL_E] & IRQ_MASK != 0
    }

    fn duty(&mut self) {
        if self.ram[CELL_CONTROL_E] & DUTY_ENABLE != 0 && !self.masked() {
            self.ram[CELL_CONTROL_D] |= DUTY_FLAG;
        }
    }

    fn irq(&mut self, rate: Rate) {
        let selected = (self.ram[CELL_CONTROL_E] >> 2) & 3;
        if selected == rate as u8 && !self.masked() {
            self.ram[CELL_CONTROL_D] |= IRQ_FLAG;
        }
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new(true)
    }
}
